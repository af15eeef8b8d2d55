//! Audio-Geraete als Faehigkeit
//!
//! Der Sprachkanal kennt nur diese Traits. Echte Soundkarten-Anbindungen
//! leben ausserhalb des Crates; mitgeliefert werden:
//! - `StilleGeraet`: nimmt Stille auf, verwirft die Wiedergabe
//! - `SpeicherGeraet`: spielt vorgegebene Chunks ab und merkt sich alles
//!   Abgespielte (fuer Tests und Headless-Betrieb)
//!
//! Beide Geraete takten die Aufnahme mit der Chunk-Dauer, damit der
//! Sende-Loop nicht schneller laeuft als eine echte Soundkarte.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::AudioConfig;
use crate::error::{AudioError, AudioResult};

/// Offener Aufnahme-Stream
pub trait CaptureStream: Send {
    /// Liest blockierend genau `bytes` Bytes PCM
    fn read(&mut self, bytes: usize) -> AudioResult<Vec<u8>>;

    /// Schliesst den Stream, weitere `read`-Aufrufe schlagen fehl
    fn close(&mut self);
}

/// Offener Wiedergabe-Stream
pub trait PlaybackStream: Send {
    fn write(&mut self, daten: &[u8]) -> AudioResult<()>;

    fn close(&mut self);
}

/// Audio-Geraet, das Aufnahme- und Wiedergabe-Streams oeffnen kann
pub trait AudioDevice: Send + Sync {
    fn open_capture(&self, config: &AudioConfig) -> AudioResult<Box<dyn CaptureStream>>;

    fn open_playback(&self, config: &AudioConfig) -> AudioResult<Box<dyn PlaybackStream>>;
}

// ---------------------------------------------------------------------------
// StilleGeraet
// ---------------------------------------------------------------------------

/// Geraet ohne Hardware: Stille rein, nichts raus
#[derive(Debug, Clone, Copy, Default)]
pub struct StilleGeraet;

struct StilleAufnahme {
    takt: Duration,
    offen: bool,
}

impl CaptureStream for StilleAufnahme {
    fn read(&mut self, bytes: usize) -> AudioResult<Vec<u8>> {
        if !self.offen {
            return Err(AudioError::Geschlossen);
        }
        std::thread::sleep(self.takt);
        Ok(vec![0u8; bytes])
    }

    fn close(&mut self) {
        self.offen = false;
    }
}

struct Verwerfen;

impl PlaybackStream for Verwerfen {
    fn write(&mut self, _daten: &[u8]) -> AudioResult<()> {
        Ok(())
    }

    fn close(&mut self) {}
}

impl AudioDevice for StilleGeraet {
    fn open_capture(&self, config: &AudioConfig) -> AudioResult<Box<dyn CaptureStream>> {
        config.validieren()?;
        Ok(Box::new(StilleAufnahme {
            takt: config.chunk_dauer(),
            offen: true,
        }))
    }

    fn open_playback(&self, config: &AudioConfig) -> AudioResult<Box<dyn PlaybackStream>> {
        config.validieren()?;
        Ok(Box::new(Verwerfen))
    }
}

// ---------------------------------------------------------------------------
// SpeicherGeraet
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct SpeicherInner {
    aufnahme: Mutex<VecDeque<Vec<u8>>>,
    wiedergabe: Mutex<Vec<Vec<u8>>>,
    offene_streams: AtomicUsize,
}

/// In-Memory-Geraet
///
/// Klone teilen sich denselben Zustand. Ist die Aufnahme-Queue leer,
/// liefert das Geraet Stille.
#[derive(Debug, Clone, Default)]
pub struct SpeicherGeraet {
    inner: Arc<SpeicherInner>,
}

impl SpeicherGeraet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reiht einen Chunk ein, den die naechste Aufnahme liefert
    pub fn aufnahme_einreihen(&self, chunk: Vec<u8>) {
        self.inner.aufnahme.lock().push_back(chunk);
    }

    /// Alle bisher abgespielten Chunks in Reihenfolge
    pub fn abgespielt(&self) -> Vec<Vec<u8>> {
        self.inner.wiedergabe.lock().clone()
    }

    /// Anzahl noch nicht geschlossener Streams
    pub fn offene_streams(&self) -> usize {
        self.inner.offene_streams.load(Ordering::SeqCst)
    }
}

struct SpeicherAufnahme {
    inner: Arc<SpeicherInner>,
    takt: Duration,
    offen: bool,
}

impl CaptureStream for SpeicherAufnahme {
    fn read(&mut self, bytes: usize) -> AudioResult<Vec<u8>> {
        if !self.offen {
            return Err(AudioError::Geschlossen);
        }
        std::thread::sleep(self.takt);

        let mut chunk = self
            .inner
            .aufnahme
            .lock()
            .pop_front()
            .unwrap_or_default();
        chunk.resize(bytes, 0);
        Ok(chunk)
    }

    fn close(&mut self) {
        if std::mem::replace(&mut self.offen, false) {
            self.inner.offene_streams.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

struct SpeicherWiedergabe {
    inner: Arc<SpeicherInner>,
    offen: bool,
}

impl PlaybackStream for SpeicherWiedergabe {
    fn write(&mut self, daten: &[u8]) -> AudioResult<()> {
        if !self.offen {
            return Err(AudioError::Geschlossen);
        }
        self.inner.wiedergabe.lock().push(daten.to_vec());
        Ok(())
    }

    fn close(&mut self) {
        if std::mem::replace(&mut self.offen, false) {
            self.inner.offene_streams.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl AudioDevice for SpeicherGeraet {
    fn open_capture(&self, config: &AudioConfig) -> AudioResult<Box<dyn CaptureStream>> {
        config.validieren()?;
        self.inner.offene_streams.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SpeicherAufnahme {
            inner: Arc::clone(&self.inner),
            takt: config.chunk_dauer(),
            offen: true,
        }))
    }

    fn open_playback(&self, config: &AudioConfig) -> AudioResult<Box<dyn PlaybackStream>> {
        config.validieren()?;
        self.inner.offene_streams.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SpeicherWiedergabe {
            inner: Arc::clone(&self.inner),
            offen: true,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schnelle_config() -> AudioConfig {
        AudioConfig {
            abtastrate: 48000,
            frames_pro_chunk: 48,
            ..AudioConfig::default()
        }
    }

    #[test]
    fn stille_aufnahme_liefert_nullen() {
        let mut cap = StilleGeraet.open_capture(&schnelle_config()).unwrap();
        let chunk = cap.read(96).unwrap();
        assert_eq!(chunk, vec![0u8; 96]);

        cap.close();
        assert!(matches!(cap.read(96), Err(AudioError::Geschlossen)));
    }

    #[test]
    fn speicher_aufnahme_in_reihenfolge_und_aufgefuellt() {
        let geraet = SpeicherGeraet::new();
        geraet.aufnahme_einreihen(vec![1, 2, 3]);
        geraet.aufnahme_einreihen(vec![4; 10]);

        let mut cap = geraet.open_capture(&schnelle_config()).unwrap();
        assert_eq!(cap.read(4).unwrap(), vec![1, 2, 3, 0]);
        assert_eq!(cap.read(4).unwrap(), vec![4, 4, 4, 4]);
        // Queue leer: Stille
        assert_eq!(cap.read(4).unwrap(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn speicher_wiedergabe_merkt_sich_chunks() {
        let geraet = SpeicherGeraet::new();
        let mut play = geraet.open_playback(&schnelle_config()).unwrap();
        play.write(b"eins").unwrap();
        play.write(b"zwei").unwrap();

        assert_eq!(geraet.abgespielt(), vec![b"eins".to_vec(), b"zwei".to_vec()]);
    }

    #[test]
    fn offene_streams_werden_gezaehlt() {
        let geraet = SpeicherGeraet::new();
        let mut cap = geraet.open_capture(&schnelle_config()).unwrap();
        let mut play = geraet.open_playback(&schnelle_config()).unwrap();
        assert_eq!(geraet.offene_streams(), 2);

        cap.close();
        cap.close();
        play.close();
        assert_eq!(geraet.offene_streams(), 0);
    }

    #[test]
    fn ungueltige_config_wird_abgelehnt() {
        let cfg = AudioConfig {
            kanaele: 0,
            ..AudioConfig::default()
        };
        assert!(StilleGeraet.open_capture(&cfg).is_err());
        assert!(SpeicherGeraet::new().open_playback(&cfg).is_err());
    }
}
