//! Audio-Format eines Anrufs
//!
//! Beide Seiten muessen dasselbe Format verwenden. Es wird nicht
//! ausgehandelt.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{AudioError, AudioResult};

/// PCM-Format und Chunk-Groesse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Abtastrate in Hz
    pub abtastrate: u32,
    pub kanaele: u16,
    /// Frames pro gesendetem Chunk
    pub frames_pro_chunk: u32,
    /// Bytes pro Sample (2 = signed 16 Bit)
    pub bytes_pro_sample: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            abtastrate: 22050,
            kanaele: 1,
            frames_pro_chunk: 1024,
            bytes_pro_sample: 2,
        }
    }
}

impl AudioConfig {
    /// Groesse eines Chunks in Bytes
    pub fn chunk_bytes(&self) -> usize {
        self.frames_pro_chunk as usize * self.kanaele as usize * self.bytes_pro_sample as usize
    }

    /// Abspieldauer eines Chunks
    pub fn chunk_dauer(&self) -> Duration {
        Duration::from_secs_f64(self.frames_pro_chunk as f64 / self.abtastrate as f64)
    }

    pub fn validieren(&self) -> AudioResult<()> {
        if self.abtastrate == 0 || self.kanaele == 0 || self.bytes_pro_sample == 0 {
            return Err(AudioError::Konfiguration(format!(
                "Ungueltiges Format: {} Hz, {} Kanaele, {} Bytes/Sample",
                self.abtastrate, self.kanaele, self.bytes_pro_sample
            )));
        }
        if self.frames_pro_chunk == 0 {
            return Err(AudioError::Konfiguration("Chunk ohne Frames".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_chunk_groesse() {
        let cfg = AudioConfig::default();
        assert_eq!(cfg.chunk_bytes(), 2048);
        let ms = cfg.chunk_dauer().as_millis();
        assert!((46..=47).contains(&ms), "Chunk-Dauer {ms} ms");
        assert!(cfg.validieren().is_ok());
    }

    #[test]
    fn ungueltiges_format() {
        let cfg = AudioConfig {
            abtastrate: 0,
            ..AudioConfig::default()
        };
        assert!(cfg.validieren().is_err());

        let cfg = AudioConfig {
            frames_pro_chunk: 0,
            ..AudioConfig::default()
        };
        assert!(cfg.validieren().is_err());
    }
}
