//! Verschluesseltes Wire-Format fuer die Steuerverbindung
//!
//! Frame-basiertes Protokoll: Length(u32 big-endian) + versiegelter Blob.
//!
//! ## Frame-Format
//!
//! ```text
//! +--------+--------+--------+--------+----...----+
//! | Laenge (u32 BE) | 4 Bytes        | Blob       |
//! +--------+--------+--------+--------+----...----+
//! Blob = nonce(12) || ciphertext || tag(16)
//! ```
//!
//! Die Laenge zaehlt nur die Blob-Bytes. Die maximale Frame-Groesse wird
//! beim Schreiben und vor jeder Allokation beim Lesen geprueft.

use bytes::{BufMut, BytesMut};
use duett_crypto::{SessionKey, OVERHEAD};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::codec::Encoder;

use crate::error::FrameError;

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Standard-maximale Frame-Groesse (64 MiB, reicht fuer Bilder und Memos)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Groesse des Laengen-Felds in Bytes
pub const LENGTH_FIELD_SIZE: usize = 4;

// ---------------------------------------------------------------------------
// FrameCodec
// ---------------------------------------------------------------------------

/// Codec fuer verschluesselte, laengenpraefixierte Frames
///
/// Geschrieben wird ueber `Encoder<Vec<u8>>` mit `FramedWrite`, gelesen
/// mit `read_frame`. Ein nicht entschluesselbarer Frame ist danach
/// bereits vollstaendig verbraucht, die Leseschleife kann weiterlaufen.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    key: SessionKey,
    /// Maximale erlaubte Blob-Groesse in Bytes
    max_frame_size: usize,
}

impl FrameCodec {
    /// Erstellt einen neuen `FrameCodec` mit Standard-Limit
    pub fn new(key: SessionKey) -> Self {
        Self::with_max_size(key, DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn with_max_size(key: SessionKey, max_frame_size: usize) -> Self {
        Self {
            key,
            max_frame_size,
        }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    fn zu_gross(&self, laenge: usize) -> FrameError {
        FrameError::ZuGross {
            laenge,
            maximum: self.max_frame_size,
        }
    }

    /// Versiegelt `klartext` und prueft das Limit
    fn versiegeln(&self, klartext: &[u8]) -> Result<Vec<u8>, FrameError> {
        let erwartet = klartext.len() + OVERHEAD;
        if erwartet > self.max_frame_size || erwartet > u32::MAX as usize {
            return Err(self.zu_gross(erwartet));
        }
        Ok(self.key.versiegeln(klartext)?)
    }

    /// Liest genau einen Frame und entschluesselt ihn
    ///
    /// # Fehler
    /// - `PeerClosed` wenn der Stream vor oder innerhalb des Frames endet
    /// - `ZuGross` wenn das Laengen-Feld das Limit ueberschreitet
    /// - `Krypto` wenn der Blob nicht authentisch ist; der Stream steht
    ///   danach am Anfang des naechsten Frames
    pub async fn read_frame<R>(&self, reader: &mut R) -> Result<Vec<u8>, FrameError>
    where
        R: AsyncRead + Unpin,
    {
        let mut len_buf = [0u8; LENGTH_FIELD_SIZE];
        reader.read_exact(&mut len_buf).await.map_err(eof_als_peer_closed)?;
        let laenge = u32::from_be_bytes(len_buf) as usize;

        if laenge > self.max_frame_size {
            return Err(self.zu_gross(laenge));
        }

        let mut blob = vec![0u8; laenge];
        reader.read_exact(&mut blob).await.map_err(eof_als_peer_closed)?;

        Ok(self.key.oeffnen(&blob)?)
    }
}

fn eof_als_peer_closed(e: io::Error) -> FrameError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        FrameError::PeerClosed
    } else {
        FrameError::Io(e)
    }
}

// ---------------------------------------------------------------------------
// Encoder-Implementierung
// ---------------------------------------------------------------------------

impl Encoder<Vec<u8>> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Vec<u8>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let blob = self.versiegeln(&item)?;

        dst.reserve(LENGTH_FIELD_SIZE + blob.len());
        dst.put_u32(blob.len() as u32);
        dst.put_slice(&blob);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use duett_crypto::{SchluesselAlgorithmus, TAG_SIZE};

    fn test_key(fuell: u8) -> SessionKey {
        SessionKey::aus_bytes(vec![fuell; SessionKey::LAENGE], SchluesselAlgorithmus::Aes256Gcm)
            .unwrap()
    }

    fn frame(codec: &FrameCodec, klartext: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        codec.clone().encode(klartext.to_vec(), &mut buf).unwrap();
        buf.to_vec()
    }

    #[tokio::test]
    async fn encoder_und_read_frame_passen_zusammen() {
        let mut codec = FrameCodec::new(test_key(1));

        let mut buf = BytesMut::new();
        codec.encode(b"hallo".to_vec(), &mut buf).unwrap();

        // Laengen-Feld pruefen
        let blob_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        assert_eq!(blob_len, 5 + OVERHEAD);
        assert_eq!(buf.len(), LENGTH_FIELD_SIZE + blob_len);

        let mut cursor = io::Cursor::new(buf.to_vec());
        assert_eq!(codec.read_frame(&mut cursor).await.unwrap(), b"hallo");
        assert_eq!(cursor.position() as usize, LENGTH_FIELD_SIZE + blob_len);
    }

    #[test]
    fn klartext_ist_nicht_im_frame_sichtbar() {
        let mut codec = FrameCodec::new(test_key(1));
        let mut buf = BytesMut::new();
        codec.encode(b"streng geheim".to_vec(), &mut buf).unwrap();

        let sichtbar = buf
            .windows(b"streng geheim".len())
            .any(|w| w == b"streng geheim");
        assert!(!sichtbar);
    }

    #[tokio::test]
    async fn halbes_laengenfeld_ist_peer_closed() {
        let codec = FrameCodec::new(test_key(1));
        let mut cursor = io::Cursor::new(vec![0x00, 0x00]);
        assert!(matches!(
            codec.read_frame(&mut cursor).await,
            Err(FrameError::PeerClosed)
        ));
    }

    #[test]
    fn frame_codec_ablehnung_beim_encode_zu_grosse_nachricht() {
        let mut codec = FrameCodec::with_max_size(test_key(1), 10);
        let mut buf = BytesMut::new();
        assert!(codec.encode(vec![0; 1], &mut buf).is_err());
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn falscher_schluessel_ist_kryptofehler() {
        let mut sender = FrameCodec::new(test_key(1));
        let empfaenger = FrameCodec::new(test_key(2));

        let mut buf = BytesMut::new();
        sender.encode(b"hallo".to_vec(), &mut buf).unwrap();

        let mut cursor = io::Cursor::new(buf.to_vec());
        assert!(matches!(
            empfaenger.read_frame(&mut cursor).await,
            Err(FrameError::Krypto(_))
        ));
    }

    #[tokio::test]
    async fn mehrere_frames_hintereinander() {
        let mut codec = FrameCodec::new(test_key(4));
        let mut buf = BytesMut::new();

        for i in 0..3u8 {
            codec.encode(vec![i; 10], &mut buf).unwrap();
        }

        let mut cursor = io::Cursor::new(buf.to_vec());
        for i in 0..3u8 {
            assert_eq!(codec.read_frame(&mut cursor).await.unwrap(), vec![i; 10]);
        }
        assert!(matches!(
            codec.read_frame(&mut cursor).await,
            Err(FrameError::PeerClosed)
        ));
    }

    #[tokio::test]
    async fn read_frame_verschiedene_groessen() {
        let codec = FrameCodec::new(test_key(5));

        for groesse in [0usize, 1, 4096, 65536] {
            let klartext: Vec<u8> = (0..groesse).map(|i| (i % 251) as u8).collect();

            let buffer = frame(&codec, &klartext);
            assert_eq!(buffer.len(), LENGTH_FIELD_SIZE + groesse + OVERHEAD);

            let mut cursor = io::Cursor::new(buffer);
            let gelesen = codec.read_frame(&mut cursor).await.unwrap();
            assert_eq!(gelesen, klartext, "Groesse {groesse}");
        }
    }

    #[tokio::test]
    async fn async_read_frame_leerer_stream_ist_peer_closed() {
        let codec = FrameCodec::new(test_key(1));
        let mut cursor = io::Cursor::new(Vec::<u8>::new());
        assert!(matches!(
            codec.read_frame(&mut cursor).await,
            Err(FrameError::PeerClosed)
        ));
    }

    #[tokio::test]
    async fn async_read_frame_abgeschnitten_ist_peer_closed() {
        let codec = FrameCodec::new(test_key(1));
        let mut buffer = frame(&codec, b"hallo");
        buffer.truncate(LENGTH_FIELD_SIZE + TAG_SIZE);

        let mut cursor = io::Cursor::new(buffer);
        assert!(matches!(
            codec.read_frame(&mut cursor).await,
            Err(FrameError::PeerClosed)
        ));
    }

    #[tokio::test]
    async fn async_read_frame_ablehnung_zu_grosser_frame() {
        let codec = FrameCodec::with_max_size(test_key(1), 1024);
        let mut buffer: Vec<u8> = Vec::new();
        buffer.extend_from_slice(&(2u32 * 1024 * 1024).to_be_bytes());

        let mut cursor = io::Cursor::new(buffer);
        assert!(matches!(
            codec.read_frame(&mut cursor).await,
            Err(FrameError::ZuGross { .. })
        ));
    }

    #[tokio::test]
    async fn async_stream_bleibt_nach_kryptofehler_ausgerichtet() {
        let fremd = FrameCodec::new(test_key(9));
        let eigen = FrameCodec::new(test_key(1));

        let mut buffer = frame(&fremd, b"fremd");
        buffer.extend(frame(&eigen, b"eigen"));

        let mut cursor = io::Cursor::new(buffer);
        let err = eigen.read_frame(&mut cursor).await.unwrap_err();
        assert!(err.ist_frame_ausgerichtet());
        assert_eq!(eigen.read_frame(&mut cursor).await.unwrap(), b"eigen");
    }

    #[tokio::test]
    async fn framed_write_ueber_duplex() {
        use futures_util::SinkExt;
        use tokio_util::codec::FramedWrite;

        let (a, mut b) = tokio::io::duplex(4096);
        let mut schreiber = FramedWrite::new(a, FrameCodec::new(test_key(3)));
        let leser = FrameCodec::new(test_key(3));

        for teil in ["m1", "m2", "m3"] {
            schreiber.send(teil.as_bytes().to_vec()).await.unwrap();
        }
        drop(schreiber);

        let mut empfangen = Vec::new();
        loop {
            match leser.read_frame(&mut b).await {
                Ok(frame) => empfangen.push(String::from_utf8(frame).unwrap()),
                Err(FrameError::PeerClosed) => break,
                Err(e) => panic!("unerwarteter Fehler: {e}"),
            }
        }
        assert_eq!(empfangen, vec!["m1", "m2", "m3"]);
    }
}
