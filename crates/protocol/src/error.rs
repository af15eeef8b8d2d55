//! Fehlertypen fuer Wire-Format und Nachrichtenmodell

use duett_crypto::CryptoError;
use std::io;
use thiserror::Error;

/// Fehler beim Lesen oder Schreiben eines Frames
#[derive(Debug, Error)]
pub enum FrameError {
    /// Stream endete vor oder innerhalb eines Frames
    #[error("Gegenstelle hat die Verbindung geschlossen")]
    PeerClosed,

    #[error("Frame zu gross: {laenge} Bytes (Maximum: {maximum} Bytes)")]
    ZuGross { laenge: usize, maximum: usize },

    /// Frame vollstaendig gelesen, aber nicht authentisch
    #[error("Frame nicht entschluesselbar: {0}")]
    Krypto(#[from] CryptoError),

    #[error("IO-Fehler: {0}")]
    Io(#[from] io::Error),
}

impl FrameError {
    /// Gibt true zurueck wenn der Stream nach dem Fehler noch am
    /// Frame-Anfang steht und weitergelesen werden kann
    pub fn ist_frame_ausgerichtet(&self) -> bool {
        matches!(self, Self::Krypto(_))
    }
}

/// Fehler beim Interpretieren eines entschluesselten Frames
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Ungueltiges JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unbekannter Nachrichtentyp: {0}")]
    UnbekannterTyp(String),

    #[error("Ungueltiger Payload fuer '{typ}': {grund}")]
    UngueltigerPayload { typ: String, grund: String },

    #[error("Base64-Dekodierung fehlgeschlagen: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl ProtocolError {
    pub fn payload(typ: &str, grund: impl Into<String>) -> Self {
        Self::UngueltigerPayload {
            typ: typ.to_string(),
            grund: grund.into(),
        }
    }
}
