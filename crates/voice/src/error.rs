//! Fehlertypen fuer Audio-Geraete und den Sprachkanal

use duett_crypto::CryptoError;
use thiserror::Error;

/// Fehler eines Audio-Geraets
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Audio-Geraet nicht verfuegbar: {0}")]
    GeraetNichtVerfuegbar(String),

    #[error("Stream-Fehler: {0}")]
    StreamFehler(String),

    #[error("Stream bereits geschlossen")]
    Geschlossen,

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),
}

pub type AudioResult<T> = Result<T, AudioError>;

/// Fehler beim Aufbau oder Betrieb des Sprachkanals
#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("Audiofehler: {0}")]
    Audio(#[from] AudioError),

    #[error("Kryptografiefehler: {0}")]
    Krypto(#[from] CryptoError),

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audio-Thread: {0}")]
    Thread(String),
}

pub type VoiceResult<T> = Result<T, VoiceError>;
