//! Fehlertypen fuer die Peer-Session

use duett_chat::ChatError;
use duett_core::DuettError;
use duett_protocol::{FrameError, ProtocolError};
use duett_voice::VoiceError;
use thiserror::Error;

use crate::call::AnrufZustand;
use crate::session::SessionZustand;

/// Fehlertyp fuer Session-Operationen
#[derive(Debug, Error)]
pub enum SessionError {
    /// Operation ist im aktuellen Zustand nicht erlaubt
    #[error("Nicht moeglich im Zustand {ist:?}")]
    FalscherZustand { ist: SessionZustand },

    #[error("Keine Verbindung zur Gegenstelle")]
    NichtVerbunden,

    #[error("Keine offene Verbindungsanfrage")]
    KeineAnfrage,

    /// Anruf-Operation passt nicht zum Anrufzustand
    #[error("Nicht moeglich im Anrufzustand {ist:?}")]
    AnrufZustand { ist: AnrufZustand },

    #[error("Sprachkanal: {0}")]
    Voice(#[from] VoiceError),

    #[error("Frame-Fehler: {0}")]
    Frame(#[from] FrameError),

    #[error("Protokollfehler: {0}")]
    Protokoll(#[from] ProtocolError),

    #[error("Dateifehler: {0}")]
    Datei(#[from] ChatError),

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// Gibt true zurueck wenn die Steuerverbindung selbst betroffen ist
    pub fn ist_transportfehler(&self) -> bool {
        matches!(
            self,
            Self::Frame(FrameError::Io(_) | FrameError::PeerClosed)
        )
    }
}

/// Result-Typ fuer die Peer-Session
pub type SessionResult<T> = Result<T, SessionError>;

/// Abbildung fuer das Front-End, das nur Fehlerklassen unterscheidet
impl From<SessionError> for DuettError {
    fn from(e: SessionError) -> Self {
        let text = e.to_string();
        match e {
            SessionError::Frame(FrameError::Krypto(_)) => DuettError::Krypto(text),
            SessionError::Frame(_) | SessionError::NichtVerbunden => DuettError::Getrennt(text),
            SessionError::Io(_) => DuettError::Verbindung(text),
            SessionError::Protokoll(_) => DuettError::UngueltigeNachricht(text),
            SessionError::Datei(_) => DuettError::Datei(text),
            SessionError::Voice(_) | SessionError::AnrufZustand { .. } => DuettError::Anruf(text),
            SessionError::FalscherZustand { .. } | SessionError::KeineAnfrage => {
                DuettError::Bedienung(text)
            }
        }
    }
}
