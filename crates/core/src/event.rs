//! Ereignisse von der Session an die Oberflaeche
//!
//! Die Session liefert alle Rueckmeldungen als geordneten Strom von
//! `SessionEvent`s. Das Front-End entscheidet selbst, wie es sie darstellt.

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::Absender;

/// Alle Rueckmeldungen einer Session an das Front-End
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// Textnachricht oder Systemmeldung
    Nachricht { text: String, absender: Absender },
    /// Verbindungsstatus hat sich geaendert
    VerbindungsStatus { text: String, verbunden: bool },
    /// Bild wurde empfangen oder gesendet
    Bild { pfad: PathBuf, absender: Absender },
    /// Sprachnachricht wurde empfangen oder gesendet
    Audio {
        pfad: PathBuf,
        dauer: f64,
        absender: Absender,
    },
    /// Eingehende Verbindung wartet auf Annahme/Ablehnung
    Verbindungsanfrage { peer: SocketAddr },
    /// Gegenstelle moechte telefonieren
    Anrufanfrage { udp_port: u16 },
    /// Statusaenderung des Anrufs
    AnrufStatus { text: String },
}

impl SessionEvent {
    /// Systemmeldung im Nachrichtenverlauf
    pub fn system(text: impl Into<String>) -> Self {
        Self::Nachricht {
            text: text.into(),
            absender: Absender::System,
        }
    }

    pub fn status(text: impl Into<String>, verbunden: bool) -> Self {
        Self::VerbindungsStatus {
            text: text.into(),
            verbunden,
        }
    }

    pub fn anruf_status(text: impl Into<String>) -> Self {
        Self::AnrufStatus { text: text.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_ist_serde_kompatibel() {
        let event = SessionEvent::Audio {
            pfad: PathBuf::from("downloads/memo.wav"),
            dauer: 3.5,
            absender: Absender::Peer,
        };
        let json = serde_json::to_string(&event).unwrap();
        let zurueck: SessionEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(zurueck, event);
    }

    #[test]
    fn system_meldung_hat_system_absender() {
        match SessionEvent::system("Peer has left the chat.") {
            SessionEvent::Nachricht { text, absender } => {
                assert_eq!(text, "Peer has left the chat.");
                assert_eq!(absender, Absender::System);
            }
            andere => panic!("Unerwartetes Event: {andere:?}"),
        }
    }
}
