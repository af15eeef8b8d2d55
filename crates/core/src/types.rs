//! Kleine Wert-Typen, die zwischen Session und Front-End geteilt werden

use serde::{Deserialize, Serialize};

/// Urheber einer angezeigten Nachricht
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Absender {
    /// Die Gegenstelle
    Peer,
    /// Lokale Echo-Ausgabe eigener Nachrichten
    Du,
    /// Meldungen der Session selbst
    System,
}

impl Absender {
    /// Anzeigename wie er in der Oberflaeche erscheint
    pub fn anzeigename(&self) -> &'static str {
        match self {
            Self::Peer => "Peer",
            Self::Du => "You",
            Self::System => "System",
        }
    }
}

impl std::fmt::Display for Absender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.anzeigename())
    }
}

/// Host und Port einer Gegenstelle bzw. eines lokalen Listeners
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpunkt {
    pub host: String,
    pub port: u16,
}

impl Endpunkt {
    pub fn neu(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl std::fmt::Display for Endpunkt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Auf welche Weise eine Session aufgebaut wurde
///
/// Wird vom Front-End fuer den erneuten Handshake gemerkt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VerbindungsModus {
    /// Auf eingehende Verbindung warten
    #[default]
    Lauschen,
    /// Aktiv zur Gegenstelle verbinden
    Verbinden,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absender_anzeige() {
        assert_eq!(Absender::Peer.to_string(), "Peer");
        assert_eq!(Absender::Du.to_string(), "You");
        assert_eq!(Absender::System.to_string(), "System");
    }

    #[test]
    fn endpunkt_anzeige() {
        let ep = Endpunkt::neu("127.0.0.1", 12345);
        assert_eq!(ep.to_string(), "127.0.0.1:12345");
    }

    #[test]
    fn modus_serde_kleinschreibung() {
        let json = serde_json::to_string(&VerbindungsModus::Verbinden).unwrap();
        assert_eq!(json, "\"verbinden\"");
        let zurueck: VerbindungsModus = serde_json::from_str("\"lauschen\"").unwrap();
        assert_eq!(zurueck, VerbindungsModus::Lauschen);
    }
}
