//! Fehlertypen fuer Duett
//!
//! Die einzelnen Crates definieren eigene Fehler. Das Front-End sieht nur
//! die Fehlerklassen hier; die Session bildet ihre Fehler darauf ab.

use thiserror::Error;

/// Globaler Result-Alias fuer Duett
pub type Result<T> = std::result::Result<T, DuettError>;

/// Alle Fehlerklassen einer Peer-Session
#[derive(Debug, Error)]
pub enum DuettError {
    // --- Verbindung & Netzwerk ---
    #[error("Verbindung fehlgeschlagen: {0}")]
    Verbindung(String),

    #[error("Verbindung getrennt: {0}")]
    Getrennt(String),

    // --- Protokoll & Krypto ---
    #[error("Ungueltige Nachricht: {0}")]
    UngueltigeNachricht(String),

    #[error("Kryptografiefehler: {0}")]
    Krypto(String),

    // --- Anruf ---
    #[error("Anruf konnte nicht aufgebaut werden: {0}")]
    Anruf(String),

    // --- Dateien ---
    #[error("Dateifehler: {0}")]
    Datei(String),

    // --- Bedienung ---
    #[error("{0}")]
    Bedienung(String),
}

impl DuettError {
    /// Gibt true zurueck wenn ein neuer Handshake sinnvoll sein koennte
    pub fn ist_wiederholbar(&self) -> bool {
        matches!(self, Self::Verbindung(_) | Self::Getrennt(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = DuettError::Verbindung("Connection refused".into());
        assert_eq!(e.to_string(), "Verbindung fehlgeschlagen: Connection refused");
    }

    #[test]
    fn wiederholbar_erkennung() {
        assert!(DuettError::Getrennt("eof".into()).ist_wiederholbar());
        assert!(!DuettError::Datei("voll".into()).ist_wiederholbar());
    }

    #[test]
    fn krypto_fehler_ist_nicht_wiederholbar() {
        assert!(!DuettError::Krypto("tag".into()).ist_wiederholbar());
        assert!(!DuettError::Bedienung("Keine offene Verbindungsanfrage".into()).ist_wiederholbar());
    }
}
