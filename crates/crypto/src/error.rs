//! Fehlertypen fuer das Kryptografie-Subsystem

use thiserror::Error;

/// Fehler im Kryptografie-Subsystem
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Verschluesselung fehlgeschlagen: {0}")]
    Verschluesselung(String),

    /// Authentifizierung des Ciphertexts fehlgeschlagen (falscher Schluessel
    /// oder manipulierte Daten)
    #[error("Entschluesselung fehlgeschlagen: {0}")]
    Entschluesselung(String),

    #[error("Ungueltige Schluessel-Laenge: erwartet {erwartet}, erhalten {erhalten}")]
    UngueltigeSchluesselLaenge { erwartet: usize, erhalten: usize },

    #[error("Key Derivation fehlgeschlagen: {0}")]
    KeyDerivation(String),
}

pub type CryptoResult<T> = Result<T, CryptoError>;
