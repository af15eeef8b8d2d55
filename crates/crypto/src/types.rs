//! Gemeinsame Typen fuer das Kryptografie-Subsystem

use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, CryptoResult};

/// Sicherer Schluessel-Container (wird beim Drop genullt)
#[derive(Clone)]
pub struct SecretBytes(Vec<u8>);

impl Drop for SecretBytes {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

impl std::fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretBytes([REDACTED] {} bytes)", self.0.len())
    }
}

impl SecretBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// AEAD-Algorithmus einer Session
///
/// Beide Seiten muessen denselben Algorithmus konfigurieren, sonst schlaegt
/// jede Entschluesselung fehl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SchluesselAlgorithmus {
    #[default]
    #[serde(rename = "aes-256-gcm")]
    Aes256Gcm,
    #[serde(rename = "chacha20-poly1305")]
    ChaCha20Poly1305,
}

/// Symmetrischer Sitzungsschluessel (32 Bytes) samt Algorithmus
///
/// Wird von Session und Voice-Kanal gemeinsam genutzt. `Debug` gibt den
/// Schluessel nie aus.
#[derive(Debug, Clone)]
pub struct SessionKey {
    bytes: SecretBytes,
    algorithmus: SchluesselAlgorithmus,
}

impl SessionKey {
    /// Schluessellaenge in Bytes fuer beide Algorithmen
    pub const LAENGE: usize = 32;

    pub fn aus_bytes(bytes: Vec<u8>, algorithmus: SchluesselAlgorithmus) -> CryptoResult<Self> {
        if bytes.len() != Self::LAENGE {
            return Err(CryptoError::UngueltigeSchluesselLaenge {
                erwartet: Self::LAENGE,
                erhalten: bytes.len(),
            });
        }
        Ok(Self {
            bytes: SecretBytes::new(bytes),
            algorithmus,
        })
    }

    pub fn algorithmus(&self) -> SchluesselAlgorithmus {
        self.algorithmus
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.bytes.as_bytes()
    }

    /// Verschluesselt `plaintext` mit frischer Nonce
    pub fn versiegeln(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        crate::cipher::versiegeln(self, plaintext)
    }

    /// Prueft und entschluesselt einen mit `versiegeln` erzeugten Blob
    pub fn oeffnen(&self, blob: &[u8]) -> CryptoResult<Vec<u8>> {
        crate::cipher::oeffnen(self, blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_bytes_debug_ist_geschwaerzt() {
        let s = SecretBytes::new(vec![0xAB; 32]);
        let dbg = format!("{s:?}");
        assert!(dbg.contains("REDACTED"));
        assert!(!dbg.contains("171"));
    }

    #[test]
    fn session_key_falsche_laenge() {
        let err = SessionKey::aus_bytes(vec![0; 16], SchluesselAlgorithmus::Aes256Gcm).unwrap_err();
        assert!(matches!(
            err,
            CryptoError::UngueltigeSchluesselLaenge {
                erwartet: 32,
                erhalten: 16
            }
        ));
    }

    #[test]
    fn algorithmus_serde_namen() {
        let json = serde_json::to_string(&SchluesselAlgorithmus::ChaCha20Poly1305).unwrap();
        assert_eq!(json, "\"chacha20-poly1305\"");
        let alg: SchluesselAlgorithmus = serde_json::from_str("\"aes-256-gcm\"").unwrap();
        assert_eq!(alg, SchluesselAlgorithmus::Aes256Gcm);
    }
}
