//! Ableitung des Sitzungsschluessels aus dem gemeinsamen Geheimnis
//!
//! Die Ableitung ist eine austauschbare Faehigkeit (`KeyDerivation`). Der
//! mitgelieferte Standard ist Argon2id mit festem Salt, damit beide Seiten
//! aus demselben Geheimnis ohne weiteren Austausch denselben Schluessel
//! erhalten.

use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, CryptoResult};
use crate::types::{SchluesselAlgorithmus, SessionKey};

/// Salt, den beide Seiten ohne Konfiguration verwenden
pub const STANDARD_SALT: &[u8] = b"p2p_chat_salt_";

/// Erzeugt einen symmetrischen Schluessel aus Geheimnis und Salt
pub trait KeyDerivation: Send + Sync {
    fn ableiten(&self, geheimnis: &str, salt: &[u8]) -> CryptoResult<SessionKey>;
}

/// Kostenparameter fuer Argon2id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Argon2Parameter {
    /// Speicherbedarf in KiB
    pub speicher_kib: u32,
    pub iterationen: u32,
    pub parallelitaet: u32,
}

impl Default for Argon2Parameter {
    fn default() -> Self {
        Self {
            speicher_kib: 64 * 1024, // 64 MiB
            iterationen: 3,
            parallelitaet: 1,
        }
    }
}

/// Argon2id-Ableitung mit konfigurierbaren Kosten
#[derive(Debug, Clone, Default)]
pub struct Argon2Ableitung {
    parameter: Argon2Parameter,
    algorithmus: SchluesselAlgorithmus,
}

impl Argon2Ableitung {
    pub fn neu(parameter: Argon2Parameter, algorithmus: SchluesselAlgorithmus) -> Self {
        Self {
            parameter,
            algorithmus,
        }
    }

    fn argon2_instanz(&self) -> CryptoResult<Argon2<'static>> {
        let params = Params::new(
            self.parameter.speicher_kib,
            self.parameter.iterationen,
            self.parameter.parallelitaet,
            Some(SessionKey::LAENGE),
        )
        .map_err(|e| CryptoError::KeyDerivation(format!("Argon2-Parameter ungueltig: {e}")))?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

impl KeyDerivation for Argon2Ableitung {
    fn ableiten(&self, geheimnis: &str, salt: &[u8]) -> CryptoResult<SessionKey> {
        let argon2 = self.argon2_instanz()?;

        let mut ausgabe = vec![0u8; SessionKey::LAENGE];
        argon2
            .hash_password_into(geheimnis.as_bytes(), salt, &mut ausgabe)
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

        tracing::debug!(
            algorithmus = ?self.algorithmus,
            speicher_kib = self.parameter.speicher_kib,
            "Sitzungsschluessel abgeleitet"
        );
        SessionKey::aus_bytes(ausgabe, self.algorithmus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn billige_ableitung(algorithmus: SchluesselAlgorithmus) -> Argon2Ableitung {
        Argon2Ableitung::neu(
            Argon2Parameter {
                speicher_kib: 8,
                iterationen: 1,
                parallelitaet: 1,
            },
            algorithmus,
        )
    }

    #[test]
    fn gleiches_geheimnis_gleicher_schluessel() {
        let kdf = billige_ableitung(SchluesselAlgorithmus::Aes256Gcm);
        let a = kdf.ableiten("hunter2", STANDARD_SALT).unwrap();
        let b = kdf.ableiten("hunter2", STANDARD_SALT).unwrap();

        // Gleicher Schluessel: Blob von a laesst sich mit b oeffnen
        let blob = a.versiegeln(b"hello").unwrap();
        assert_eq!(b.oeffnen(&blob).unwrap(), b"hello");
    }

    #[test]
    fn anderes_geheimnis_anderer_schluessel() {
        let kdf = billige_ableitung(SchluesselAlgorithmus::ChaCha20Poly1305);
        let a = kdf.ableiten("hunter2", STANDARD_SALT).unwrap();
        let b = kdf.ableiten("hunter3", STANDARD_SALT).unwrap();

        let blob = a.versiegeln(b"hello").unwrap();
        assert!(b.oeffnen(&blob).is_err());
    }

    #[test]
    fn algorithmus_wird_uebernommen() {
        let kdf = billige_ableitung(SchluesselAlgorithmus::ChaCha20Poly1305);
        let key = kdf.ableiten("x", STANDARD_SALT).unwrap();
        assert_eq!(key.algorithmus(), SchluesselAlgorithmus::ChaCha20Poly1305);
    }

    #[test]
    fn zu_kurzer_salt_wird_abgelehnt() {
        let kdf = billige_ableitung(SchluesselAlgorithmus::Aes256Gcm);
        let err = kdf.ableiten("hunter2", b"kurz").unwrap_err();
        assert!(matches!(err, CryptoError::KeyDerivation(_)));
    }

    #[test]
    fn ungueltige_parameter_werden_gemeldet() {
        let kdf = Argon2Ableitung::neu(
            Argon2Parameter {
                speicher_kib: 64,
                iterationen: 0,
                parallelitaet: 1,
            },
            SchluesselAlgorithmus::Aes256Gcm,
        );
        let err = kdf.ableiten("hunter2", STANDARD_SALT).unwrap_err();
        assert!(err.to_string().contains("Argon2-Parameter ungueltig"));
    }

    #[test]
    fn standard_parameter() {
        let p = Argon2Parameter::default();
        assert_eq!(p.speicher_kib, 65536);
        assert_eq!(p.iterationen, 3);
        assert_eq!(p.parallelitaet, 1);
    }
}
