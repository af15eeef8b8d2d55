//! AEAD-Versiegelung einzelner Nachrichten
//!
//! ## Format
//! ```text
//! [nonce(12)] [ciphertext] [auth_tag(16)]
//! ```
//!
//! Jede Nachricht bekommt eine frische Zufalls-Nonce aus dem OS-RNG. Der
//! Blob ist in sich geschlossen und wird sowohl fuer Frames auf der
//! Steuerverbindung als auch fuer einzelne Voice-Datagramme verwendet.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce as AesNonce,
};
use chacha20poly1305::{ChaCha20Poly1305, Nonce as ChaChaNonce};

use crate::error::{CryptoError, CryptoResult};
use crate::types::{SchluesselAlgorithmus, SessionKey};

/// Laenge der Nonce in Bytes (96 Bit)
pub const NONCE_SIZE: usize = 12;

/// Laenge des Auth-Tags in Bytes
pub const TAG_SIZE: usize = 16;

/// Groessenzuwachs pro versiegelter Nachricht
pub const OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;

/// Verschluesselt `plaintext` unter `key`
///
/// Gibt `nonce || ciphertext || tag` zurueck.
pub fn versiegeln(key: &SessionKey, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let (nonce, ciphertext) = match key.algorithmus() {
        SchluesselAlgorithmus::Aes256Gcm => encrypt_aes256gcm(plaintext, key.as_bytes())?,
        SchluesselAlgorithmus::ChaCha20Poly1305 => encrypt_chacha20(plaintext, key.as_bytes())?,
    };

    let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Prueft und entschluesselt einen Blob aus `versiegeln`
///
/// Falscher Schluessel, abgeschnittene oder manipulierte Daten ergeben
/// immer `CryptoError::Entschluesselung`, nie unbemerkt falschen Klartext.
pub fn oeffnen(key: &SessionKey, blob: &[u8]) -> CryptoResult<Vec<u8>> {
    if blob.len() < OVERHEAD {
        return Err(CryptoError::Entschluesselung(format!(
            "Blob zu kurz: {} Bytes (mindestens {OVERHEAD})",
            blob.len()
        )));
    }

    let (nonce, ciphertext) = blob.split_at(NONCE_SIZE);
    match key.algorithmus() {
        SchluesselAlgorithmus::Aes256Gcm => decrypt_aes256gcm(ciphertext, key.as_bytes(), nonce),
        SchluesselAlgorithmus::ChaCha20Poly1305 => {
            decrypt_chacha20(ciphertext, key.as_bytes(), nonce)
        }
    }
}

fn ungueltige_laenge(key_bytes: &[u8]) -> CryptoError {
    CryptoError::UngueltigeSchluesselLaenge {
        erwartet: SessionKey::LAENGE,
        erhalten: key_bytes.len(),
    }
}

fn encrypt_aes256gcm(plaintext: &[u8], key_bytes: &[u8]) -> CryptoResult<([u8; NONCE_SIZE], Vec<u8>)> {
    let cipher = Aes256Gcm::new_from_slice(key_bytes).map_err(|_| ungueltige_laenge(key_bytes))?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| CryptoError::Verschluesselung(e.to_string()))?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    nonce_bytes.copy_from_slice(nonce.as_slice());
    Ok((nonce_bytes, ciphertext))
}

fn encrypt_chacha20(plaintext: &[u8], key_bytes: &[u8]) -> CryptoResult<([u8; NONCE_SIZE], Vec<u8>)> {
    let cipher =
        ChaCha20Poly1305::new_from_slice(key_bytes).map_err(|_| ungueltige_laenge(key_bytes))?;
    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| CryptoError::Verschluesselung(e.to_string()))?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    nonce_bytes.copy_from_slice(nonce.as_slice());
    Ok((nonce_bytes, ciphertext))
}

fn decrypt_aes256gcm(ciphertext: &[u8], key_bytes: &[u8], nonce: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key_bytes).map_err(|_| ungueltige_laenge(key_bytes))?;
    cipher
        .decrypt(AesNonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::Entschluesselung("Auth-Tag ungueltig".into()))
}

fn decrypt_chacha20(ciphertext: &[u8], key_bytes: &[u8], nonce: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher =
        ChaCha20Poly1305::new_from_slice(key_bytes).map_err(|_| ungueltige_laenge(key_bytes))?;
    cipher
        .decrypt(ChaChaNonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::Entschluesselung("Auth-Tag ungueltig".into()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn schluessel(fuell: u8, algorithmus: SchluesselAlgorithmus) -> SessionKey {
        SessionKey::aus_bytes(vec![fuell; SessionKey::LAENGE], algorithmus).unwrap()
    }

    #[test]
    fn versiegeln_oeffnen_aes256gcm() {
        let key = schluessel(7, SchluesselAlgorithmus::Aes256Gcm);
        let blob = versiegeln(&key, b"hallo peer").unwrap();

        assert_eq!(blob.len(), b"hallo peer".len() + OVERHEAD);
        assert_eq!(oeffnen(&key, &blob).unwrap(), b"hallo peer");
    }

    #[test]
    fn versiegeln_oeffnen_chacha20() {
        let key = schluessel(7, SchluesselAlgorithmus::ChaCha20Poly1305);
        let blob = versiegeln(&key, b"hallo peer").unwrap();
        assert_eq!(oeffnen(&key, &blob).unwrap(), b"hallo peer");
    }

    #[test]
    fn leerer_klartext() {
        let key = schluessel(1, SchluesselAlgorithmus::Aes256Gcm);
        let blob = versiegeln(&key, b"").unwrap();
        assert_eq!(blob.len(), OVERHEAD);
        assert!(oeffnen(&key, &blob).unwrap().is_empty());
    }

    #[test]
    fn nonce_ist_pro_nachricht_frisch() {
        let key = schluessel(3, SchluesselAlgorithmus::ChaCha20Poly1305);
        let a = versiegeln(&key, b"gleich").unwrap();
        let b = versiegeln(&key, b"gleich").unwrap();
        assert_ne!(a[..NONCE_SIZE], b[..NONCE_SIZE]);
        assert_ne!(a, b);
    }

    #[test]
    fn falscher_schluessel_schlaegt_fehl() {
        let a = schluessel(1, SchluesselAlgorithmus::Aes256Gcm);
        let b = schluessel(2, SchluesselAlgorithmus::Aes256Gcm);
        let blob = versiegeln(&a, b"geheim").unwrap();

        assert!(matches!(
            oeffnen(&b, &blob),
            Err(CryptoError::Entschluesselung(_))
        ));
    }

    #[test]
    fn falscher_algorithmus_schlaegt_fehl() {
        let a = schluessel(1, SchluesselAlgorithmus::Aes256Gcm);
        let b = schluessel(1, SchluesselAlgorithmus::ChaCha20Poly1305);
        let blob = versiegeln(&a, b"geheim").unwrap();
        assert!(oeffnen(&b, &blob).is_err());
    }

    #[test]
    fn manipuliertes_byte_wird_erkannt() {
        let key = schluessel(9, SchluesselAlgorithmus::ChaCha20Poly1305);
        let mut blob = versiegeln(&key, b"unveraendert").unwrap();
        let mitte = blob.len() / 2;
        blob[mitte] ^= 0x01;
        assert!(oeffnen(&key, &blob).is_err());
    }

    #[test]
    fn zu_kurzer_blob() {
        let key = schluessel(9, SchluesselAlgorithmus::Aes256Gcm);
        let err = oeffnen(&key, &[0u8; OVERHEAD - 1]).unwrap_err();
        assert!(err.to_string().contains("zu kurz"));
    }
}
