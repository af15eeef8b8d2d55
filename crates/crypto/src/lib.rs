//! # duett-crypto
//!
//! Symmetrische Verschluesselung fuer Duett-Sessions.
//!
//! ## Module
//! - `cipher` - AEAD-Versiegelung einzelner Nachrichten (`nonce || ct || tag`)
//! - `kdf` - Ableitung des Sitzungsschluessels aus dem gemeinsamen Geheimnis
//! - `types` - Schluessel-Container und Algorithmus-Auswahl
//! - `error` - Fehlertypen

pub mod cipher;
pub mod error;
pub mod kdf;
pub mod types;

// Bequeme Re-Exports
pub use cipher::{oeffnen, versiegeln, NONCE_SIZE, OVERHEAD, TAG_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use kdf::{Argon2Ableitung, Argon2Parameter, KeyDerivation, STANDARD_SALT};
pub use types::{SchluesselAlgorithmus, SecretBytes, SessionKey};
