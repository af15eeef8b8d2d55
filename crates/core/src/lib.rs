//! duett-core – Gemeinsame Typen, Ereignisse und Fehlertypen
//!
//! Dieses Crate stellt die Bausteine bereit, die Session, Front-End und
//! die Capability-Crates gemeinsam nutzen: den Fehler-Enum, die
//! Ereignisse an die Oberflaeche und kleine Wert-Typen.

pub mod error;
pub mod event;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{DuettError, Result};
pub use event::SessionEvent;
pub use types::{Absender, Endpunkt, VerbindungsModus};
