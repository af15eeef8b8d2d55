//! duett-chat – Ablage empfangener Dateien
//!
//! Dieses Crate implementiert:
//! - `FileStore`-Trait: Datei unter einem Namen ablegen, Pfad zurueckgeben
//! - `DiskStore`: Ablage in einem lokalen Verzeichnis (Standard `downloads`)
//! - Bereinigung fremder Dateinamen und Erkennung der Dateiart
//!
//! # Beispiel
//!
//! ```no_run
//! use duett_chat::{DiskStore, FileStore};
//!
//! # async fn beispiel() -> duett_chat::ChatResult<()> {
//! let store = DiskStore::new("downloads");
//! let pfad = store.save("../../etc/passwd", b"harmlos").await?;
//! assert!(pfad.ends_with("passwd"));
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod storage;
pub mod types;


// Bequeme Re-Exporte
pub use error::{ChatError, ChatResult};
pub use storage::{DiskStore, FileStore, STANDARD_DOWNLOAD_DIR};
pub use types::{basisname, DateiArt};
