//! Ablage fuer empfangene Dateien
//!
//! Das `FileStore`-Trait abstrahiert, wo empfangene Dateien landen. Die
//! Session kennt nur den Namen und die Bytes und bekommt den Pfad zurueck.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::ChatResult;
use crate::types::basisname;

/// Standard-Verzeichnis fuer empfangene Dateien
pub const STANDARD_DOWNLOAD_DIR: &str = "downloads";

/// Abstrakte Ablage fuer empfangene Dateien
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Datei unter dem bereinigten Basisnamen ablegen
    ///
    /// Eine vorhandene Datei gleichen Namens wird ueberschrieben. Gibt den
    /// Pfad der abgelegten Datei zurueck.
    async fn save(&self, name: &str, data: &[u8]) -> ChatResult<PathBuf>;

    /// Verzeichnis, in dem die Dateien landen (fuer Statusmeldungen)
    fn verzeichnis(&self) -> &Path;
}

/// Disk-basierte Ablage
///
/// Speichert Dateien flach unter `base_dir/<basisname>`. Das Verzeichnis
/// wird beim ersten Speichern angelegt.
#[derive(Debug, Clone)]
pub struct DiskStore {
    base_dir: PathBuf,
}

impl DiskStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn full_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(basisname(name))
    }
}

impl Default for DiskStore {
    fn default() -> Self {
        Self::new(STANDARD_DOWNLOAD_DIR)
    }
}

#[async_trait]
impl FileStore for DiskStore {
    async fn save(&self, name: &str, data: &[u8]) -> ChatResult<PathBuf> {
        let full = self.full_path(name);

        tokio::fs::create_dir_all(&self.base_dir).await?;
        tokio::fs::write(&full, data).await?;

        tracing::debug!(path = %full.display(), bytes = data.len(), "Datei gespeichert");
        Ok(full)
    }

    fn verzeichnis(&self) -> &Path {
        &self.base_dir
    }
}
