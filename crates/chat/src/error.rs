//! Fehlertypen fuer das Chat-Crate

use thiserror::Error;

/// Fehler beim Ablegen oder Lesen von Dateien
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

pub type ChatResult<T> = Result<T, ChatError>;
