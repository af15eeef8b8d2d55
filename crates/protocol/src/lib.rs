//! duett-protocol – Nachrichtenmodell und Wire-Format
//!
//! Dieses Crate definiert die Nachrichten, die zwei Peers ueber die
//! Steuerverbindung austauschen (`envelope`), und das verschluesselte,
//! laengenpraefixierte Frame-Format darunter (`wire`).

pub mod envelope;
pub mod error;
pub mod wire;

pub use envelope::{Envelope, FileTransfer};
pub use error::{FrameError, ProtocolError};
pub use wire::{FrameCodec, DEFAULT_MAX_FRAME_SIZE, LENGTH_FIELD_SIZE};
