//! # duett-voice
//!
//! Der Medienpfad eines Anrufs: rohe PCM-Chunks vom Mikrofon werden
//! einzeln versiegelt und als je ein UDP-Datagramm zur Gegenstelle
//! geschickt. Empfangene Datagramme werden entschluesselt und abgespielt.
//!
//! ## Architektur
//!
//! ```text
//! Aufnahme-Thread (std::thread)         Empfangs-Task (tokio)
//!   CaptureStream::read(chunk)            UdpSocket::recv_from
//!   -> SessionKey::versiegeln             -> SessionKey::oeffnen (Fehler = verwerfen)
//!   -> UdpSocket::try_send_to(peer)       -> Wiedergabe-Queue
//!                                                |
//!                                       Wiedergabe-Thread (std::thread)
//!                                         -> PlaybackStream::write
//! ```
//!
//! Beide Richtungen sind unabhaengig; jeder Thread besitzt genau einen
//! Stream und schliesst ihn beim Beenden.
//!
//! Das Audio-Geraet selbst ist eine Faehigkeit von aussen (`AudioDevice`).
//! Mitgeliefert werden ein stilles Geraet und ein In-Memory-Geraet.
//! Es gibt weder Jitter-Buffer noch Paketverlust-Verschleierung: ein
//! verlorenes Datagramm ist ein verlorener Chunk.

pub mod channel;
pub mod config;
pub mod device;
pub mod error;

pub use channel::VoiceChannel;
pub use config::AudioConfig;
pub use device::{AudioDevice, CaptureStream, PlaybackStream, SpeicherGeraet, StilleGeraet};
pub use error::{AudioError, AudioResult, VoiceError, VoiceResult};
