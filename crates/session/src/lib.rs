//! duett-session – Peer-Session ueber eine verschluesselte TCP-Verbindung
//!
//! Dieser Crate implementiert die Session zwischen genau zwei Peers:
//! Handshake mit expliziter Annahme/Ablehnung, die Empfangsschleife mit
//! Dispatch der Nachrichten und die Anruf-Signalisierung, die fuer die
//! Dauer eines Anrufs einen `VoiceChannel` besitzt.
//!
//! ## Architektur
//!
//! ```text
//! listen() / connect()
//!     |
//!     v
//! Accept-Task (pro lauschender Session einer)
//!     |  Leerlauf -> Lauschend -> WartetAufEntscheidung -> Verbunden
//!     |                 ^                 |
//!     |                 +---- reject -----+
//!     v
//! Empfangs-Task: FrameCodec -> Envelope -> Dispatcher
//!     |
//!     +-- Text / Datei / Bild / Audio  -> SessionEvent
//!     +-- disconnect                   -> Abbau
//!     +-- call_*                       -> CallSignaling -> VoiceChannel
//! ```
//!
//! Alle Rueckmeldungen laufen geordnet ueber einen `SessionEvent`-Kanal.

pub mod call;
pub mod config;
mod dispatcher;
pub mod error;
pub mod session;

// Bequeme Re-Exporte
pub use call::AnrufZustand;
pub use config::SessionConfig;
pub use error::{SessionError, SessionResult};
pub use session::{EventEmpfaenger, Session, SessionZustand};
