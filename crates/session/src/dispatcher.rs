//! Dispatch empfangener Nachrichten

use duett_chat::{basisname, DateiArt};
use duett_core::{Absender, SessionEvent};
use duett_protocol::{Envelope, FileTransfer};
use tracing::{info, warn};

use crate::session::Session;

/// Wie der Empfangs-Loop nach einer Nachricht weitermacht
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Steuerung {
    Weiter,
    Beenden,
}

impl Session {
    pub(crate) async fn verarbeiten(&self, envelope: Envelope) -> Steuerung {
        match envelope {
            Envelope::Text(text) => {
                self.melden(SessionEvent::Nachricht {
                    text,
                    absender: Absender::Peer,
                });
                Steuerung::Weiter
            }
            Envelope::Disconnect => {
                info!(peer = ?self.peer_addr(), "Gegenstelle hat die Session beendet");
                Steuerung::Beenden
            }
            Envelope::File(datei) => self.datei_empfangen(datei, DateiArt::Datei).await,
            Envelope::Image(datei) => self.datei_empfangen(datei, DateiArt::Bild).await,
            Envelope::Audio(datei) => self.datei_empfangen(datei, DateiArt::Audio).await,
            Envelope::CallRequest { udp_port } => self.anruf_angeboten(udp_port).await,
            Envelope::CallAccepted { udp_port } => self.anruf_angenommen(udp_port).await,
            Envelope::CallRejected => self.anruf_abgelehnt().await,
            Envelope::CallEnd => self.anruf_beendet().await,
        }
    }

    /// Legt eine empfangene Datei ab; ein Ablagefehler beendet die Session nicht
    async fn datei_empfangen(&self, datei: FileTransfer, art: DateiArt) -> Steuerung {
        let name = basisname(&datei.name);

        let pfad = match self.inner.store.save(&datei.name, &datei.data).await {
            Ok(pfad) => pfad,
            Err(e) => {
                warn!(datei = %name, fehler = %e, "Datei konnte nicht gespeichert werden");
                self.melden(SessionEvent::system(format!(
                    "Failed to save file '{name}': {e}"
                )));
                return Steuerung::Weiter;
            }
        };

        info!(pfad = %pfad.display(), bytes = datei.data.len(), art = ?art, "Datei empfangen");

        let event = match art {
            DateiArt::Bild => SessionEvent::Bild {
                pfad,
                absender: Absender::Peer,
            },
            DateiArt::Audio => SessionEvent::Audio {
                pfad,
                dauer: datei.duration.unwrap_or(0.0),
                absender: Absender::Peer,
            },
            DateiArt::Datei => SessionEvent::system(format!(
                "File '{name}' received and saved to '{}'.",
                self.inner.store.verzeichnis().display()
            )),
        };
        self.melden(event);
        Steuerung::Weiter
    }
}
