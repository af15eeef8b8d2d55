//! Anruf-Signalisierung
//!
//! Die Signale (`call_request`, `call_accepted`, `call_rejected`,
//! `call_end`) laufen ueber die verschluesselte Steuerverbindung. Der
//! Medienpfad ist ein eigener `VoiceChannel` ueber UDP, der nur im
//! Zustand `Aktiv` existiert.
//!
//! ```text
//! Leerlauf --send_call_request--> AusgehendKlingelt --call_accepted--> Aktiv
//! Leerlauf --call_request-------> EingehendKlingelt --accept_call----> Aktiv
//! jeder Zustand --reject/end/Abbau--> Leerlauf
//! ```
//!
//! Alle Operationen halten den Anruf-Lock fuer ihre gesamte Dauer. Die
//! Reihenfolge ist immer: Anruf-Lock, dann Schreib-Lock.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use duett_core::SessionEvent;
use duett_protocol::Envelope;
use duett_voice::VoiceChannel;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::dispatcher::Steuerung;
use crate::error::{SessionError, SessionResult};
use crate::session::Session;

/// Zustand der Anruf-Signalisierung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnrufZustand {
    #[default]
    Leerlauf,
    /// Eigene Anfrage ist raus, Antwort steht aus
    AusgehendKlingelt,
    /// Anfrage der Gegenstelle liegt vor
    EingehendKlingelt,
    Aktiv,
}

/// Anrufzustand samt der Ressourcen, die zum jeweiligen Zustand gehoeren
#[derive(Debug, Default)]
pub(crate) struct CallSignaling {
    zustand: AnrufZustand,
    /// Vorab gebundener Socket eines ausgehenden Anrufs
    wartender_socket: Option<UdpSocket>,
    /// UDP-Port aus der eingehenden Anfrage
    angebotener_port: Option<u16>,
    kanal: Option<VoiceChannel>,
}

impl CallSignaling {
    pub(crate) fn zustand(&self) -> AnrufZustand {
        self.zustand
    }

    fn ausgehend(&mut self, socket: UdpSocket) {
        self.zustand = AnrufZustand::AusgehendKlingelt;
        self.wartender_socket = Some(socket);
    }

    fn eingehend(&mut self, udp_port: u16) {
        self.zustand = AnrufZustand::EingehendKlingelt;
        self.angebotener_port = Some(udp_port);
    }

    fn aktivieren(&mut self, kanal: VoiceChannel) {
        self.zustand = AnrufZustand::Aktiv;
        self.wartender_socket = None;
        self.angebotener_port = None;
        self.kanal = Some(kanal);
    }

    /// Zurueck auf `Leerlauf`; ein laufender Sprachkanal wird gestoppt
    pub(crate) async fn zuruecksetzen(&mut self) {
        if let Some(mut kanal) = self.kanal.take() {
            kanal.stoppen().await;
        }
        self.wartender_socket = None;
        self.angebotener_port = None;
        self.zustand = AnrufZustand::Leerlauf;
    }
}

/// Bindet einen UDP-Socket passend zur Adressfamilie der Gegenstelle
async fn udp_binden(peer: SocketAddr) -> std::io::Result<(UdpSocket, u16)> {
    let lokal = match peer {
        SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
        SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
    };
    let socket = UdpSocket::bind(lokal).await?;
    let port = socket.local_addr()?.port();
    Ok((socket, port))
}

fn steuerung_nach(ergebnis: SessionResult<()>) -> Steuerung {
    match ergebnis {
        Err(e) if e.ist_transportfehler() => Steuerung::Beenden,
        _ => Steuerung::Weiter,
    }
}

impl Session {
    pub async fn anruf_zustand(&self) -> AnrufZustand {
        self.inner.anruf.lock().await.zustand()
    }

    /// UDP-Port aus der offenen Anrufanfrage der Gegenstelle
    pub async fn angebotener_port(&self) -> Option<u16> {
        self.inner.anruf.lock().await.angebotener_port
    }

    /// Bindet einen UDP-Port und bietet ihn der Gegenstelle an
    pub async fn send_call_request(&self) -> SessionResult<()> {
        let mut anruf = self.inner.anruf.lock().await;
        self.verbunden_pruefen()?;
        if anruf.zustand() != AnrufZustand::Leerlauf {
            return Err(SessionError::AnrufZustand { ist: anruf.zustand() });
        }
        let peer = self.peer_addr().ok_or(SessionError::NichtVerbunden)?;

        let (socket, udp_port) = match udp_binden(peer).await {
            Ok(gebunden) => gebunden,
            Err(e) => {
                self.melden(SessionEvent::anruf_status(format!("Call failed: {e}")));
                return Err(e.into());
            }
        };

        if let Err(e) = self.senden(&Envelope::CallRequest { udp_port }).await {
            self.melden(SessionEvent::anruf_status(format!("Call failed: {e}")));
            return Err(e);
        }

        anruf.ausgehend(socket);
        info!(udp_port, "Anruf angefragt");
        self.melden(SessionEvent::anruf_status("Ringing..."));
        Ok(())
    }

    /// Nimmt den eingehenden Anruf an und startet den Sprachkanal
    ///
    /// `peer_port` ist der UDP-Port aus der `Anrufanfrage`.
    pub async fn accept_call(&self, peer_port: u16) -> SessionResult<()> {
        let mut anruf = self.inner.anruf.lock().await;
        self.verbunden_pruefen()?;
        if anruf.zustand() != AnrufZustand::EingehendKlingelt {
            return Err(SessionError::AnrufZustand { ist: anruf.zustand() });
        }
        let peer = self.peer_addr().ok_or(SessionError::NichtVerbunden)?;

        let ergebnis = self.anruf_annehmen(peer, peer_port).await;
        match ergebnis {
            Ok(kanal) => {
                info!(peer_port, lokal = kanal.lokaler_port(), "Anruf angenommen");
                anruf.aktivieren(kanal);
                self.melden(SessionEvent::anruf_status("Call connected. Starting stream..."));
                Ok(())
            }
            Err(e) => {
                warn!(fehler = %e, "Anruf konnte nicht angenommen werden");
                anruf.zuruecksetzen().await;
                self.melden(SessionEvent::anruf_status(format!("Accept failed: {e}")));
                Err(e)
            }
        }
    }

    async fn anruf_annehmen(&self, peer: SocketAddr, peer_port: u16) -> SessionResult<VoiceChannel> {
        let (socket, udp_port) = udp_binden(peer).await?;
        self.senden(&Envelope::CallAccepted { udp_port }).await?;

        match self.kanal_starten(socket, SocketAddr::new(peer.ip(), peer_port)).await {
            Ok(kanal) => Ok(kanal),
            Err(e) => {
                if let Err(sende_fehler) = self.senden(&Envelope::CallEnd).await {
                    debug!(fehler = %sende_fehler, "call_end nicht gesendet");
                }
                Err(e)
            }
        }
    }

    async fn kanal_starten(&self, socket: UdpSocket, ziel: SocketAddr) -> SessionResult<VoiceChannel> {
        let kanal = VoiceChannel::starten(
            socket,
            ziel,
            self.inner.key.clone(),
            self.inner.audio.clone(),
            self.inner.config.audio,
        )
        .await?;
        Ok(kanal)
    }

    /// Lehnt einen klingelnden Anruf ab oder zieht die eigene Anfrage zurueck
    pub async fn reject_call(&self) -> SessionResult<()> {
        let mut anruf = self.inner.anruf.lock().await;
        match anruf.zustand() {
            AnrufZustand::EingehendKlingelt | AnrufZustand::AusgehendKlingelt => {}
            ist => return Err(SessionError::AnrufZustand { ist }),
        }

        let ergebnis = self.senden(&Envelope::CallRejected).await;
        anruf.zuruecksetzen().await;
        info!("Anruf abgelehnt");
        self.melden(SessionEvent::anruf_status("Call ended."));
        ergebnis
    }

    /// Beendet den aktiven Anruf
    pub async fn end_call(&self) -> SessionResult<()> {
        let mut anruf = self.inner.anruf.lock().await;
        if anruf.zustand() != AnrufZustand::Aktiv {
            return Err(SessionError::AnrufZustand { ist: anruf.zustand() });
        }

        let ergebnis = self.senden(&Envelope::CallEnd).await;
        anruf.zuruecksetzen().await;
        info!("Anruf beendet");
        self.melden(SessionEvent::anruf_status("Call ended."));
        ergebnis
    }

    // -----------------------------------------------------------------------
    // Empfangene Signale
    // -----------------------------------------------------------------------

    pub(crate) async fn anruf_angeboten(&self, udp_port: u16) -> Steuerung {
        let mut anruf = self.inner.anruf.lock().await;

        if anruf.zustand() != AnrufZustand::Leerlauf {
            warn!(zustand = ?anruf.zustand(), udp_port, "Anrufanfrage waehrend laufendem Anruf abgelehnt");
            return steuerung_nach(self.senden(&Envelope::CallRejected).await);
        }

        anruf.eingehend(udp_port);
        info!(udp_port, "Eingehender Anruf");
        self.melden(SessionEvent::Anrufanfrage { udp_port });
        Steuerung::Weiter
    }

    pub(crate) async fn anruf_angenommen(&self, udp_port: u16) -> Steuerung {
        let mut anruf = self.inner.anruf.lock().await;

        if anruf.zustand() != AnrufZustand::AusgehendKlingelt {
            debug!(zustand = ?anruf.zustand(), "call_accepted ohne eigene Anfrage ignoriert");
            return Steuerung::Weiter;
        }
        let (Some(socket), Some(peer)) = (anruf.wartender_socket.take(), self.peer_addr()) else {
            warn!("Kein vorbereiteter Socket fuer den Anruf");
            anruf.zuruecksetzen().await;
            return Steuerung::Weiter;
        };

        match self.kanal_starten(socket, SocketAddr::new(peer.ip(), udp_port)).await {
            Ok(kanal) => {
                info!(udp_port, "Anruf verbunden");
                anruf.aktivieren(kanal);
                self.melden(SessionEvent::anruf_status("Call connected. Starting stream..."));
                Steuerung::Weiter
            }
            Err(e) => {
                warn!(fehler = %e, "Sprachkanal konnte nicht gestartet werden");
                anruf.zuruecksetzen().await;
                self.melden(SessionEvent::anruf_status(format!("Call failed: {e}")));
                steuerung_nach(self.senden(&Envelope::CallEnd).await)
            }
        }
    }

    pub(crate) async fn anruf_abgelehnt(&self) -> Steuerung {
        let mut anruf = self.inner.anruf.lock().await;
        match anruf.zustand() {
            AnrufZustand::AusgehendKlingelt | AnrufZustand::EingehendKlingelt => {
                anruf.zuruecksetzen().await;
                info!("Anruf von Gegenstelle abgelehnt");
                self.melden(SessionEvent::anruf_status("Call rejected by peer."));
            }
            ist => debug!(zustand = ?ist, "call_rejected ignoriert"),
        }
        Steuerung::Weiter
    }

    pub(crate) async fn anruf_beendet(&self) -> Steuerung {
        let mut anruf = self.inner.anruf.lock().await;
        if anruf.zustand() == AnrufZustand::Leerlauf {
            debug!("call_end ohne Anruf ignoriert");
            return Steuerung::Weiter;
        }
        anruf.zuruecksetzen().await;
        info!("Anruf von Gegenstelle beendet");
        self.melden(SessionEvent::anruf_status("Call ended by peer."));
        Steuerung::Weiter
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
