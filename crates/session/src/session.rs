//! Session – Handshake, Steuerverbindung und Abbau
//!
//! Eine `Session` verwaltet hoechstens eine Verbindung zu genau einem Peer.
//! Nach dem Abbau ist sie `Geschlossen`; fuer einen neuen Versuch wird eine
//! neue Session mit demselben Schluessel erzeugt.
//!
//! ## State Machine
//! ```text
//! Leerlauf -> Lauschend -> WartetAufEntscheidung -> Verbunden -> Geschlossen
//!    |            ^                 |                   ^
//!    |            +---- reject -----+                   |
//!    +-> Verbindet ---------------------------------------+
//!            |
//!            +-> Leerlauf (Verbindungsaufbau fehlgeschlagen)
//! ```
//!
//! ## Schreibpfad
//! Alle ausgehenden Frames laufen durch einen `tokio::sync::Mutex` um den
//! `FramedWrite`. Der Lock wird fuer einen vollstaendigen Frame gehalten.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use duett_chat::{basisname, DateiArt, FileStore};
use duett_core::{Absender, SessionEvent};
use duett_crypto::SessionKey;
use duett_protocol::{Envelope, FileTransfer, FrameCodec, FrameError};
use duett_voice::AudioDevice;
use futures_util::SinkExt;
use parking_lot::Mutex;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::codec::FramedWrite;
use tracing::{debug, error, info, trace, warn};

use crate::call::CallSignaling;
use crate::config::SessionConfig;
use crate::dispatcher::Steuerung;
use crate::error::{SessionError, SessionResult};

/// Pause nach einem fehlgeschlagenen `accept`, bevor der Listener erneut wartet
const ACCEPT_PAUSE: Duration = Duration::from_millis(10);

/// Empfangsseite der Session-Ereignisse
pub type EventEmpfaenger = mpsc::UnboundedReceiver<SessionEvent>;

// ---------------------------------------------------------------------------
// Sessionzustand
// ---------------------------------------------------------------------------

/// Zustand der Steuerverbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionZustand {
    /// Noch nichts gestartet
    Leerlauf,
    /// Listener gebunden, wartet auf eine Verbindung
    Lauschend,
    /// Verbindung angekommen, Annahme/Ablehnung steht aus
    WartetAufEntscheidung,
    /// Ausgehender Verbindungsaufbau laeuft
    Verbindet,
    Verbunden,
    /// Endzustand
    Geschlossen,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Peer-Session
///
/// Klone teilen sich dieselbe Session. Accept- und Empfangs-Task halten
/// jeweils einen Klon, solange sie laufen.
#[derive(Clone)]
pub struct Session {
    pub(crate) inner: Arc<SessionInner>,
}

pub(crate) struct SessionInner {
    pub(crate) key: SessionKey,
    pub(crate) config: SessionConfig,
    pub(crate) store: Arc<dyn FileStore>,
    pub(crate) audio: Arc<dyn AudioDevice>,
    events: mpsc::UnboundedSender<SessionEvent>,
    zustand: Mutex<SessionZustand>,
    /// Schreibhaelfte der Verbindung; `None` solange nicht verbunden
    writer: tokio::sync::Mutex<Option<FramedWrite<OwnedWriteHalf, FrameCodec>>>,
    peer_addr: Mutex<Option<SocketAddr>>,
    /// Rendezvous fuer die Annahme-Entscheidung einer eingehenden Verbindung
    entscheidung: Mutex<Option<oneshot::Sender<bool>>>,
    shutdown_tx: watch::Sender<bool>,
    pub(crate) anruf: tokio::sync::Mutex<CallSignaling>,
}

impl Session {
    /// Erstellt eine neue Session im Zustand `Leerlauf`
    ///
    /// Wird der `EventEmpfaenger` gedroppt, nimmt die Session eingehende
    /// Verbindungen automatisch an.
    pub fn neu(
        key: SessionKey,
        config: SessionConfig,
        store: Arc<dyn FileStore>,
        audio: Arc<dyn AudioDevice>,
    ) -> (Self, EventEmpfaenger) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = watch::channel(false);

        let inner = SessionInner {
            key,
            config,
            store,
            audio,
            events,
            zustand: Mutex::new(SessionZustand::Leerlauf),
            writer: tokio::sync::Mutex::new(None),
            peer_addr: Mutex::new(None),
            entscheidung: Mutex::new(None),
            shutdown_tx,
            anruf: tokio::sync::Mutex::new(CallSignaling::default()),
        };

        (
            Self {
                inner: Arc::new(inner),
            },
            events_rx,
        )
    }

    pub fn zustand(&self) -> SessionZustand {
        *self.inner.zustand.lock()
    }

    pub fn ist_verbunden(&self) -> bool {
        self.zustand() == SessionZustand::Verbunden
    }

    /// Adresse der Gegenstelle, sobald eine Verbindung angenommen wurde
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        *self.inner.peer_addr.lock()
    }

    pub(crate) fn melden(&self, event: SessionEvent) {
        if self.inner.events.send(event).is_err() {
            trace!("Kein Event-Empfaenger mehr");
        }
    }

    /// Wechselt atomar von einem der erlaubten Zustaende nach `neu`
    fn zustand_wechseln(
        &self,
        erlaubt: &[SessionZustand],
        neu: SessionZustand,
    ) -> SessionResult<SessionZustand> {
        let mut zustand = self.inner.zustand.lock();
        if !erlaubt.contains(&*zustand) {
            return Err(SessionError::FalscherZustand { ist: *zustand });
        }
        Ok(std::mem::replace(&mut *zustand, neu))
    }

    pub(crate) fn verbunden_pruefen(&self) -> SessionResult<()> {
        if self.ist_verbunden() {
            Ok(())
        } else {
            Err(SessionError::NichtVerbunden)
        }
    }

    // -----------------------------------------------------------------------
    // Handshake
    // -----------------------------------------------------------------------

    /// Bindet einen Listener und wartet im Hintergrund auf eine Verbindung
    ///
    /// Gibt die tatsaechlich gebundene Adresse zurueck (Port 0 = OS waehlt).
    pub async fn listen(&self, host: &str, port: u16) -> SessionResult<SocketAddr> {
        self.zustand_wechseln(&[SessionZustand::Leerlauf], SessionZustand::Lauschend)?;

        let gebunden = match listener_binden(host, port).await {
            Ok(gebunden) => gebunden,
            Err(e) => {
                warn!(host, port, fehler = %e, "Listener konnte nicht gebunden werden");
                let _ = self.zustand_wechseln(&[SessionZustand::Lauschend], SessionZustand::Leerlauf);
                self.melden(SessionEvent::status(format!("Listen failed: {e}"), false));
                return Err(e.into());
            }
        };
        let (listener, lokale_addr) = gebunden;

        info!(adresse = %lokale_addr, "Warte auf eingehende Verbindung");
        self.melden(SessionEvent::status(
            format!("Listening on {host}:{}...", lokale_addr.port()),
            false,
        ));

        let shutdown_rx = self.inner.shutdown_tx.subscribe();
        tokio::spawn(self.clone().accept_loop(listener, shutdown_rx));

        Ok(lokale_addr)
    }

    /// Verbindet aktiv zur Gegenstelle
    ///
    /// Schlaegt der Aufbau fehl, ist die Session wieder im `Leerlauf` und
    /// kann es erneut versuchen.
    pub async fn connect(&self, host: &str, port: u16) -> SessionResult<()> {
        self.zustand_wechseln(&[SessionZustand::Leerlauf], SessionZustand::Verbindet)?;

        match stream_verbinden(host, port).await {
            Ok((stream, peer)) => {
                if !self
                    .verbindung_aufnehmen(stream, peer, &[SessionZustand::Verbindet])
                    .await
                {
                    return Err(SessionError::FalscherZustand { ist: self.zustand() });
                }
                info!(peer = %peer, "Verbunden");
                self.melden(SessionEvent::status(format!("Connected to {host}:{port}"), true));
                Ok(())
            }
            Err(e) => {
                warn!(host, port, fehler = %e, "Verbindungsaufbau fehlgeschlagen");
                let _ = self.zustand_wechseln(&[SessionZustand::Verbindet], SessionZustand::Leerlauf);
                self.melden(SessionEvent::status(format!("Connection failed: {e}"), false));
                Err(e.into())
            }
        }
    }

    /// Nimmt die wartende eingehende Verbindung an
    pub fn accept_connection(&self) -> SessionResult<()> {
        self.entscheiden(true)
    }

    /// Lehnt die wartende eingehende Verbindung ab und lauscht weiter
    pub fn reject_connection(&self) -> SessionResult<()> {
        self.entscheiden(false)
    }

    fn entscheiden(&self, annehmen: bool) -> SessionResult<()> {
        let tx = self
            .inner
            .entscheidung
            .lock()
            .take()
            .ok_or(SessionError::KeineAnfrage)?;
        tx.send(annehmen).map_err(|_| SessionError::KeineAnfrage)
    }

    /// Accept-Loop: eine Verbindung nach der anderen bis zur ersten Annahme
    async fn accept_loop(self, listener: TcpListener, mut shutdown_rx: watch::Receiver<bool>) {
        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let (stream, peer) = tokio::select! {
                biased;

                Ok(()) = shutdown_rx.changed() => continue,

                result = listener.accept() => match result {
                    Ok(verbindung) => verbindung,
                    Err(e) => {
                        error!(fehler = %e, "TCP-Accept-Fehler");
                        tokio::time::sleep(ACCEPT_PAUSE).await;
                        continue;
                    }
                },
            };

            info!(peer = %peer, "Eingehende Verbindung");
            if self
                .zustand_wechseln(
                    &[SessionZustand::Lauschend],
                    SessionZustand::WartetAufEntscheidung,
                )
                .is_err()
            {
                break;
            }

            let annehmen = self.entscheidung_abwarten(peer, &mut shutdown_rx).await;
            if *shutdown_rx.borrow() {
                break;
            }

            if annehmen {
                if self
                    .verbindung_aufnehmen(stream, peer, &[SessionZustand::WartetAufEntscheidung])
                    .await
                {
                    self.melden(SessionEvent::status(format!("Connected by {peer}"), true));
                }
                break;
            }

            drop(stream);
            info!(peer = %peer, "Verbindung abgelehnt");
            if self
                .zustand_wechseln(
                    &[SessionZustand::WartetAufEntscheidung],
                    SessionZustand::Lauschend,
                )
                .is_err()
            {
                break;
            }
            self.melden(SessionEvent::status(
                "Connection rejected. Listening again...",
                false,
            ));
        }

        debug!("Accept-Task beendet");
    }

    async fn entscheidung_abwarten(
        &self,
        peer: SocketAddr,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> bool {
        if self.inner.events.is_closed() {
            info!(peer = %peer, "Kein Event-Empfaenger, Verbindung wird automatisch angenommen");
            return true;
        }

        let (tx, rx) = oneshot::channel();
        *self.inner.entscheidung.lock() = Some(tx);
        self.melden(SessionEvent::Verbindungsanfrage { peer });

        tokio::select! {
            biased;
            Ok(()) = shutdown_rx.changed() => false,
            antwort = rx => antwort.unwrap_or(false),
        }
    }

    /// Richtet Schreib- und Lesepfad ein und startet den Empfangs-Task
    ///
    /// Gibt false zurueck wenn die Session inzwischen abgebaut wurde.
    async fn verbindung_aufnehmen(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        erlaubt: &[SessionZustand],
    ) -> bool {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(fehler = %e, "TCP_NODELAY nicht gesetzt");
        }
        let (lesen, schreiben) = stream.into_split();

        let codec = FrameCodec::with_max_size(self.inner.key.clone(), self.inner.config.max_frame_bytes);
        *self.inner.writer.lock().await = Some(FramedWrite::new(schreiben, codec));
        *self.inner.peer_addr.lock() = Some(peer);

        if self.zustand_wechseln(erlaubt, SessionZustand::Verbunden).is_err() {
            self.inner.writer.lock().await.take();
            return false;
        }

        let shutdown_rx = self.inner.shutdown_tx.subscribe();
        tokio::spawn(self.clone().empfangs_loop(lesen, shutdown_rx));
        true
    }

    // -----------------------------------------------------------------------
    // Empfangen
    // -----------------------------------------------------------------------

    async fn empfangs_loop(self, lesen: OwnedReadHalf, mut shutdown_rx: watch::Receiver<bool>) {
        let codec = FrameCodec::with_max_size(self.inner.key.clone(), self.inner.config.max_frame_bytes);
        let mut reader = BufReader::new(lesen);
        let peer = self.peer_addr();

        debug!(peer = ?peer, "Empfangs-Loop gestartet");

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let frame = tokio::select! {
                biased;
                Ok(()) = shutdown_rx.changed() => continue,
                frame = codec.read_frame(&mut reader) => frame,
            };

            match frame {
                Ok(klartext) => match Envelope::decode(&klartext) {
                    Ok(envelope) => {
                        trace!(peer = ?peer, typ = envelope.typ(), "Nachricht empfangen");
                        if self.verarbeiten(envelope).await == Steuerung::Beenden {
                            break;
                        }
                    }
                    Err(e) => warn!(peer = ?peer, fehler = %e, "Ungueltige Nachricht verworfen"),
                },
                Err(e) if e.ist_frame_ausgerichtet() && !self.inner.config.krypto_fehler_fatal => {
                    warn!(peer = ?peer, fehler = %e, "Frame verworfen");
                }
                Err(FrameError::PeerClosed) => {
                    info!(peer = ?peer, "Verbindung von Gegenstelle getrennt");
                    break;
                }
                Err(e) => {
                    warn!(peer = ?peer, fehler = %e, "Frame-Lesefehler");
                    break;
                }
            }
        }

        self.abbauen(true).await;
        debug!(peer = ?peer, "Empfangs-Loop beendet");
    }

    // -----------------------------------------------------------------------
    // Senden
    // -----------------------------------------------------------------------

    /// Schreibt genau einen Frame unter dem Schreib-Lock
    ///
    /// Ein Transportfehler loest den Abbau der Session aus.
    pub(crate) async fn senden(&self, envelope: &Envelope) -> SessionResult<()> {
        let klartext = envelope.encode()?;

        let ergebnis = {
            let mut writer = self.inner.writer.lock().await;
            match writer.as_mut() {
                Some(writer) => writer.send(klartext).await.map_err(SessionError::from),
                None => Err(SessionError::NichtVerbunden),
            }
        };

        if let Err(e) = &ergebnis {
            if e.ist_transportfehler() {
                warn!(typ = envelope.typ(), fehler = %e, "Senden fehlgeschlagen, Session wird abgebaut");
                self.inner.shutdown_tx.send_replace(true);
            }
        }
        ergebnis
    }

    pub async fn send_text(&self, text: &str) -> SessionResult<()> {
        self.verbunden_pruefen()?;
        self.senden(&Envelope::Text(text.to_string())).await
    }

    /// Sendet eine Datei; Bilder werden an der Endung erkannt, alles andere
    /// geht als einfache Datei
    ///
    /// Bei Erfolg gibt es ein lokales Echo-Event, bei Lese- oder
    /// Groessenfehlern eine Systemmeldung.
    pub async fn send_file(&self, pfad: impl AsRef<Path>) -> SessionResult<()> {
        let pfad = pfad.as_ref();
        let art = DateiArt::aus_dateiname(&basisname(&pfad.to_string_lossy()));
        self.datei_senden(pfad, art, None).await
    }

    /// Sendet eine Sprachnachricht mit bekannter Dauer in Sekunden
    pub async fn send_audio(&self, pfad: impl AsRef<Path>, dauer: f64) -> SessionResult<()> {
        self.datei_senden(pfad.as_ref(), DateiArt::Audio, Some(dauer)).await
    }

    async fn datei_senden(&self, pfad: &Path, art: DateiArt, dauer: Option<f64>) -> SessionResult<()> {
        self.verbunden_pruefen()?;
        let name = basisname(&pfad.to_string_lossy());

        match self.datei_uebertragen(pfad, &name, art, dauer).await {
            Ok(()) => {
                info!(datei = %name, art = ?art, "Datei gesendet");
                let echo = match art {
                    DateiArt::Bild => SessionEvent::Bild {
                        pfad: pfad.to_path_buf(),
                        absender: Absender::Du,
                    },
                    DateiArt::Audio => SessionEvent::Audio {
                        pfad: pfad.to_path_buf(),
                        dauer: dauer.unwrap_or(0.0),
                        absender: Absender::Du,
                    },
                    DateiArt::Datei => SessionEvent::system(format!("You sent file: {name}")),
                };
                self.melden(echo);
                Ok(())
            }
            Err(e) => {
                if !e.ist_transportfehler() {
                    self.melden(SessionEvent::system(format!("Failed to send file: {e}")));
                }
                Err(e)
            }
        }
    }

    async fn datei_uebertragen(
        &self,
        pfad: &Path,
        name: &str,
        art: DateiArt,
        dauer: Option<f64>,
    ) -> SessionResult<()> {
        let daten = tokio::fs::read(pfad).await?;
        let transfer = match dauer {
            Some(sekunden) => FileTransfer::neu(name, daten).mit_dauer(sekunden),
            None => FileTransfer::neu(name, daten),
        };

        let envelope = match art {
            DateiArt::Bild => Envelope::Image(transfer),
            DateiArt::Audio => Envelope::Audio(transfer),
            DateiArt::Datei => Envelope::File(transfer),
        };
        self.senden(&envelope).await
    }

    // -----------------------------------------------------------------------
    // Abbau
    // -----------------------------------------------------------------------

    /// Beendet die Session
    ///
    /// Sendet wenn moeglich noch ein `disconnect` und baut danach in jedem
    /// Fall ab. Mehrfacher Aufruf ist ohne Wirkung.
    pub async fn disconnect(&self) {
        if self.ist_verbunden() {
            if let Err(e) = self.senden(&Envelope::Disconnect).await {
                debug!(fehler = %e, "disconnect konnte nicht mehr gesendet werden");
            }
        }
        self.abbauen(false).await;
    }

    /// Idempotenter Abbau: Anruf beenden, Sockets schliessen, melden
    ///
    /// `vom_peer` gibt an, ob die Verbindung von der Gegenseite oder durch
    /// einen Transportfehler endete.
    pub(crate) async fn abbauen(&self, vom_peer: bool) {
        let vorher = {
            let mut zustand = self.inner.zustand.lock();
            if *zustand == SessionZustand::Geschlossen {
                return;
            }
            std::mem::replace(&mut *zustand, SessionZustand::Geschlossen)
        };

        info!(vorher = ?vorher, peer = ?self.peer_addr(), "Session wird abgebaut");

        self.inner.shutdown_tx.send_replace(true);
        self.inner.entscheidung.lock().take();
        self.inner.anruf.lock().await.zuruecksetzen().await;

        if let Some(mut writer) = self.inner.writer.lock().await.take() {
            if let Err(e) = writer.get_mut().shutdown().await {
                trace!(fehler = %e, "Schreibhaelfte bereits geschlossen");
            }
        }

        if vom_peer && vorher == SessionZustand::Verbunden {
            self.melden(SessionEvent::system("Peer has left the chat."));
        }
        self.melden(SessionEvent::status("Connection lost.", false));
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("zustand", &self.zustand())
            .field("peer", &self.peer_addr())
            .finish()
    }
}

async fn listener_binden(host: &str, port: u16) -> std::io::Result<(TcpListener, SocketAddr)> {
    let listener = TcpListener::bind((host, port)).await?;
    let lokale_addr = listener.local_addr()?;
    Ok((listener, lokale_addr))
}

async fn stream_verbinden(host: &str, port: u16) -> std::io::Result<(TcpStream, SocketAddr)> {
    let stream = TcpStream::connect((host, port)).await?;
    let peer = stream.peer_addr()?;
    Ok((stream, peer))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
