//! Sprachkanal eines laufenden Anrufs
//!
//! Ein `VoiceChannel` besitzt genau einen UDP-Socket und laeuft bis
//! `stoppen()` aufgerufen oder er gedroppt wird. Fuer jeden Anruf wird ein
//! neuer Kanal gebaut.
//!
//! Senden und Empfangen sind voneinander unabhaengig: faellt das Mikrofon
//! aus, wird eingehendes Audio weiter abgespielt und umgekehrt.

use duett_crypto::{SessionKey, OVERHEAD};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tracing::{debug, info, trace, warn};

use crate::config::AudioConfig;
use crate::device::{AudioDevice, CaptureStream, PlaybackStream};
use crate::error::{AudioResult, VoiceError, VoiceResult};

/// Maximale Anzahl entschluesselter Chunks, die auf Wiedergabe warten
const WIEDERGABE_QUEUE: usize = 32;

/// So lange wartet `stoppen()` auf eine blockierte Aufnahme
const AUFNAHME_STOPP_FRIST: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// VoiceChannel
// ---------------------------------------------------------------------------

/// Verschluesselter Sprachkanal zu genau einer Gegenstelle
///
/// Lifecycle:
/// 1. `starten()` – oeffnet die Audio-Streams, startet Aufnahme-Thread,
///    Wiedergabe-Thread und Empfangs-Task
/// 2. `stoppen()` – beendet alle drei, jeder Thread schliesst seinen Stream
pub struct VoiceChannel {
    peer: SocketAddr,
    lokale_addr: SocketAddr,
    running: Arc<AtomicBool>,
    /// Shutdown-Signal fuer den Empfangs-Task
    shutdown_tx: Option<oneshot::Sender<()>>,
    /// Besitzt den `CaptureStream`: liest, versiegelt, sendet
    sende_thread: Option<JoinHandle<()>>,
    /// Besitzt den `PlaybackStream`, gespeist vom Empfangs-Task
    wiedergabe_thread: Option<JoinHandle<()>>,
    recv_task: Option<tokio::task::JoinHandle<()>>,
}

impl VoiceChannel {
    /// Startet den Sprachkanal auf einem bereits gebundenen Socket
    ///
    /// Schlaegt fehl wenn das Geraet keine Streams oeffnen kann. In dem
    /// Fall ist nichts mehr offen, der Socket wird geschlossen.
    pub async fn starten(
        socket: UdpSocket,
        peer: SocketAddr,
        key: SessionKey,
        geraet: Arc<dyn AudioDevice>,
        config: AudioConfig,
    ) -> VoiceResult<Self> {
        config.validieren()?;
        let lokale_addr = socket.local_addr()?;

        info!(lokal = %lokale_addr, peer = %peer, "Starte Sprachkanal");

        // Echte Geraete koennen beim Oeffnen blockieren
        let (mut capture, playback) =
            tokio::task::spawn_blocking(move || streams_oeffnen(geraet.as_ref(), &config))
                .await
                .map_err(|e| VoiceError::Thread(e.to_string()))??;

        let socket = Arc::new(socket);
        let running = Arc::new(AtomicBool::new(true));
        let (wiedergabe_tx, wiedergabe_rx) = std::sync::mpsc::sync_channel(WIEDERGABE_QUEUE);

        let wiedergabe_thread = match std::thread::Builder::new()
            .name("voice-wiedergabe".to_string())
            .spawn(move || wiedergabe_loop(playback, wiedergabe_rx))
        {
            Ok(handle) => handle,
            Err(e) => {
                capture.close();
                return Err(VoiceError::Thread(e.to_string()));
            }
        };

        let send_socket = Arc::clone(&socket);
        let send_running = Arc::clone(&running);
        let send_key = key.clone();

        // Schlaegt das fehl, endet der Wiedergabe-Thread mit dem Drop von wiedergabe_tx
        let sende_thread = std::thread::Builder::new()
            .name("voice-aufnahme".to_string())
            .spawn(move || sende_loop(capture, &send_socket, peer, &send_key, &config, &send_running))
            .map_err(|e| VoiceError::Thread(e.to_string()))?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let recv_task = tokio::spawn(empfangs_loop(
            socket,
            key,
            config,
            wiedergabe_tx,
            Arc::clone(&running),
            shutdown_rx,
        ));

        Ok(Self {
            peer,
            lokale_addr,
            running,
            shutdown_tx: Some(shutdown_tx),
            sende_thread: Some(sende_thread),
            wiedergabe_thread: Some(wiedergabe_thread),
            recv_task: Some(recv_task),
        })
    }

    /// Stoppt Senden, Empfang und Wiedergabe
    ///
    /// Mehrfacher Aufruf ist erlaubt. Haengt die Aufnahme in einem `read`,
    /// wartet `stoppen()` hoechstens `AUFNAHME_STOPP_FRIST`; der Thread
    /// schliesst den Stream dann nach dem naechsten Chunk selbst.
    pub async fn stoppen(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        // Mit dem Empfangs-Task faellt der Sender der Wiedergabe-Queue weg
        if let Some(handle) = self.recv_task.take() {
            let _ = handle.await;
        }
        if let Some(handle) = self.wiedergabe_thread.take() {
            let _ = tokio::task::spawn_blocking(move || handle.join()).await;
        }
        if let Some(handle) = self.sende_thread.take() {
            let join = tokio::task::spawn_blocking(move || handle.join());
            if tokio::time::timeout(AUFNAHME_STOPP_FRIST, join).await.is_err() {
                warn!(peer = %self.peer, "Aufnahme blockiert, Thread laeuft bis zum naechsten Chunk weiter");
            }
            info!(peer = %self.peer, "Sprachkanal gestoppt");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn lokaler_port(&self) -> u16 {
        self.lokale_addr.port()
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl Drop for VoiceChannel {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl std::fmt::Debug for VoiceChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceChannel")
            .field("peer", &self.peer)
            .field("lokale_addr", &self.lokale_addr)
            .field("running", &self.is_running())
            .finish()
    }
}

fn streams_oeffnen(
    geraet: &dyn AudioDevice,
    config: &AudioConfig,
) -> AudioResult<(Box<dyn CaptureStream>, Box<dyn PlaybackStream>)> {
    let mut capture = geraet.open_capture(config)?;
    match geraet.open_playback(config) {
        Ok(playback) => Ok((capture, playback)),
        Err(e) => {
            capture.close();
            Err(e)
        }
    }
}

// ---------------------------------------------------------------------------
// Sende-Loop (eigener Thread, da die Aufnahme blockierend liest)
// ---------------------------------------------------------------------------

fn sende_loop(
    mut capture: Box<dyn CaptureStream>,
    socket: &UdpSocket,
    peer: SocketAddr,
    key: &SessionKey,
    config: &AudioConfig,
    running: &AtomicBool,
) {
    let chunk_bytes = config.chunk_bytes();
    debug!(chunk_bytes, "Sende-Loop gestartet");

    while running.load(Ordering::SeqCst) {
        let chunk = match capture.read(chunk_bytes) {
            Ok(chunk) => chunk,
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    warn!(fehler = %e, "Aufnahme fehlgeschlagen, Sende-Loop endet");
                }
                break;
            }
        };

        match key.versiegeln(&chunk) {
            // try_send_to blockiert nicht; ein verworfener Chunk ist Paketverlust
            Ok(paket) => {
                if let Err(e) = socket.try_send_to(&paket, peer) {
                    trace!(fehler = %e, "UDP-Sendefehler");
                }
            }
            Err(e) => warn!(fehler = %e, "Voice-Chunk nicht verschluesselbar"),
        }
    }

    capture.close();
    debug!("Sende-Loop beendet, Aufnahme geschlossen");
}

// ---------------------------------------------------------------------------
// Wiedergabe-Loop (eigener Thread, endet mit dem Empfangs-Task)
// ---------------------------------------------------------------------------

fn wiedergabe_loop(mut playback: Box<dyn PlaybackStream>, wiedergabe_rx: Receiver<Vec<u8>>) {
    debug!("Wiedergabe-Loop gestartet");

    while let Ok(pcm) = wiedergabe_rx.recv() {
        if let Err(e) = playback.write(&pcm) {
            trace!(fehler = %e, "Wiedergabe fehlgeschlagen");
        }
    }

    playback.close();
    debug!("Wiedergabe-Loop beendet, Wiedergabe geschlossen");
}

// ---------------------------------------------------------------------------
// Empfangs-Loop (async, laeuft in Tokio-Task)
// ---------------------------------------------------------------------------

async fn empfangs_loop(
    socket: Arc<UdpSocket>,
    key: SessionKey,
    config: AudioConfig,
    wiedergabe_tx: SyncSender<Vec<u8>>,
    running: Arc<AtomicBool>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut buf = vec![0u8; config.chunk_bytes() + OVERHEAD];

    debug!("Empfangs-Loop gestartet");

    loop {
        tokio::select! {
            result = socket.recv_from(&mut buf) => {
                match result {
                    Ok((len, absender)) => {
                        if !running.load(Ordering::SeqCst) {
                            break;
                        }

                        let pcm = match key.oeffnen(&buf[..len]) {
                            Ok(pcm) => pcm,
                            Err(e) => {
                                trace!(absender = %absender, fehler = %e, "Voice-Paket verworfen");
                                continue;
                            }
                        };

                        match wiedergabe_tx.try_send(pcm) {
                            Ok(()) => {}
                            Err(TrySendError::Full(_)) => trace!("Wiedergabe-Queue voll"),
                            Err(TrySendError::Disconnected(_)) => {
                                warn!("Wiedergabe-Thread beendet, Empfangs-Loop endet");
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        trace!(fehler = %e, "UDP-Empfangsfehler");
                    }
                }
            }

            _ = &mut shutdown_rx => {
                break;
            }
        }
    }

    debug!("Empfangs-Loop beendet");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::SpeicherGeraet;
    use crate::error::AudioError;
    use duett_crypto::SchluesselAlgorithmus;
    use std::time::Duration;

    fn test_key(fuell: u8) -> SessionKey {
        SessionKey::aus_bytes(
            vec![fuell; SessionKey::LAENGE],
            SchluesselAlgorithmus::ChaCha20Poly1305,
        )
        .unwrap()
    }

    /// 10 ms pro Chunk, 160 Bytes
    fn schnelle_config() -> AudioConfig {
        AudioConfig {
            abtastrate: 8000,
            frames_pro_chunk: 80,
            ..AudioConfig::default()
        }
    }

    async fn warten_bis(mut bedingung: impl FnMut() -> bool) -> bool {
        for _ in 0..200 {
            if bedingung() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    async fn paar(
        key_a: SessionKey,
        key_b: SessionKey,
    ) -> (VoiceChannel, SpeicherGeraet, VoiceChannel, SpeicherGeraet) {
        let sock_a = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let sock_b = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr_a = sock_a.local_addr().unwrap();
        let addr_b = sock_b.local_addr().unwrap();

        let geraet_a = SpeicherGeraet::new();
        let geraet_b = SpeicherGeraet::new();
        for _ in 0..5 {
            geraet_a.aufnahme_einreihen(vec![7u8; 160]);
        }

        let a = VoiceChannel::starten(
            sock_a,
            addr_b,
            key_a,
            Arc::new(geraet_a.clone()),
            schnelle_config(),
        )
        .await
        .unwrap();
        let b = VoiceChannel::starten(
            sock_b,
            addr_a,
            key_b,
            Arc::new(geraet_b.clone()),
            schnelle_config(),
        )
        .await
        .unwrap();

        (a, geraet_a, b, geraet_b)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn audio_fliesst_in_beide_richtungen() {
        let (mut a, geraet_a, mut b, geraet_b) = paar(test_key(1), test_key(1)).await;

        let angekommen = warten_bis(|| geraet_b.abgespielt().contains(&vec![7u8; 160])).await;
        assert!(angekommen, "Chunk von A wurde bei B nicht abgespielt");

        // B sendet Stille zurueck
        let stille = warten_bis(|| geraet_a.abgespielt().contains(&vec![0u8; 160])).await;
        assert!(stille, "Stille von B wurde bei A nicht abgespielt");

        a.stoppen().await;
        b.stoppen().await;
        assert!(!a.is_running());
        assert_eq!(geraet_a.offene_streams(), 0);
        assert_eq!(geraet_b.offene_streams(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn fremder_schluessel_wird_still_verworfen() {
        let (mut a, _geraet_a, mut b, geraet_b) = paar(test_key(1), test_key(2)).await;

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(geraet_b.abgespielt().is_empty());
        assert!(b.is_running());

        a.stoppen().await;
        b.stoppen().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn muell_datagramm_beendet_den_kanal_nicht() {
        let (mut a, _geraet_a, mut b, geraet_b) = paar(test_key(3), test_key(3)).await;

        let stoerer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let ziel = SocketAddr::from(([127, 0, 0, 1], b.lokaler_port()));
        stoerer.send_to(b"kein gueltiges paket", ziel).await.unwrap();

        let angekommen = warten_bis(|| geraet_b.abgespielt().contains(&vec![7u8; 160])).await;
        assert!(angekommen);

        a.stoppen().await;
        b.stoppen().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stoppen_ist_idempotent() {
        let (mut a, _ga, mut b, _gb) = paar(test_key(4), test_key(4)).await;
        a.stoppen().await;
        a.stoppen().await;
        b.stoppen().await;
        assert!(!a.is_running());
    }

    struct KaputtesGeraet;

    impl AudioDevice for KaputtesGeraet {
        fn open_capture(&self, _config: &AudioConfig) -> AudioResult<Box<dyn CaptureStream>> {
            Err(AudioError::GeraetNichtVerfuegbar("kein Mikrofon".into()))
        }

        fn open_playback(&self, _config: &AudioConfig) -> AudioResult<Box<dyn PlaybackStream>> {
            Err(AudioError::GeraetNichtVerfuegbar("kein Lautsprecher".into()))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn geraetefehler_beim_start() {
        let sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let peer = SocketAddr::from(([127, 0, 0, 1], 9));

        let err = VoiceChannel::starten(
            sock,
            peer,
            test_key(1),
            Arc::new(KaputtesGeraet),
            schnelle_config(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, VoiceError::Audio(AudioError::GeraetNichtVerfuegbar(_))));
    }

    /// Mikrofon faellt sofort aus, Lautsprecher ist ein `SpeicherGeraet`
    struct OhneMikrofon(SpeicherGeraet);

    struct KaputteAufnahme;

    impl CaptureStream for KaputteAufnahme {
        fn read(&mut self, _bytes: usize) -> AudioResult<Vec<u8>> {
            Err(AudioError::StreamFehler("Mikrofon getrennt".into()))
        }

        fn close(&mut self) {}
    }

    impl AudioDevice for OhneMikrofon {
        fn open_capture(&self, _config: &AudioConfig) -> AudioResult<Box<dyn CaptureStream>> {
            Ok(Box::new(KaputteAufnahme))
        }

        fn open_playback(&self, config: &AudioConfig) -> AudioResult<Box<dyn PlaybackStream>> {
            self.0.open_playback(config)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn wiedergabe_laeuft_ohne_mikrofon_weiter() {
        let sock_a = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let sock_b = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr_a = sock_a.local_addr().unwrap();
        let addr_b = sock_b.local_addr().unwrap();

        let geraet_a = SpeicherGeraet::new();
        let lautsprecher_b = SpeicherGeraet::new();

        let mut b = VoiceChannel::starten(
            sock_b,
            addr_a,
            test_key(5),
            Arc::new(OhneMikrofon(lautsprecher_b.clone())),
            schnelle_config(),
        )
        .await
        .unwrap();

        // Sende-Loop von B ist bereits beendet, bevor A etwas schickt
        tokio::time::sleep(Duration::from_millis(50)).await;
        for _ in 0..5 {
            geraet_a.aufnahme_einreihen(vec![9u8; 160]);
        }
        let mut a = VoiceChannel::starten(
            sock_a,
            addr_b,
            test_key(5),
            Arc::new(geraet_a.clone()),
            schnelle_config(),
        )
        .await
        .unwrap();

        let angekommen = warten_bis(|| lautsprecher_b.abgespielt().contains(&vec![9u8; 160])).await;
        assert!(angekommen, "Wiedergabe bei B haengt am kaputten Mikrofon");
        assert!(b.is_running());

        a.stoppen().await;
        b.stoppen().await;
        assert_eq!(lautsprecher_b.offene_streams(), 0);
        assert_eq!(geraet_a.offene_streams(), 0);
    }

    /// Aufnahme, deren erstes `read` lange haengt
    struct HaengendesMikrofon(SpeicherGeraet);

    struct HaengendeAufnahme;

    impl CaptureStream for HaengendeAufnahme {
        fn read(&mut self, bytes: usize) -> AudioResult<Vec<u8>> {
            std::thread::sleep(Duration::from_secs(2));
            Ok(vec![0u8; bytes])
        }

        fn close(&mut self) {}
    }

    impl AudioDevice for HaengendesMikrofon {
        fn open_capture(&self, _config: &AudioConfig) -> AudioResult<Box<dyn CaptureStream>> {
            Ok(Box::new(HaengendeAufnahme))
        }

        fn open_playback(&self, config: &AudioConfig) -> AudioResult<Box<dyn PlaybackStream>> {
            self.0.open_playback(config)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn haengende_aufnahme_blockiert_stoppen_nicht() {
        let sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let peer = SocketAddr::from(([127, 0, 0, 1], 9));
        let lautsprecher = SpeicherGeraet::new();

        let mut kanal = VoiceChannel::starten(
            sock,
            peer,
            test_key(6),
            Arc::new(HaengendesMikrofon(lautsprecher.clone())),
            schnelle_config(),
        )
        .await
        .unwrap();

        let gestoppt = tokio::time::timeout(Duration::from_millis(1500), kanal.stoppen()).await;
        assert!(gestoppt.is_ok(), "stoppen wartet auf die blockierte Aufnahme");
        assert!(!kanal.is_running());
        // Die Wiedergabe ist unabhaengig von der Aufnahme geschlossen
        assert_eq!(lautsprecher.offene_streams(), 0);
    }
}
