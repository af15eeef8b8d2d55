//! duett-peer – Terminal-Front-End
//!
//! Liest Befehle zeilenweise von stdin, gibt Session-Ereignisse auf stdout
//! aus und merkt sich Modus und Gegenstelle fuer einen erneuten Handshake.

pub mod anzeige;
pub mod befehl;
pub mod config;

use std::sync::Arc;

use anyhow::Result;
use duett_chat::{DiskStore, FileStore};
use duett_core::{Absender, DuettError, Endpunkt, SessionEvent, VerbindungsModus};
use duett_crypto::SessionKey;
use duett_session::{AnrufZustand, EventEmpfaenger, Session, SessionError, SessionResult};
use duett_voice::{AudioDevice, StilleGeraet};
use tokio::io::{AsyncBufReadExt, BufReader};

use anzeige::{darstellen, fehler_darstellen};
use befehl::{Befehl, HILFE};
use config::PeerConfig;

/// Haelt den Front-End-Zustand ueber mehrere Sessions hinweg zusammen
pub struct Peer {
    config: PeerConfig,
    key: SessionKey,
    modus: VerbindungsModus,
    endpunkt: Endpunkt,
    store: Arc<dyn FileStore>,
    geraet: Arc<dyn AudioDevice>,
}

impl Peer {
    /// Erstellt das Front-End; Audio laeuft ueber das stille Geraet
    pub fn neu(
        config: PeerConfig,
        key: SessionKey,
        modus: VerbindungsModus,
        endpunkt: Endpunkt,
    ) -> Self {
        let store = Arc::new(DiskStore::new(config.session.download_verzeichnis.clone()));
        Self {
            config,
            key,
            modus,
            endpunkt,
            store,
            geraet: Arc::new(StilleGeraet),
        }
    }

    /// Neue Session mit demselben Schluessel, Handshake nach gemerktem Modus
    async fn session_starten(&self) -> (Session, EventEmpfaenger) {
        let (session, events) = Session::neu(
            self.key.clone(),
            self.config.session_config(),
            Arc::clone(&self.store),
            Arc::clone(&self.geraet),
        );

        let host = self.endpunkt.host.as_str();
        let port = self.endpunkt.port;
        let ergebnis = match self.modus {
            VerbindungsModus::Lauschen => session.listen(host, port).await.map(|_| ()),
            VerbindungsModus::Verbinden => session.connect(host, port).await,
        };
        if let Err(e) = ergebnis {
            tracing::warn!(endpunkt = %self.endpunkt, fehler = %e, "Handshake nicht gestartet");
        }

        (session, events)
    }

    /// Laeuft bis `/quit`, Ende der Eingabe oder Ctrl-C
    pub async fn starten(self) -> Result<()> {
        tracing::info!(
            modus = ?self.modus,
            endpunkt = %self.endpunkt,
            "Peer startet"
        );
        println!("duett {} – /help fuer Befehle", env!("CARGO_PKG_VERSION"));

        let mut zeilen = BufReader::new(tokio::io::stdin()).lines();
        let (mut session, mut events) = self.session_starten().await;

        loop {
            tokio::select! {
                zeile = zeilen.next_line() => {
                    let Some(zeile) = zeile? else {
                        break;
                    };
                    let befehl = match Befehl::parsen(&zeile) {
                        Ok(Some(befehl)) => befehl,
                        Ok(None) => continue,
                        Err(e) => {
                            println!("! {e}");
                            continue;
                        }
                    };

                    match befehl {
                        Befehl::Beenden => break,
                        Befehl::NeuVerbinden => {
                            session.disconnect().await;
                            (session, events) = self.session_starten().await;
                        }
                        andere => {
                            if let Err(e) = self.ausfuehren(&session, andere).await {
                                println!("{}", fehler_darstellen(&e));
                            }
                        }
                    }
                }

                Some(event) = events.recv() => println!("{}", darstellen(&event)),

                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl-C empfangen");
                    break;
                }
            }
        }

        session.disconnect().await;
        tracing::info!("Peer beendet");
        Ok(())
    }

    async fn ausfuehren(&self, session: &Session, befehl: Befehl) -> duett_core::Result<()> {
        self.befehl_ausfuehren(session, befehl)
            .await
            .map_err(DuettError::from)
    }

    async fn befehl_ausfuehren(&self, session: &Session, befehl: Befehl) -> SessionResult<()> {
        match befehl {
            Befehl::Text(text) => {
                session.send_text(&text).await?;
                println!(
                    "{}",
                    darstellen(&SessionEvent::Nachricht {
                        text,
                        absender: Absender::Du,
                    })
                );
                Ok(())
            }
            Befehl::Datei(pfad) => session.send_file(pfad).await,
            Befehl::Audio { pfad, dauer } => session.send_audio(pfad, dauer).await,
            Befehl::Anrufen => session.send_call_request().await,
            Befehl::Annehmen => match session.accept_connection() {
                Err(SessionError::KeineAnfrage) => match session.angebotener_port().await {
                    Some(udp_port) => session.accept_call(udp_port).await,
                    None => Err(SessionError::KeineAnfrage),
                },
                ergebnis => ergebnis,
            },
            Befehl::Ablehnen => match session.reject_connection() {
                Err(SessionError::KeineAnfrage) => session.reject_call().await,
                ergebnis => ergebnis,
            },
            Befehl::Auflegen => match session.anruf_zustand().await {
                AnrufZustand::Aktiv => session.end_call().await,
                AnrufZustand::Leerlauf => Err(SessionError::AnrufZustand {
                    ist: AnrufZustand::Leerlauf,
                }),
                _ => session.reject_call().await,
            },
            Befehl::Hilfe => {
                println!("{HILFE}");
                Ok(())
            }
            Befehl::Beenden | Befehl::NeuVerbinden => Ok(()),
        }
    }
}
