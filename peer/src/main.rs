//! Duett Peer – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging, leitet den
//! Sitzungsschluessel ab und startet das Terminal-Front-End.

use std::io::Write;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use duett_core::{Endpunkt, VerbindungsModus};
use duett_crypto::{Argon2Ableitung, KeyDerivation};
use duett_peer::{config::PeerConfig, Peer};

/// Verschluesselter Chat, Dateien und Anrufe zu genau einer Gegenstelle
#[derive(Parser)]
#[command(name = "duett")]
#[command(version)]
#[command(about = "Verschluesselter Chat, Dateien und Anrufe zu genau einer Gegenstelle")]
struct Cli {
    /// Pfad zur Konfigurationsdatei
    #[arg(short, long, env = "DUETT_CONFIG", default_value = "duett.toml", global = true)]
    config: String,

    /// Ohne Unterbefehl gilt [verbindung] aus der Konfiguration
    #[command(subcommand)]
    modus: Option<Modus>,
}

#[derive(Subcommand)]
enum Modus {
    /// Auf eine eingehende Verbindung warten
    Listen {
        /// Bind-Adresse
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Zur Gegenstelle verbinden
    Connect {
        host: String,
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = PeerConfig::laden(&cli.config)?;
    logging_initialisieren(&config.logging.level, &config.logging.format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config,
        "Duett Peer wird initialisiert"
    );

    let (modus, endpunkt) = verbindung_bestimmen(cli.modus, &config);

    let geheimnis = geheimnis_lesen()?;
    let schluessel = config.schluessel.clone();
    let key = tokio::task::spawn_blocking(move || {
        Argon2Ableitung::neu(schluessel.argon2, schluessel.algorithmus)
            .ableiten(&geheimnis, schluessel.salt.as_bytes())
    })
    .await
    .context("Schluesselableitung abgebrochen")??;

    Peer::neu(config, key, modus, endpunkt).starten().await
}

/// Kommandozeile vor Konfigurationsdatei
fn verbindung_bestimmen(modus: Option<Modus>, config: &PeerConfig) -> (VerbindungsModus, Endpunkt) {
    let standard_port = config.verbindung.port;
    match modus {
        Some(Modus::Listen { host, port }) => (
            VerbindungsModus::Lauschen,
            Endpunkt::neu(
                host.unwrap_or_else(|| config.verbindung.host.clone()),
                port.unwrap_or(standard_port),
            ),
        ),
        Some(Modus::Connect { host, port }) => (
            VerbindungsModus::Verbinden,
            Endpunkt::neu(host, port.unwrap_or(standard_port)),
        ),
        None => (config.verbindung.modus, config.endpunkt()),
    }
}

/// Gemeinsames Geheimnis aus `DUETT_SECRET` oder von stdin
fn geheimnis_lesen() -> Result<String> {
    if let Ok(geheimnis) = std::env::var("DUETT_SECRET") {
        if !geheimnis.is_empty() {
            return Ok(geheimnis);
        }
    }

    print!("Gemeinsames Geheimnis: ");
    std::io::stdout().flush()?;

    let mut zeile = String::new();
    std::io::stdin().read_line(&mut zeile)?;
    let geheimnis = zeile.trim_end_matches(&['\r', '\n'][..]).to_string();
    if geheimnis.is_empty() {
        anyhow::bail!("Kein Geheimnis angegeben");
    }
    Ok(geheimnis)
}

/// Initialisiert tracing-subscriber mit dem konfigurierten Level und Format
///
/// `DUETT_LOG` bzw. `RUST_LOG` ueberschreiben das Level. Ausgabe auf stderr,
/// damit sie sich nicht mit dem Chat mischt.
fn logging_initialisieren(level: &str, format: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_env("DUETT_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
