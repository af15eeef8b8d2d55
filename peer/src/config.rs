//! Peer-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Peer ohne Konfigurationsdatei
//! lauffaehig ist. Beide Seiten muessen Salt, Algorithmus, Argon2-Kosten
//! und Audio-Format gleich setzen.

use std::path::PathBuf;

use duett_chat::STANDARD_DOWNLOAD_DIR;
use duett_core::{Endpunkt, VerbindungsModus};
use duett_crypto::{Argon2Parameter, SchluesselAlgorithmus, STANDARD_SALT};
use duett_protocol::DEFAULT_MAX_FRAME_SIZE;
use duett_session::SessionConfig;
use duett_voice::AudioConfig;
use serde::{Deserialize, Serialize};

/// Vollstaendige Peer-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerConfig {
    /// Verbindungsmodus und Gegenstelle
    pub verbindung: VerbindungsEinstellungen,
    /// Schluesselableitung
    pub schluessel: SchluesselEinstellungen,
    /// Session-Verhalten
    pub session: SessionEinstellungen,
    /// Audio-Format fuer Anrufe
    pub audio: AudioConfig,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Verbindungs-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerbindungsEinstellungen {
    /// "lauschen" oder "verbinden"
    pub modus: VerbindungsModus,
    /// Bind-Adresse beim Lauschen, Zieladresse beim Verbinden
    pub host: String,
    pub port: u16,
}

impl Default for VerbindungsEinstellungen {
    fn default() -> Self {
        Self {
            modus: VerbindungsModus::Lauschen,
            host: "0.0.0.0".into(),
            port: 5555,
        }
    }
}

/// Einstellungen der Schluesselableitung
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchluesselEinstellungen {
    /// Salt fuer Argon2id (auf beiden Seiten gleich)
    pub salt: String,
    /// "aes-256-gcm" oder "chacha20-poly1305"
    pub algorithmus: SchluesselAlgorithmus,
    pub argon2: Argon2Parameter,
}

impl Default for SchluesselEinstellungen {
    fn default() -> Self {
        Self {
            salt: String::from_utf8_lossy(STANDARD_SALT).into_owned(),
            algorithmus: SchluesselAlgorithmus::default(),
            argon2: Argon2Parameter::default(),
        }
    }
}

/// Session-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionEinstellungen {
    /// Maximale Frame-Groesse in Bytes
    pub max_frame_bytes: usize,
    /// Nicht entschluesselbarer Frame beendet die Session
    pub krypto_fehler_fatal: bool,
    /// Ablageverzeichnis fuer empfangene Dateien
    pub download_verzeichnis: PathBuf,
}

impl Default for SessionEinstellungen {
    fn default() -> Self {
        Self {
            max_frame_bytes: DEFAULT_MAX_FRAME_SIZE,
            krypto_fehler_fatal: true,
            download_verzeichnis: PathBuf::from(STANDARD_DOWNLOAD_DIR),
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            format: "text".into(),
        }
    }
}

impl PeerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                config.pruefen()?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Prueft Werte, die sich erst zur Laufzeit als unbrauchbar zeigen wuerden
    pub fn pruefen(&self) -> anyhow::Result<()> {
        if self.schluessel.salt.is_empty() {
            anyhow::bail!("schluessel.salt darf nicht leer sein");
        }
        if self.session.max_frame_bytes == 0 {
            anyhow::bail!("session.max_frame_bytes muss groesser als 0 sein");
        }
        self.audio
            .validieren()
            .map_err(|e| anyhow::anyhow!("audio: {e}"))?;
        Ok(())
    }

    /// Gegenstelle bzw. Bind-Adresse aus der Konfiguration
    pub fn endpunkt(&self) -> Endpunkt {
        Endpunkt::neu(self.verbindung.host.clone(), self.verbindung.port)
    }

    /// Laufzeit-Einstellungen fuer die Session
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            max_frame_bytes: self.session.max_frame_bytes,
            krypto_fehler_fatal: self.session.krypto_fehler_fatal,
            audio: self.audio,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
