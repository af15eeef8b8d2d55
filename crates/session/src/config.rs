//! Laufzeit-Einstellungen einer Session

use duett_protocol::DEFAULT_MAX_FRAME_SIZE;
use duett_voice::AudioConfig;

/// Einstellungen, die beide Seiten einer Session gleich setzen sollten
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximale Groesse eines verschluesselten Frames in Bytes
    pub max_frame_bytes: usize,
    /// Nicht entschluesselbarer Frame beendet die Session (sonst: verwerfen)
    pub krypto_fehler_fatal: bool,
    /// Audio-Format fuer Anrufe
    pub audio: AudioConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: DEFAULT_MAX_FRAME_SIZE,
            krypto_fehler_fatal: true,
            audio: AudioConfig::default(),
        }
    }
}
