//! Nachrichtenmodell der Steuerverbindung
//!
//! Jeder Frame traegt im Klartext ein UTF-8-JSON-Objekt `{type, payload}`.
//!
//! | type                          | payload                                |
//! |-------------------------------|----------------------------------------|
//! | `text`                        | String                                 |
//! | `disconnect`                  | leer (`""`)                            |
//! | `file` / `image` / `audio`    | `{name, data: base64, duration?}`      |
//! | `call_request`/`call_accepted`| `{udp_port}`                           |
//! | `call_rejected` / `call_end`  | leer (`""`)                            |
//!
//! Die Zuordnung laeuft explizit ueber `match`, damit ein unbekannter
//! `type` als eigener Fehler (`ProtocolError::UnbekannterTyp`) sichtbar
//! wird.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;

// ---------------------------------------------------------------------------
// Typ-Namen auf dem Draht
// ---------------------------------------------------------------------------

const TYP_TEXT: &str = "text";
const TYP_DISCONNECT: &str = "disconnect";
const TYP_FILE: &str = "file";
const TYP_IMAGE: &str = "image";
const TYP_AUDIO: &str = "audio";
const TYP_CALL_REQUEST: &str = "call_request";
const TYP_CALL_ACCEPTED: &str = "call_accepted";
const TYP_CALL_REJECTED: &str = "call_rejected";
const TYP_CALL_END: &str = "call_end";

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Datei, Bild oder Sprachnachricht in einem Frame
#[derive(Debug, Clone, PartialEq)]
pub struct FileTransfer {
    /// Dateiname wie vom Sender angegeben (nicht bereinigt)
    pub name: String,
    pub data: Vec<u8>,
    /// Laenge einer Sprachnachricht in Sekunden
    pub duration: Option<f64>,
}

impl FileTransfer {
    pub fn neu(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
            duration: None,
        }
    }

    pub fn mit_dauer(mut self, sekunden: f64) -> Self {
        self.duration = Some(sekunden);
        self
    }
}

/// Alle Nachrichten der Steuerverbindung
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Text(String),
    Disconnect,
    File(FileTransfer),
    Image(FileTransfer),
    Audio(FileTransfer),
    /// Anrufer bietet seinen lokalen UDP-Port an
    CallRequest { udp_port: u16 },
    /// Angerufener nimmt an und nennt seinen UDP-Port
    CallAccepted { udp_port: u16 },
    CallRejected,
    CallEnd,
}

#[derive(Serialize, Deserialize)]
struct RohEnvelope {
    #[serde(rename = "type")]
    typ: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Serialize, Deserialize)]
struct DateiPayload {
    name: String,
    data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    duration: Option<f64>,
}

#[derive(Serialize, Deserialize)]
struct PortPayload {
    udp_port: u16,
}

impl Envelope {
    /// Typ-Name auf dem Draht
    pub fn typ(&self) -> &'static str {
        match self {
            Self::Text(_) => TYP_TEXT,
            Self::Disconnect => TYP_DISCONNECT,
            Self::File(_) => TYP_FILE,
            Self::Image(_) => TYP_IMAGE,
            Self::Audio(_) => TYP_AUDIO,
            Self::CallRequest { .. } => TYP_CALL_REQUEST,
            Self::CallAccepted { .. } => TYP_CALL_ACCEPTED,
            Self::CallRejected => TYP_CALL_REJECTED,
            Self::CallEnd => TYP_CALL_END,
        }
    }

    /// Serialisiert zum JSON-Klartext eines Frames
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let payload = match self {
            Self::Text(text) => Value::String(text.clone()),
            Self::Disconnect | Self::CallRejected | Self::CallEnd => Value::String(String::new()),
            Self::File(datei) | Self::Image(datei) | Self::Audio(datei) => {
                serde_json::to_value(DateiPayload {
                    name: datei.name.clone(),
                    data: BASE64.encode(&datei.data),
                    duration: datei.duration,
                })?
            }
            Self::CallRequest { udp_port } | Self::CallAccepted { udp_port } => {
                serde_json::to_value(PortPayload {
                    udp_port: *udp_port,
                })?
            }
        };

        let roh = RohEnvelope {
            typ: self.typ().to_string(),
            payload,
        };
        Ok(serde_json::to_vec(&roh)?)
    }

    /// Interpretiert den JSON-Klartext eines Frames
    pub fn decode(klartext: &[u8]) -> Result<Self, ProtocolError> {
        let roh: RohEnvelope = serde_json::from_slice(klartext)?;

        match roh.typ.as_str() {
            TYP_TEXT => match roh.payload {
                Value::String(text) => Ok(Self::Text(text)),
                _ => Err(ProtocolError::payload(TYP_TEXT, "String erwartet")),
            },
            TYP_DISCONNECT => Ok(Self::Disconnect),
            TYP_CALL_REJECTED => Ok(Self::CallRejected),
            TYP_CALL_END => Ok(Self::CallEnd),
            TYP_FILE => Ok(Self::File(datei_aus_payload(TYP_FILE, roh.payload)?)),
            TYP_IMAGE => Ok(Self::Image(datei_aus_payload(TYP_IMAGE, roh.payload)?)),
            TYP_AUDIO => Ok(Self::Audio(datei_aus_payload(TYP_AUDIO, roh.payload)?)),
            TYP_CALL_REQUEST => Ok(Self::CallRequest {
                udp_port: port_aus_payload(TYP_CALL_REQUEST, roh.payload)?,
            }),
            TYP_CALL_ACCEPTED => Ok(Self::CallAccepted {
                udp_port: port_aus_payload(TYP_CALL_ACCEPTED, roh.payload)?,
            }),
            _ => Err(ProtocolError::UnbekannterTyp(roh.typ)),
        }
    }
}

fn datei_aus_payload(typ: &str, payload: Value) -> Result<FileTransfer, ProtocolError> {
    let roh: DateiPayload =
        serde_json::from_value(payload).map_err(|e| ProtocolError::payload(typ, e.to_string()))?;
    Ok(FileTransfer {
        name: roh.name,
        data: BASE64.decode(roh.data.as_bytes())?,
        duration: roh.duration,
    })
}

fn port_aus_payload(typ: &str, payload: Value) -> Result<u16, ProtocolError> {
    let roh: PortPayload =
        serde_json::from_value(payload).map_err(|e| ProtocolError::payload(typ, e.to_string()))?;
    Ok(roh.udp_port)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
