//! Zeilenbefehle des Terminal-Front-Ends

use std::path::PathBuf;

use thiserror::Error;

/// Ein eingegebener Befehl
#[derive(Debug, Clone, PartialEq)]
pub enum Befehl {
    /// Freitext an die Gegenstelle
    Text(String),
    Datei(PathBuf),
    /// Sprachnachricht mit Dauer in Sekunden
    Audio { pfad: PathBuf, dauer: f64 },
    Anrufen,
    /// Verbindung oder Anruf annehmen
    Annehmen,
    /// Verbindung oder Anruf ablehnen
    Ablehnen,
    Auflegen,
    NeuVerbinden,
    Hilfe,
    Beenden,
}

/// Fehler beim Zerlegen einer Eingabezeile
#[derive(Debug, Error, PartialEq)]
pub enum BefehlFehler {
    #[error("Unbekannter Befehl: /{0} (/help fuer eine Liste)")]
    Unbekannt(String),

    #[error("Verwendung: {0}")]
    Verwendung(&'static str),

    #[error("Ungueltige Dauer: {0}")]
    UngueltigeDauer(String),
}

/// Kurzuebersicht fuer `/help`
pub const HILFE: &str = "\
Befehle:
  <text>                 Nachricht senden
  /file <pfad>           Datei oder Bild senden
  /audio <pfad> <sek>    Sprachnachricht senden
  /call                  Anruf starten
  /accept                Verbindung oder Anruf annehmen
  /reject                Verbindung oder Anruf ablehnen
  /hangup                Anruf beenden
  /reconnect             Neuer Handshake mit derselben Gegenstelle
  /quit                  Beenden";

impl Befehl {
    /// Zerlegt eine Eingabezeile
    ///
    /// Leere Zeilen ergeben `None`. `//text` sendet `/text` als Nachricht.
    pub fn parsen(zeile: &str) -> Result<Option<Self>, BefehlFehler> {
        let zeile = zeile.trim_end_matches(&['\r', '\n'][..]);
        if zeile.trim().is_empty() {
            return Ok(None);
        }

        let Some(rest) = zeile.strip_prefix('/') else {
            return Ok(Some(Self::Text(zeile.to_string())));
        };
        if rest.starts_with('/') {
            return Ok(Some(Self::Text(rest.to_string())));
        }

        let (name, argumente) = match rest.split_once(char::is_whitespace) {
            Some((name, argumente)) => (name, argumente.trim()),
            None => (rest, ""),
        };

        let befehl = match name {
            "file" => {
                if argumente.is_empty() {
                    return Err(BefehlFehler::Verwendung("/file <pfad>"));
                }
                Self::Datei(PathBuf::from(argumente))
            }
            "audio" => {
                let Some((pfad, dauer)) = argumente.rsplit_once(char::is_whitespace) else {
                    return Err(BefehlFehler::Verwendung("/audio <pfad> <sekunden>"));
                };
                let dauer: f64 = dauer
                    .parse()
                    .map_err(|_| BefehlFehler::UngueltigeDauer(dauer.to_string()))?;
                if !dauer.is_finite() || dauer < 0.0 {
                    return Err(BefehlFehler::UngueltigeDauer(dauer.to_string()));
                }
                Self::Audio {
                    pfad: PathBuf::from(pfad.trim()),
                    dauer,
                }
            }
            "call" => Self::Anrufen,
            "accept" => Self::Annehmen,
            "reject" => Self::Ablehnen,
            "hangup" => Self::Auflegen,
            "reconnect" => Self::NeuVerbinden,
            "help" => Self::Hilfe,
            "quit" | "exit" => Self::Beenden,
            andere => return Err(BefehlFehler::Unbekannt(andere.to_string())),
        };
        Ok(Some(befehl))
    }
}
