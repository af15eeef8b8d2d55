//! Dateinamen und Dateiarten

use std::path::Path;

/// Ersatzname wenn vom Sender nichts Brauchbares kommt
pub const ERSATZ_NAME: &str = "unbenannt";

/// Art einer uebertragenen Datei
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateiArt {
    Datei,
    Bild,
    Audio,
}

impl DateiArt {
    /// Erkennt die Art anhand der Dateiendung (Gross-/Kleinschreibung egal)
    ///
    /// Liefert nur `Bild` oder `Datei`. Sprachnachrichten entstehen
    /// ausschliesslich ueber den expliziten Audio-Versand.
    pub fn aus_dateiname(name: &str) -> Self {
        let endung = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match endung.as_deref() {
            Some("png" | "jpg" | "jpeg" | "gif" | "bmp") => Self::Bild,
            _ => Self::Datei,
        }
    }
}

/// Reduziert einen fremden Dateinamen auf seinen letzten Pfadbestandteil
///
/// Beide Trennzeichen (`/` und `\`) werden beachtet, unabhaengig vom
/// lokalen Betriebssystem. Leere Namen sowie `.` und `..` werden durch
/// `unbenannt` ersetzt.
pub fn basisname(name: &str) -> String {
    let letzter = name
        .rsplit(&['/', '\\'][..])
        .next()
        .unwrap_or_default()
        .trim_matches('\0');

    match letzter {
        "" | "." | ".." => ERSATZ_NAME.to_string(),
        gueltig => gueltig.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basisname_entfernt_verzeichnisse() {
        assert_eq!(basisname("bild.png"), "bild.png");
        assert_eq!(basisname("a/b/c.txt"), "c.txt");
        assert_eq!(basisname("../../etc/passwd"), "passwd");
        assert_eq!(basisname("C:\\Users\\x\\notiz.txt"), "notiz.txt");
        assert_eq!(basisname("/absolut/pfad.bin"), "pfad.bin");
    }

    #[test]
    fn basisname_ersatz_fuer_leere_namen() {
        assert_eq!(basisname(""), ERSATZ_NAME);
        assert_eq!(basisname("verzeichnis/"), ERSATZ_NAME);
        assert_eq!(basisname(".."), ERSATZ_NAME);
        assert_eq!(basisname("a/."), ERSATZ_NAME);
    }

    #[test]
    fn dateiart_nach_endung() {
        assert_eq!(DateiArt::aus_dateiname("foto.JPG"), DateiArt::Bild);
        assert_eq!(DateiArt::aus_dateiname("x.jpeg"), DateiArt::Bild);
        assert_eq!(DateiArt::aus_dateiname("x.bmp"), DateiArt::Bild);
        assert_eq!(DateiArt::aus_dateiname("memo.wav"), DateiArt::Datei);
        assert_eq!(DateiArt::aus_dateiname("doku.pdf"), DateiArt::Datei);
        assert_eq!(DateiArt::aus_dateiname("ohne_endung"), DateiArt::Datei);
    }
}
