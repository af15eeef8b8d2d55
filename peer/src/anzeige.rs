//! Textdarstellung der Session-Ereignisse

use duett_core::{DuettError, SessionEvent};

/// Formatiert ein Ereignis als eine Terminalzeile
pub fn darstellen(event: &SessionEvent) -> String {
    match event {
        SessionEvent::Nachricht { text, absender } => format!("[{absender}] {text}"),
        SessionEvent::VerbindungsStatus { text, verbunden } => {
            let marke = if *verbunden { "+" } else { "-" };
            format!("{marke} {text}")
        }
        SessionEvent::Bild { pfad, absender } => {
            format!("[{absender}] <Bild: {}>", pfad.display())
        }
        SessionEvent::Audio {
            pfad,
            dauer,
            absender,
        } => format!("[{absender}] <Sprachnachricht {dauer:.1} s: {}>", pfad.display()),
        SessionEvent::Verbindungsanfrage { peer } => {
            format!("? Verbindungsanfrage von {peer}. /accept oder /reject")
        }
        SessionEvent::Anrufanfrage { .. } => "? Eingehender Anruf. /accept oder /reject".into(),
        SessionEvent::AnrufStatus { text } => format!("~ {text}"),
    }
}

/// Fehlerzeile eines Befehls, bei Verbindungsfehlern mit Hinweis auf `/reconnect`
pub fn fehler_darstellen(fehler: &DuettError) -> String {
    if fehler.ist_wiederholbar() {
        format!("! {fehler}\n! /reconnect baut die Verbindung neu auf")
    } else {
        format!("! {fehler}")
    }
}
