//! Fehlertypen fuer Proxvoice
//!
//! Zentraler Fehler-Enum fuer die gemeinsam genutzten Typen.
//! Untermodule definieren eigene Fehler und konvertieren via `#[from]`.

use thiserror::Error;

/// Globaler Result-Alias fuer Proxvoice
pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Ungueltige SteamId: '{0}'")]
    UngueltigeSteamId(String),

    #[error("Ungueltige Nachricht: {0}")]
    UngueltigeNachricht(String),

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    #[error("Interner Fehler: {0}")]
    Intern(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl CoreError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }
}
