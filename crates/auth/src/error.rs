//! Fehlertypen fuer den Authenticator

use thiserror::Error;

/// Alle moeglichen Ablehnungs- und Fehlergruende im Auth-Crate
#[derive(Debug, Error)]
pub enum AuthError {
    // --- Session-Token ---
    #[error("Session-Token abgelaufen")]
    TokenAbgelaufen,

    #[error("Session-Token ungueltig: {0}")]
    TokenUngueltig(String),

    // --- API-Key ---
    #[error("API-Key unbekannt")]
    ApiKeyUnbekannt,

    #[error("API-Key abgelaufen")]
    ApiKeyAbgelaufen,

    // --- Versionen ---
    #[error("Client-Version veraltet oder fehlend: {0}")]
    ClientVeraltet(String),

    #[error("Plugin-Version veraltet oder fehlend: {0}")]
    PluginVeraltet(String),

    #[error("Ungueltige Mindestversion '{wert}': {grund}")]
    Mindestversion { wert: String, grund: String },

    // --- Key-Datenbank ---
    #[error("Key-Datenbank nicht lesbar: {0}")]
    Speicher(#[from] std::io::Error),

    #[error("Key-Datenbank fehlerhaft: {0}")]
    SpeicherFormat(#[from] serde_json::Error),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl AuthError {
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }
}

/// Result-Alias fuer den Authenticator
pub type AuthResult<T> = Result<T, AuthError>;
