//! Fehlertypen fuer den Signaling-Relay
//!
//! Handler geben `SignalingResult` zurueck; der Dispatcher protokolliert
//! Fehler und verwirft das Ereignis. Nach aussen sichtbare Ablehnungen
//! laufen dagegen als `exception`-Ereignis oder `join-room-result`.

use proxvoice_auth::AuthError;
use proxvoice_core::RaumCode;
use proxvoice_protocol::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignalingError {
    #[error("Authentifizierungsfehler: {0}")]
    Auth(#[from] AuthError),

    #[error("Protokollfehler: {0}")]
    Protokoll(#[from] ProtocolError),

    #[error("Raum nicht gefunden: {0}")]
    RaumNichtGefunden(RaumCode),

    /// Ereignis erfordert einen beigetretenen Raum
    #[error("Verbindung ist keinem Raum beigetreten")]
    NichtImRaum,

    #[error("Zugriff verweigert: {0}")]
    ZugriffVerweigert(String),

    #[error("Rate-Limit erreicht, erneut in {0}s")]
    RateLimit(u64),

    #[error("Ungueltige Payload: {0}")]
    UngueltigePayload(String),

    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl SignalingError {
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    pub fn zugriff_verweigert(msg: impl Into<String>) -> Self {
        Self::ZugriffVerweigert(msg.into())
    }
}

/// Result-Typ fuer den Signaling-Relay
pub type SignalingResult<T> = Result<T, SignalingError>;
