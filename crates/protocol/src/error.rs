//! Fehlertypen fuer das Protokoll-Crate

use thiserror::Error;

pub type ProtocolResult<T> = Result<T, ProtocolError>;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("JSON-Fehler: {0}")]
    Json(#[from] serde_json::Error),

    #[error("MessagePack-Dekodierung fehlgeschlagen: {0}")]
    MsgpackDekodierung(#[from] rmp_serde::decode::Error),

    #[error("MessagePack-Kodierung fehlgeschlagen: {0}")]
    MsgpackKodierung(#[from] rmp_serde::encode::Error),

    #[error("Ungueltiges Feld '{feld}': {grund}")]
    UngueltigesFeld { feld: &'static str, grund: String },
}
