//! proxvoice-core – Gemeinsame Identitaetstypen und Fehlertypen
//!
//! Dieses Crate stellt die Bausteine bereit, die von allen anderen
//! Proxvoice-Crates gemeinsam genutzt werden: Steam-Identitaeten,
//! Verbindungs-IDs, Raum-Codes und API-Key-IDs.

pub mod error;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{CoreError, Result};
pub use types::{ApiKeyId, RaumCode, SteamId, VerbindungsId};
