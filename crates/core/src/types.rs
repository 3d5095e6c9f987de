//! Gemeinsame Identifikationstypen fuer Proxvoice
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! verschiedenen ID-Arten zur Compilezeit auszuschliessen.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Platzhalter den Steam fuer "keine Identitaet" verwendet
const STEAM_ID_SENTINEL: &str = "0";

/// Steam-Identitaet eines Spielers (SteamID64 als String)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SteamId(String);

impl SteamId {
    /// Prueft und erstellt eine SteamId
    ///
    /// Leere Werte und der Sentinel `"0"` werden abgelehnt.
    pub fn parse(wert: impl Into<String>) -> Result<Self, CoreError> {
        let wert = wert.into();
        if wert.is_empty() || wert == STEAM_ID_SENTINEL {
            return Err(CoreError::UngueltigeSteamId(wert));
        }
        Ok(Self(wert))
    }

    /// Gibt die SteamId als String-Slice zurueck
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SteamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Eindeutige ID einer WebSocket-Verbindung (auf dem Draht: `socketId`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VerbindungsId(pub Uuid);

impl VerbindungsId {
    /// Erstellt eine neue zufaellige VerbindungsId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for VerbindungsId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for VerbindungsId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}

/// Raum-Code – identisch mit der Adresse des Game-Servers (`adresse:port`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RaumCode(String);

impl RaumCode {
    /// Bildet den Raum-Code aus Server-Adresse und Port
    pub fn aus_adresse(adresse: &str, port: &str) -> Self {
        Self(format!("{adresse}:{port}"))
    }

    /// Uebernimmt einen vom Client gesendeten Raum-Code unveraendert
    pub fn roh(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn ist_leer(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for RaumCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// ID eines API-Key-Datensatzes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKeyId(pub Uuid);

impl ApiKeyId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for ApiKeyId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ApiKeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "apikey:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steam_id_sentinel_wird_abgelehnt() {
        assert!(SteamId::parse("0").is_err());
        assert!(SteamId::parse("").is_err());
        assert_eq!(
            SteamId::parse("76561198000000001").unwrap().as_str(),
            "76561198000000001"
        );
    }

    #[test]
    fn raum_code_aus_adresse() {
        let code = RaumCode::aus_adresse("1.2.3.4", "27015");
        assert_eq!(code.as_str(), "1.2.3.4:27015");
        assert_eq!(code, RaumCode::roh("1.2.3.4:27015"));
    }

    #[test]
    fn verbindungs_id_eindeutig() {
        let a = VerbindungsId::new();
        let b = VerbindungsId::new();
        assert_ne!(a, b, "Zwei neue VerbindungsIds muessen verschieden sein");
    }

    #[test]
    fn verbindungs_id_display() {
        let id = VerbindungsId(Uuid::nil());
        assert!(id.to_string().starts_with("conn:"));
    }

    #[test]
    fn ids_serialisieren_transparent() {
        let id = VerbindungsId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.inner()));

        let steam: SteamId = serde_json::from_str("\"7656\"").unwrap();
        assert_eq!(steam.as_str(), "7656");
    }
}
