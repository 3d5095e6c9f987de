//! Signaling-Ereignisse (WebSocket, JSON)
//!
//! Jeder Frame hat die Form `{"event": "<name>", "data": ...}`.
//! Eingehende Ereignisse kommen vom Client oder vom Game-Server-Link,
//! ausgehende Ereignisse sendet der Relay an einzelne Verbindungen oder
//! an alle Mitglieder eines Raums.
//!
//! ## Design
//! - Geschlossene Menge von Tagged-Enum-Varianten, eine pro Ereignisname
//! - Unbekannte Ereignisse und fehlerhafte Payloads scheitern bereits
//!   beim Deserialisieren und erreichen die Geschaeftslogik nie
//! - Binaere Payloads (MessagePack) reisen als Base64-String im JSON

use std::collections::HashMap;

use proxvoice_core::{RaumCode, SteamId, VerbindungsId};
use serde::{Deserialize, Serialize};

use crate::feed::Vektor3;
use crate::voice_config::{VoiceConfig, VoiceConfigPatch};

// ---------------------------------------------------------------------------
// Fehler-Codes
// ---------------------------------------------------------------------------

/// Typisierte Codes fuer `exception`-Ereignisse
///
/// Auf dem Draht als PascalCase-Name serialisiert (`"RoomShutdown"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExceptionCode {
    AuthExpired,
    InvalidApiKey,
    RoomShutdown,
    PlayerDisconnected,
    PluginOutdated,
    InvalidServerIp,
    ReusedApiKey,
}

/// `exception`-Payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ausnahme {
    pub code: ExceptionCode,
    pub message: String,
}

impl Ausnahme {
    pub fn neu(code: ExceptionCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn auth_abgelaufen() -> Self {
        Self::neu(ExceptionCode::AuthExpired, "Authentication Expired")
    }

    pub fn raum_geschlossen() -> Self {
        Self::neu(
            ExceptionCode::RoomShutdown,
            "You have been disconnected because the room no longer exists.",
        )
    }

    pub fn spieler_getrennt() -> Self {
        Self::neu(
            ExceptionCode::PlayerDisconnected,
            "You have been disconnected because you are no longer on the server.",
        )
    }

    pub fn api_key_wiederverwendet() -> Self {
        Self::neu(
            ExceptionCode::ReusedApiKey,
            "Socket disconnected due to API key being used on another server. \
             You can ignore this if you have recently reloaded the plugin.",
        )
    }
}

// ---------------------------------------------------------------------------
// Gemeinsame Payloads
// ---------------------------------------------------------------------------

/// Signaling-Metadaten eines beigetretenen Clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRecord {
    pub steam_id: SteamId,
    pub is_muted: bool,
}

/// Payload fuer `user-joined` / `user-left`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerEreignis {
    pub socket_id: VerbindungsId,
    pub client: ClientRecord,
}

// ---------------------------------------------------------------------------
// Eingehende Ereignisse
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomDaten {
    pub token: String,
    pub room_code: String,
    #[serde(default)]
    pub is_muted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalDaten {
    pub to: VerbindungsId,
    /// WebRTC-Aushandlungsdaten, vom Relay nicht interpretiert
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MikrofonDaten {
    pub is_muted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MuteDaten {
    pub target_steam_id: String,
    pub client_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigUpdateDaten {
    pub config: VoiceConfigPatch,
    pub client_token: String,
}

/// Tuer-Rotation vom Game-Server: Origin als `"x y z"`-String
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuerDaten {
    pub origin: String,
    pub rotation: f64,
}

/// Alle Ereignisse die beim Relay ankommen koennen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum EingehendesEreignis {
    // Client
    JoinRoom(JoinRoomDaten),
    Signal(SignalDaten),
    MicrophoneState(MikrofonDaten),
    MutePlayer(MuteDaten),
    UpdateConfig(ConfigUpdateDaten),

    // Game-Server-Link
    ServerConfig(#[serde(with = "base64_bytes")] Vec<u8>),
    CurrentMap(String),
    DoorRotation(TuerDaten),
    PlayerPositions(#[serde(with = "base64_bytes")] Vec<u8>),
}

impl EingehendesEreignis {
    /// Ereignisname fuer Logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinRoom(_) => "join-room",
            Self::Signal(_) => "signal",
            Self::MicrophoneState(_) => "microphone-state",
            Self::MutePlayer(_) => "mute-player",
            Self::UpdateConfig(_) => "update-config",
            Self::ServerConfig(_) => "server-config",
            Self::CurrentMap(_) => "current-map",
            Self::DoorRotation(_) => "door-rotation",
            Self::PlayerPositions(_) => "player-positions",
        }
    }

    /// Nur der Game-Server-Link darf diese Ereignisse senden
    pub fn ist_server_ereignis(&self) -> bool {
        matches!(
            self,
            Self::ServerConfig(_)
                | Self::CurrentMap(_)
                | Self::DoorRotation(_)
                | Self::PlayerPositions(_)
        )
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

// ---------------------------------------------------------------------------
// Ausgehende Ereignisse
// ---------------------------------------------------------------------------

/// Antwort auf `join-room`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomAntwort {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joined_clients: Option<HashMap<VerbindungsId, ClientRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_config: Option<VoiceConfig>,
}

impl JoinRoomAntwort {
    pub fn abgelehnt(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            map_name: None,
            joined_clients: None,
            server_config: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalWeiterleitung {
    pub from: VerbindungsId,
    pub data: serde_json::Value,
    pub client: ClientRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MikrofonStatus {
    pub socket_id: VerbindungsId,
    pub is_muted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuerRotation {
    pub absorigin: Vektor3,
    pub rotation: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpielerAufServer {
    pub room_code: RaumCode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeustartWarnung {
    pub minutes: u32,
}

/// Alle Ereignisse die der Relay versendet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum AusgehendesEreignis {
    JoinRoomResult(JoinRoomAntwort),
    Signal(SignalWeiterleitung),
    MicrophoneState(MikrofonStatus),
    UserJoined(PeerEreignis),
    UserLeft(PeerEreignis),
    PlayerPositions(#[serde(with = "base64_bytes")] Vec<u8>),
    ServerConfig(#[serde(with = "base64_bytes")] Vec<u8>),
    CurrentMap(String),
    DoorRotation(TuerRotation),
    PlayerOnServer(SpielerAufServer),
    MutedByServerAdmin,
    ServerRestartWarning(NeustartWarnung),
    Exception(Ausnahme),
}

impl AusgehendesEreignis {
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinRoomResult(_) => "join-room-result",
            Self::Signal(_) => "signal",
            Self::MicrophoneState(_) => "microphone-state",
            Self::UserJoined(_) => "user-joined",
            Self::UserLeft(_) => "user-left",
            Self::PlayerPositions(_) => "player-positions",
            Self::ServerConfig(_) => "server-config",
            Self::CurrentMap(_) => "current-map",
            Self::DoorRotation(_) => "door-rotation",
            Self::PlayerOnServer(_) => "player-on-server",
            Self::MutedByServerAdmin => "muted-by-server-admin",
            Self::ServerRestartWarning(_) => "server-restart-warning",
            Self::Exception(_) => "exception",
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Base64-Hilfsmodul fuer binaere Payloads
// ---------------------------------------------------------------------------

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
