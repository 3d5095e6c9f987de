//! HTTP-Endpunkte des Relays neben dem WebSocket
//!
//! - `GET /` – Verbindungsstatistik
//! - `GET /get-ice-servers` – STUN/TURN-Server mit Zugangsdaten
//! - `POST /admin/restart-warning` – Neustart-Warnung an alle Verbindungen

pub mod handlers;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use proxvoice_auth::TurnAussteller;
use proxvoice_signaling::handshake::quell_ip_aus_forwarded;
use proxvoice_signaling::RelayState;
use serde_json::json;

/// Axum-State fuer die HTTP-Endpunkte
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<RelayState>,
    pub turn: Arc<TurnAussteller>,
    /// Ohne Secret ist der Neustart-Endpunkt gesperrt
    pub restart_secret: Option<Arc<str>>,
}

impl AppState {
    pub fn neu(
        relay: Arc<RelayState>,
        turn: Arc<TurnAussteller>,
        restart_secret: Option<String>,
    ) -> Self {
        Self {
            relay,
            turn,
            restart_secret: restart_secret.map(Arc::from),
        }
    }
}

/// Token aus `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
}

/// Client-IP: erster `X-Forwarded-For`-Eintrag, sonst die Peer-Adresse
pub fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(quell_ip_aus_forwarded)
        .unwrap_or_else(|| peer.ip().to_string())
}

/// JSON-Fehlerantwort `{message}`
pub fn fehler(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}
