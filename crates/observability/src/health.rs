//! Health-Check-Endpunkt
//!
//! Endpoint: `GET /health`
//! Response: JSON mit Status, Version, Uptime und aktueller Last des
//! Relays. Waehrend des Herunterfahrens antwortet der Endpunkt mit 503,
//! damit Load-Balancer keine neuen Verbindungen mehr zuteilen.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::metrics::{MesswertQuelle, RelayMesswerte};

/// Status des Health-Checks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// Relay faehrt herunter
    Draining,
}

/// Antwort des Health-Check-Endpunkts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub rooms: usize,
    pub connections: usize,
    pub server_links: usize,
    pub timestamp: String,
}

/// Geteilter Zustand fuer den Health-Check-Handler
#[derive(Clone)]
pub struct HealthState {
    start_time: Instant,
    beendet: Arc<AtomicBool>,
    quelle: MesswertQuelle,
}

impl HealthState {
    pub fn neu(quelle: MesswertQuelle) -> Self {
        Self {
            start_time: Instant::now(),
            beendet: Arc::new(AtomicBool::new(false)),
            quelle,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Markiert den Relay als herunterfahrend
    pub fn beenden(&self) {
        self.beendet.store(true, Ordering::Relaxed);
    }

    pub fn status(&self) -> HealthStatus {
        if self.beendet.load(Ordering::Relaxed) {
            HealthStatus::Draining
        } else {
            HealthStatus::Healthy
        }
    }

    pub fn antwort(&self) -> HealthResponse {
        let RelayMesswerte {
            raeume,
            verbindungen,
            server_links,
            ..
        } = (self.quelle)();
        HealthResponse {
            status: self.status(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.uptime_seconds(),
            rooms: raeume,
            connections: verbindungen,
            server_links,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Axum-Router fuer den `/health`-Endpunkt
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}

/// `GET /health` – gibt den Relay-Status zurueck
async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let antwort = state.antwort();
    let http_status = match antwort.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Draining => StatusCode::SERVICE_UNAVAILABLE,
    };
    (http_status, Json(antwort))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_mit_last() -> HealthState {
        HealthState::neu(Arc::new(|| RelayMesswerte {
            verbindungen: 12,
            raeume: 3,
            peers: 9,
            server_links: 3,
            ..Default::default()
        }))
    }

    #[test]
    fn antwort_enthaelt_last() {
        let antwort = state_mit_last().antwort();
        assert_eq!(antwort.status, HealthStatus::Healthy);
        assert_eq!(antwort.rooms, 3);
        assert_eq!(antwort.connections, 12);
        assert_eq!(antwort.server_links, 3);
        assert!(antwort.uptime_seconds < 5);
    }

    #[test]
    fn antwort_serialisierung() {
        let json = serde_json::to_value(state_mit_last().antwort()).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["rooms"], 3);
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn draining_liefert_503() {
        let state = state_mit_last();
        let antwort = health_handler(State(state.clone())).await.into_response();
        assert_eq!(antwort.status(), StatusCode::OK);

        state.beenden();
        assert_eq!(state.status(), HealthStatus::Draining);
        let antwort = health_handler(State(state)).await.into_response();
        assert_eq!(antwort.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
