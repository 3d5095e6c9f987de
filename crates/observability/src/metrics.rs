//! Prometheus-kompatible Metriken des Relays
//!
//! Registrierte Metriken:
//! - `proxvoice_connections` – Gauge: Offene WebSocket-Verbindungen
//! - `proxvoice_rooms` – Gauge: Aktive Raeume
//! - `proxvoice_peers` – Gauge: Beigetretene Voice-Clients
//! - `proxvoice_server_links` – Gauge: Verbundene Game-Server
//! - `proxvoice_telemetry_accepted_total` – Counter: Angenommene Telemetrie-Pushes
//! - `proxvoice_telemetry_dropped_total` – Counter: Verworfene Pushes (zu frueh, nicht dekodierbar)
//! - `proxvoice_broadcasts_total` – Counter: Versendete Positions-Broadcasts
//! - `proxvoice_broadcasts_suppressed_total` – Counter: Gedrosselte Broadcasts
//! - `proxvoice_joins_total` – Counter: Erfolgreiche Beitritte
//! - `proxvoice_joins_rejected_total` – Counter: Abgelehnte Beitritte
//! - `proxvoice_http_requests_total` – Counter: HTTP-Anfragen (method, path, status)
//! - `proxvoice_http_request_duration_seconds` – Histogram: HTTP-Antwortzeit
//!
//! Die Relay-Werte werden periodisch aus einer [`MesswertQuelle`] gelesen.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use tokio::task::JoinHandle;

/// Momentaufnahme der Relay-Zaehler
///
/// Die `*_gesamt`-Werte sind monoton steigend seit dem Start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayMesswerte {
    pub verbindungen: usize,
    pub raeume: usize,
    pub peers: usize,
    pub server_links: usize,
    pub telemetrie_angenommen: u64,
    pub telemetrie_verworfen: u64,
    pub broadcasts_gesendet: u64,
    pub broadcasts_unterdrueckt: u64,
    pub beitritte: u64,
    pub beitritte_abgelehnt: u64,
}

/// Liefert die aktuellen Relay-Messwerte
pub type MesswertQuelle = Arc<dyn Fn() -> RelayMesswerte + Send + Sync>;

/// Alle Prometheus-Metriken des Relays
#[derive(Clone)]
pub struct ProxvoiceMetriken {
    pub registry: Arc<Registry>,

    // Last
    pub connections: IntGauge,
    pub rooms: IntGauge,
    pub peers: IntGauge,
    pub server_links: IntGauge,

    // Relay-Zaehler
    pub telemetry_accepted_total: IntCounter,
    pub telemetry_dropped_total: IntCounter,
    pub broadcasts_total: IntCounter,
    pub broadcasts_suppressed_total: IntCounter,
    pub joins_total: IntCounter,
    pub joins_rejected_total: IntCounter,

    // HTTP
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
}

fn gauge(registry: &Registry, name: &str, hilfe: &str) -> Result<IntGauge> {
    let gauge = IntGauge::with_opts(Opts::new(name, hilfe))?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

fn zaehler(registry: &Registry, name: &str, hilfe: &str) -> Result<IntCounter> {
    let zaehler = IntCounter::with_opts(Opts::new(name, hilfe))?;
    registry.register(Box::new(zaehler.clone()))?;
    Ok(zaehler)
}

/// Zieht einen Counter auf den absoluten Stand `neu` nach
fn nachziehen(zaehler: &IntCounter, neu: u64) {
    let alt = zaehler.get();
    if neu > alt {
        zaehler.inc_by(neu - alt);
    }
}

impl ProxvoiceMetriken {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let connections = gauge(
            &registry,
            "proxvoice_connections",
            "Anzahl offener WebSocket-Verbindungen",
        )?;
        let rooms = gauge(&registry, "proxvoice_rooms", "Anzahl aktiver Raeume")?;
        let peers = gauge(
            &registry,
            "proxvoice_peers",
            "Anzahl beigetretener Voice-Clients",
        )?;
        let server_links = gauge(
            &registry,
            "proxvoice_server_links",
            "Anzahl verbundener Game-Server",
        )?;

        let telemetry_accepted_total = zaehler(
            &registry,
            "proxvoice_telemetry_accepted_total",
            "Angenommene Telemetrie-Pushes",
        )?;
        let telemetry_dropped_total = zaehler(
            &registry,
            "proxvoice_telemetry_dropped_total",
            "Verworfene Telemetrie-Pushes",
        )?;
        let broadcasts_total = zaehler(
            &registry,
            "proxvoice_broadcasts_total",
            "Versendete Positions-Broadcasts",
        )?;
        let broadcasts_suppressed_total = zaehler(
            &registry,
            "proxvoice_broadcasts_suppressed_total",
            "Gedrosselte Positions-Broadcasts",
        )?;
        let joins_total = zaehler(&registry, "proxvoice_joins_total", "Erfolgreiche Beitritte")?;
        let joins_rejected_total = zaehler(
            &registry,
            "proxvoice_joins_rejected_total",
            "Abgelehnte Beitritte",
        )?;

        let http_requests_total = IntCounterVec::new(
            Opts::new("proxvoice_http_requests_total", "Gesamtanzahl HTTP-Anfragen"),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "proxvoice_http_request_duration_seconds",
                "HTTP-Antwortzeit in Sekunden",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
            &["method", "path"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            connections,
            rooms,
            peers,
            server_links,
            telemetry_accepted_total,
            telemetry_dropped_total,
            broadcasts_total,
            broadcasts_suppressed_total,
            joins_total,
            joins_rejected_total,
            http_requests_total,
            http_request_duration_seconds,
        })
    }

    /// Uebernimmt eine Momentaufnahme in die Metriken
    pub fn aktualisieren(&self, werte: &RelayMesswerte) {
        self.connections.set(werte.verbindungen as i64);
        self.rooms.set(werte.raeume as i64);
        self.peers.set(werte.peers as i64);
        self.server_links.set(werte.server_links as i64);

        nachziehen(&self.telemetry_accepted_total, werte.telemetrie_angenommen);
        nachziehen(&self.telemetry_dropped_total, werte.telemetrie_verworfen);
        nachziehen(&self.broadcasts_total, werte.broadcasts_gesendet);
        nachziehen(&self.broadcasts_suppressed_total, werte.broadcasts_unterdrueckt);
        nachziehen(&self.joins_total, werte.beitritte);
        nachziehen(&self.joins_rejected_total, werte.beitritte_abgelehnt);
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Startet den Task, der die Relay-Werte periodisch uebernimmt
pub fn sampler_starten(
    metriken: ProxvoiceMetriken,
    quelle: MesswertQuelle,
    intervall: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut takt = tokio::time::interval(intervall);
        loop {
            takt.tick().await;
            metriken.aktualisieren(&quelle());
        }
    })
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: ProxvoiceMetriken) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<ProxvoiceMetriken>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
