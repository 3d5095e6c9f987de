//! proxvoice-server – Bibliotheks-Root
//!
//! Baut aus der Konfiguration den Relay-Zustand und den HTTP-Router
//! zusammen und betreibt beides bis zum Shutdown-Signal.

pub mod config;
pub mod http;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method};
use axum::Router;
use config::ServerConfig;
use proxvoice_auth::{JsonKeyStore, RateLimiter, SessionVerifier, TurnAussteller, VersionsPruefer};
use proxvoice_observability::{
    health_router, metrics_router, metriken_middleware, request_timing_layer, sampler_starten,
    HealthState, MesswertQuelle, ProxvoiceMetriken, RelayMesswerte,
};
use proxvoice_signaling::{MessageDispatcher, RelayState};
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};

use crate::http::{routes::http_router, AppState};

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

/// Liest die Relay-Zaehler fuer Metriken und Health-Check
pub fn messwert_quelle(relay: Arc<RelayState>) -> MesswertQuelle {
    Arc::new(move || {
        let s = relay.statistik();
        RelayMesswerte {
            verbindungen: s.verbindungen,
            raeume: s.raeume,
            peers: s.peers,
            server_links: s.server_links,
            telemetrie_angenommen: s.telemetrie_angenommen,
            telemetrie_verworfen: s.telemetrie_verworfen,
            broadcasts_gesendet: s.broadcasts_gesendet,
            broadcasts_unterdrueckt: s.broadcasts_unterdrueckt,
            beitritte: s.beitritte,
            beitritte_abgelehnt: s.beitritte_abgelehnt,
        }
    })
}

/// Erstellt den Relay-Zustand aus der Konfiguration
pub fn relay_erstellen(config: &ServerConfig) -> Result<Arc<RelayState>> {
    let versionen = VersionsPruefer::neu(
        &config.auth.min_client_version,
        &config.auth.min_plugin_version,
    )
    .context("Mindestversionen ungueltig")?;

    Ok(RelayState::neu(
        config.relay.clone(),
        SessionVerifier::neu(config.jwt_secret(), config.server.domain.clone()),
        Arc::new(JsonKeyStore::neu(&config.auth.key_datenbank)),
        versionen,
        RateLimiter::neu(config.rate_limit),
    ))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Baut den vollstaendigen Router: WebSocket, HTTP-Endpunkte, Health, Metriken
pub fn router_erstellen(
    app: AppState,
    dispatcher: Arc<MessageDispatcher>,
    health: HealthState,
    metriken: ProxvoiceMetriken,
    cors_origins: &[String],
) -> Router {
    http_router()
        .with_state(app)
        .merge(proxvoice_signaling::websocket::router(dispatcher))
        .merge(health_router(health))
        .merge(metrics_router(metriken.clone()))
        .route_layer(axum::middleware::from_fn_with_state(
            metriken,
            metriken_middleware,
        ))
        .layer(request_timing_layer())
        .layer(cors_layer(cors_origins))
}

/// Raeumt Rate-Limit-Buckets und abgelaufene TURN-Zugangsdaten auf
fn wartung_starten(
    relay: Arc<RelayState>,
    turn: Arc<TurnAussteller>,
    intervall: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut takt = tokio::time::interval(intervall);
        loop {
            takt.tick().await;
            relay.rate_limiter.cleanup();
            let jetzt_sek = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();
            turn.cleanup(jetzt_sek);
            tracing::trace!("Wartung abgeschlossen");
        }
    })
}

/// Wartet auf Ctrl-C bzw. SIGTERM und markiert den Health-Check
async fn shutdown_signal(health: HealthState) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(fehler = %e, "Ctrl-C-Handler nicht installierbar");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(fehler = %e, "SIGTERM-Handler nicht installierbar");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    health.beenden();
    tracing::info!("Shutdown-Signal empfangen, Relay wird beendet");
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet den Relay und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Relay-Zustand (Auth, Key-Store, Rate-Limiter) aufbauen
    /// 2. Metriken, Health-Check und Wartungs-Tasks starten
    /// 3. HTTP/WebSocket-Listener binden
    /// 4. Bis Ctrl-C / SIGTERM bedienen
    pub async fn starten(self) -> Result<()> {
        let config = self.config;
        config.validieren()?;

        let relay = relay_erstellen(&config)?;
        let dispatcher = Arc::new(MessageDispatcher::neu(relay.clone()));
        let turn = Arc::new(TurnAussteller::neu(config.ice.clone()));
        let app = AppState::neu(relay.clone(), turn.clone(), config.auth.restart_secret.clone());

        let quelle = messwert_quelle(relay.clone());
        let metriken = ProxvoiceMetriken::neu().context("Metriken nicht registrierbar")?;
        let health = HealthState::neu(quelle.clone());

        let intervall = Duration::from_secs(config.server.wartung_intervall_sek.max(1));
        let sampler = sampler_starten(metriken.clone(), quelle, intervall);
        let wartung = wartung_starten(relay.clone(), turn, intervall);

        let router = router_erstellen(
            app,
            dispatcher,
            health.clone(),
            metriken,
            &config.server.cors_origins,
        );

        let bind_adresse = config.bind_adresse();
        let listener = tokio::net::TcpListener::bind(&bind_adresse)
            .await
            .with_context(|| format!("Bind auf {bind_adresse} fehlgeschlagen"))?;
        tracing::info!(
            adresse = %bind_adresse,
            domain = %config.server.domain,
            ice_server = config.ice.servers.len(),
            "Relay gestartet"
        );

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal(health))
        .await
        .context("HTTP-Server beendet mit Fehler")?;

        sampler.abort();
        wartung.abort();
        tracing::info!(
            raeume = relay.registry.anzahl(),
            "Relay beendet"
        );
        Ok(())
    }
}
