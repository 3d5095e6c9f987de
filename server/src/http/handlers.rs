//! Handler der HTTP-Endpunkte

use std::net::SocketAddr;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::http::{bearer_token, client_ip, fehler, AppState};

/// Antwort von `GET /`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusAntwort {
    pub connected_users: usize,
    pub connected_servers: usize,
}

/// `GET /` – Anzahl verbundener Spieler und Game-Server
pub async fn status(State(state): State<AppState>) -> Json<StatusAntwort> {
    let statistik = state.relay.statistik();
    Json(StatusAntwort {
        connected_users: statistik
            .verbindungen
            .saturating_sub(statistik.server_links),
        connected_servers: statistik.raeume,
    })
}

/// `GET /get-ice-servers`
pub async fn get_ice_servers(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let ip = client_ip(&headers, peer);
    if let Err(retry_after) = state.relay.rate_limiter.pruefe_oeffentlich(&format!("ip:{ip}")) {
        tracing::debug!(ip = %ip, retry_after, "Rate-Limit fuer ICE-Server");
        return fehler(StatusCode::TOO_MANY_REQUESTS, "Too Many Requests.");
    }

    let Some(token) = bearer_token(&headers) else {
        return fehler(StatusCode::UNAUTHORIZED, "Unauthorised");
    };
    let steam_id = match state.relay.sessions.pruefen(token) {
        Ok(steam_id) => steam_id,
        Err(e) => {
            tracing::debug!(ip = %ip, fehler = %e, "ICE-Anfrage mit ungueltigem Token");
            return fehler(StatusCode::UNAUTHORIZED, "Unauthorised");
        }
    };

    let jetzt_sek = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();
    match state.turn.ice_server(&steam_id, jetzt_sek) {
        Ok(ice_servers) => (
            StatusCode::OK,
            Json(json!({
                "message": "Success",
                "data": {
                    "iceServers": ice_servers,
                    "forceRelayOnly": state.turn.nur_relay(),
                }
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(steam_id = %steam_id, fehler = %e, "TURN-Zugangsdaten nicht erzeugbar");
            fehler(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NeustartBody {
    pub minutes: Option<u32>,
}

/// `POST /admin/restart-warning`
pub async fn restart_warning(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let ip = client_ip(&headers, peer);
    if state.relay.rate_limiter.pruefe_admin(&ip).is_err() {
        tracing::info!(ip = %ip, "Rate-Limit fuer Admin-Endpunkt");
        return fehler(StatusCode::TOO_MANY_REQUESTS, "Too Many Requests.");
    }

    let berechtigt = match (&state.restart_secret, bearer_token(&headers)) {
        (Some(secret), Some(token)) => token == &**secret,
        _ => false,
    };
    if !berechtigt {
        tracing::warn!(ip = %ip, "Neustart-Warnung ohne gueltiges Secret");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let body: NeustartBody = if body.iter().all(u8::is_ascii_whitespace) {
        NeustartBody::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(body) => body,
            Err(_) => return fehler(StatusCode::BAD_REQUEST, "Invalid request"),
        }
    };
    let minutes = body.minutes.filter(|m| *m > 0).unwrap_or(1);

    state.relay.neustart_warnung(minutes);
    StatusCode::OK.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::http::HeaderValue;
    use proxvoice_auth::{
        IceKonfig, IceServerKonfig, MemoryKeyStore, RateLimitBudget, RateLimitKonfig, RateLimiter,
        SessionVerifier, TurnAussteller, VersionsPruefer,
    };
    use proxvoice_core::{SteamId, VerbindungsId};
    use proxvoice_protocol::events::NeustartWarnung;
    use proxvoice_protocol::AusgehendesEreignis;
    use proxvoice_signaling::{Ausgehend, RelayKonfig, RelayState};

    const RESTART_SECRET: &str = "neustart-geheim";

    fn peer() -> ConnectInfo<SocketAddr> {
        ConnectInfo("198.51.100.10:51000".parse().unwrap())
    }

    fn app_state() -> AppState {
        let rate_limit = RateLimitKonfig {
            oeffentlich: RateLimitBudget {
                punkte: 3,
                dauer_sek: 60,
            },
            admin: RateLimitBudget {
                punkte: 2,
                dauer_sek: 60,
            },
        };
        let relay = RelayState::neu(
            RelayKonfig::default(),
            SessionVerifier::neu("test-geheimnis", "voice.example.org"),
            Arc::new(MemoryKeyStore::neu()),
            VersionsPruefer::neu("0.1.37-alpha.0", "0.0.27").unwrap(),
            RateLimiter::neu(rate_limit),
        );
        let turn = TurnAussteller::neu(IceKonfig {
            servers: vec![
                IceServerKonfig {
                    urls: "stun:stun.example.org:3478".into(),
                    secret: None,
                    renewal_window: None,
                    credential_expiry: None,
                    default_username: None,
                    default_password: None,
                },
                IceServerKonfig {
                    urls: "turn:turn.example.org:3478".into(),
                    secret: Some("coturn".into()),
                    renewal_window: None,
                    credential_expiry: None,
                    default_username: None,
                    default_password: None,
                },
            ],
            force_relay_only: false,
        });
        AppState::neu(relay, Arc::new(turn), Some(RESTART_SECRET.into()))
    }

    fn mit_bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    async fn json_body(antwort: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(antwort.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn status_zaehlt_spieler_und_server() {
        let state = app_state();
        let _a = state.relay.broadcaster.client_registrieren(VerbindungsId::new());
        let _b = state.relay.broadcaster.client_registrieren(VerbindungsId::new());

        let Json(antwort) = status(State(state)).await;
        assert_eq!(
            antwort,
            StatusAntwort {
                connected_users: 2,
                connected_servers: 0,
            }
        );
    }

    #[tokio::test]
    async fn ice_server_mit_gueltigem_token() {
        let state = app_state();
        let steam_id = SteamId::parse("76561198000000001").unwrap();
        let token = state.relay.sessions.ausstellen(&steam_id, 3600).unwrap();

        let antwort = get_ice_servers(State(state), peer(), mit_bearer(&token)).await;
        assert_eq!(antwort.status(), StatusCode::OK);

        let json = json_body(antwort).await;
        assert_eq!(json["message"], "Success");
        assert_eq!(json["data"]["forceRelayOnly"], false);
        let server = json["data"]["iceServers"].as_array().unwrap();
        assert_eq!(server.len(), 2);
        assert_eq!(server[0]["type"], "STUN");
        assert_eq!(server[1]["type"], "TURN");
        let username = server[1]["turnCredential"]["username"].as_str().unwrap();
        assert!(username.ends_with(":76561198000000001"));
    }

    #[tokio::test]
    async fn ice_server_ohne_token_401() {
        let state = app_state();
        let antwort = get_ice_servers(State(state.clone()), peer(), HeaderMap::new()).await;
        assert_eq!(antwort.status(), StatusCode::UNAUTHORIZED);

        let antwort = get_ice_servers(State(state), peer(), mit_bearer("kaputt")).await;
        assert_eq!(antwort.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(antwort).await["message"], "Unauthorised");
    }

    #[tokio::test]
    async fn ice_server_rate_limit_pro_ip() {
        let state = app_state();
        for _ in 0..3 {
            let antwort = get_ice_servers(State(state.clone()), peer(), HeaderMap::new()).await;
            assert_eq!(antwort.status(), StatusCode::UNAUTHORIZED);
        }
        let antwort = get_ice_servers(State(state), peer(), HeaderMap::new()).await;
        assert_eq!(antwort.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn neustart_warnung_mit_secret() {
        let state = app_state();
        let mut rx = state.relay.broadcaster.client_registrieren(VerbindungsId::new());

        let antwort = restart_warning(
            State(state),
            peer(),
            mit_bearer(RESTART_SECRET),
            Bytes::from_static(br#"{"minutes": 5}"#),
        )
        .await;
        assert_eq!(antwort.status(), StatusCode::OK);

        assert_eq!(
            rx.zuverlaessig.try_recv().unwrap(),
            Ausgehend::Ereignis(AusgehendesEreignis::ServerRestartWarning(NeustartWarnung {
                minutes: 5
            }))
        );
    }

    #[tokio::test]
    async fn neustart_warnung_standard_eine_minute() {
        let state = app_state();
        let mut rx = state.relay.broadcaster.client_registrieren(VerbindungsId::new());

        let antwort =
            restart_warning(State(state), peer(), mit_bearer(RESTART_SECRET), Bytes::new()).await;
        assert_eq!(antwort.status(), StatusCode::OK);

        assert_eq!(
            rx.zuverlaessig.try_recv().unwrap(),
            Ausgehend::Ereignis(AusgehendesEreignis::ServerRestartWarning(NeustartWarnung {
                minutes: 1
            }))
        );
    }

    #[tokio::test]
    async fn neustart_warnung_falsches_secret_und_rate_limit() {
        let state = app_state();
        for _ in 0..2 {
            let antwort =
                restart_warning(State(state.clone()), peer(), mit_bearer("falsch"), Bytes::new())
                    .await;
            assert_eq!(antwort.status(), StatusCode::UNAUTHORIZED);
        }
        // Admin-Budget aufgebraucht, auch mit richtigem Secret
        let antwort =
            restart_warning(State(state), peer(), mit_bearer(RESTART_SECRET), Bytes::new()).await;
        assert_eq!(antwort.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn neustart_warnung_ohne_konfiguriertes_secret() {
        let mut state = app_state();
        state.restart_secret = None;
        let antwort =
            restart_warning(State(state), peer(), mit_bearer(RESTART_SECRET), Bytes::new()).await;
        assert_eq!(antwort.status(), StatusCode::UNAUTHORIZED);
    }
}
