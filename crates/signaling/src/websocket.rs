//! WebSocket-Transport des Relays (axum)
//!
//! `GET /ws` mit Handshake-Parametern als Query:
//! `api-key`, `server-address`, `server-port`, `plugin-version`, `token`.
//! Jeder Frame ist ein JSON-Objekt `{"event": ..., "data": ...}`.
//!
//! Pro Verbindung laeuft ein Task, der eingehende Frames dispatcht und die
//! beiden Send-Queues des Broadcasters leert. Die zuverlaessige Queue hat
//! Vorrang.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, Query, State, WebSocketUpgrade};
use axum::http::{header, HeaderMap};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use proxvoice_protocol::{AusgehendesEreignis, EingehendesEreignis};
use serde::Deserialize;

use crate::broadcast::Ausgehend;
use crate::dispatcher::MessageDispatcher;
use crate::handshake::{self, quell_ip_aus_forwarded, Handshake};

/// Query-Parameter des Verbindungsaufbaus
#[derive(Debug, Default, Deserialize)]
pub struct HandshakeParameter {
    #[serde(rename = "api-key")]
    pub api_key: Option<String>,
    #[serde(rename = "server-address")]
    pub server_address: Option<String>,
    #[serde(rename = "server-port")]
    pub server_port: Option<String>,
    #[serde(rename = "plugin-version")]
    pub plugin_version: Option<String>,
    pub token: Option<String>,
}

/// Router mit dem WebSocket-Endpunkt
pub fn router(dispatcher: Arc<MessageDispatcher>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(dispatcher)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(parameter): Query<HandshakeParameter>,
    headers: HeaderMap,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(dispatcher): State<Arc<MessageDispatcher>>,
) -> impl IntoResponse {
    let quell_ip = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(quell_ip_aus_forwarded)
        .unwrap_or_else(|| peer.ip().to_string());
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    let handshake = Handshake {
        api_key: parameter.api_key,
        server_address: parameter.server_address,
        server_port: parameter.server_port,
        plugin_version: parameter.plugin_version,
        token: parameter.token,
        user_agent,
        quell_ip: Some(quell_ip),
    };

    ws.on_upgrade(move |socket| verbindung_bedienen(socket, handshake, dispatcher))
}

async fn senden(
    sender: &mut SplitSink<WebSocket, Message>,
    ereignis: &AusgehendesEreignis,
) -> Result<(), axum::Error> {
    match ereignis.to_json() {
        Ok(json) => sender.send(Message::Text(json)).await,
        Err(e) => {
            tracing::error!(ereignis = ereignis.name(), fehler = %e, "Ereignis nicht serialisierbar");
            Ok(())
        }
    }
}

async fn verbindung_bedienen(
    socket: WebSocket,
    handshake: Handshake,
    dispatcher: Arc<MessageDispatcher>,
) {
    let quell_ip = handshake.quell_ip.clone().unwrap_or_default();
    let (mut ctx, mut empfaenger) = handshake::verbinden(dispatcher.state(), handshake).await;
    tracing::debug!(verbindung = %ctx.id, quell_ip = %quell_ip, "WebSocket verbunden");

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            biased;

            ausgehend = empfaenger.zuverlaessig.recv() => match ausgehend {
                Some(Ausgehend::Ereignis(ereignis)) => {
                    if senden(&mut sender, &ereignis).await.is_err() {
                        break;
                    }
                }
                Some(Ausgehend::Trennen) | None => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            },

            Some(ereignis) = empfaenger.fluechtig.recv() => {
                if senden(&mut sender, &ereignis).await.is_err() {
                    break;
                }
            }

            eingehend = receiver.next() => match eingehend {
                Some(Ok(Message::Text(text))) => match EingehendesEreignis::from_json(&text) {
                    Ok(ereignis) => dispatcher.dispatch(ereignis, &mut ctx),
                    Err(e) => {
                        tracing::debug!(verbindung = %ctx.id, fehler = %e, "Ungueltiger Frame verworfen");
                    }
                },
                Some(Ok(Message::Ping(daten))) => {
                    if sender.send(Message::Pong(daten)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(verbindung = %ctx.id, fehler = %e, "WebSocket-Fehler");
                    break;
                }
            },
        }
    }

    dispatcher.verbindung_beenden(&mut ctx).await;
    tracing::debug!(verbindung = %ctx.id, "WebSocket getrennt");
}
