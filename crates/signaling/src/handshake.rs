//! Verbindungsaufbau – Handshake fuer Game-Server-Links und Voice-Clients
//!
//! Ein Game-Server uebergibt `api-key`, `server-address`, `server-port` und
//! `plugin-version`. Geprueft werden Key, Plugin-Version und die
//! beobachtete Quell-IP; danach wird die Verbindung zum autoritativen Link
//! des Raums `adresse:port`.
//!
//! Ein Voice-Client uebergibt optional ein Session-Token. Ist es gueltig,
//! startet der Benachrichtigungs-Timer (`player-on-server`); ist es
//! ungueltig, erhaelt der Client `AuthExpired` und bleibt verbunden.

use std::sync::Arc;

use proxvoice_auth::{api_key_pruefen, client_version_aus_user_agent, AuthError};
use proxvoice_core::{RaumCode, VerbindungsId};
use proxvoice_protocol::{AusgehendesEreignis, Ausnahme, ExceptionCode};
use tokio::time::Instant;

use crate::broadcast::ClientEmpfaenger;
use crate::kontext::{Rolle, VerbindungsKontext, VerbindungsZustand};
use crate::server_state::{RelayState, ServerLink};
use crate::watchdog;

/// Parameter des Verbindungsaufbaus
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Handshake {
    pub api_key: Option<String>,
    pub server_address: Option<String>,
    pub server_port: Option<String>,
    pub plugin_version: Option<String>,
    pub token: Option<String>,
    pub user_agent: Option<String>,
    /// Beobachtete Quell-IP (erster `X-Forwarded-For`-Eintrag oder Peer-Adresse)
    pub quell_ip: Option<String>,
}

impl Handshake {
    fn gesetzt(wert: &Option<String>) -> Option<&str> {
        wert.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Enthaelt der Handshake Game-Server-Zugangsdaten?
    pub fn ist_server_link(&self) -> bool {
        Self::gesetzt(&self.api_key).is_some()
            && Self::gesetzt(&self.server_address).is_some()
            && Self::gesetzt(&self.server_port).is_some()
    }
}

/// Erster Eintrag eines `X-Forwarded-For`-Headers
pub fn quell_ip_aus_forwarded(header: &str) -> Option<String> {
    header
        .split(',')
        .next()
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

/// Registriert eine neue Verbindung und fuehrt den Handshake aus
///
/// Abgelehnte Game-Server-Links haben ihre Exception und das Trenn-Signal
/// bereits in der Queue wenn diese Funktion zurueckkehrt.
pub async fn verbinden(
    state: &Arc<RelayState>,
    handshake: Handshake,
) -> (VerbindungsKontext, ClientEmpfaenger) {
    let id = VerbindungsId::new();
    let empfaenger = state.broadcaster.client_registrieren(id);
    let client_version = handshake
        .user_agent
        .as_deref()
        .and_then(client_version_aus_user_agent)
        .map(str::to_string);
    let mut ctx = VerbindungsKontext::neu(id, client_version);

    if handshake.ist_server_link() {
        if let Err(ausnahme) = server_link_anmelden(state, &mut ctx, &handshake).await {
            tracing::info!(
                verbindung = %id,
                code = ?ausnahme.code,
                "Game-Server-Link abgelehnt"
            );
            state
                .broadcaster
                .an_verbindung_senden(&id, AusgehendesEreignis::Exception(ausnahme));
            state.broadcaster.trennen(&id);
        }
    }

    if let Some(token) = Handshake::gesetzt(&handshake.token) {
        match state.sessions.pruefen(token) {
            Ok(steam_id) => {
                tracing::debug!(verbindung = %id, steam_id = %steam_id, "Client authentifiziert");
                ctx.zustand = VerbindungsZustand::Authentifiziert;
                ctx.watchdogs.benachrichtigung =
                    Some(watchdog::benachrichtigung_starten(state.clone(), id, steam_id.clone()));
                ctx.steam_id = Some(steam_id);
            }
            Err(e) => {
                tracing::debug!(verbindung = %id, fehler = %e, "Session-Token abgelehnt");
                state
                    .broadcaster
                    .an_verbindung_senden(&id, AusgehendesEreignis::Exception(Ausnahme::auth_abgelaufen()));
            }
        }
    }

    (ctx, empfaenger)
}

// ---------------------------------------------------------------------------
// Game-Server-Link
// ---------------------------------------------------------------------------

async fn server_link_anmelden(
    state: &Arc<RelayState>,
    ctx: &mut VerbindungsKontext,
    handshake: &Handshake,
) -> Result<(), Ausnahme> {
    let api_key = Handshake::gesetzt(&handshake.api_key).unwrap_or_default();
    let adresse = Handshake::gesetzt(&handshake.server_address).unwrap_or_default();
    let port = Handshake::gesetzt(&handshake.server_port).unwrap_or_default();

    let record = match api_key_pruefen(state.schluessel.as_ref(), api_key).await {
        Ok(record) => record,
        Err(AuthError::ApiKeyAbgelaufen) => {
            return Err(Ausnahme::neu(
                ExceptionCode::InvalidApiKey,
                "Your API key has expired.",
            ))
        }
        Err(e) => {
            if !matches!(e, AuthError::ApiKeyUnbekannt) {
                tracing::error!(fehler = %e, "Key-Store nicht lesbar");
            }
            return Err(Ausnahme::neu(
                ExceptionCode::InvalidApiKey,
                "Invalid API Key set, please ensure you have the correct Region (SocketURL) set.",
            ));
        }
    };

    if let Err(e) = state.versionen.plugin_pruefen(handshake.plugin_version.as_deref()) {
        tracing::debug!(fehler = %e, "Plugin-Version abgelehnt");
        return Err(Ausnahme::neu(
            ExceptionCode::PluginOutdated,
            "Please update the Proximity Chat plugin to the latest version. \
             https://github.com/b0ink/CS2-VoiceProximity-Plugin/releases/latest",
        ));
    }

    match handshake.quell_ip.as_deref() {
        None => {
            return Err(Ausnahme::neu(
                ExceptionCode::InvalidServerIp,
                "Invalid IP found in socket connection",
            ))
        }
        Some(ip) if ip != adresse => {
            tracing::info!(
                erwartet = adresse,
                beobachtet = ip,
                key = %record.zensiert(),
                "IP-Abweichung zwischen Game-Server und Verbindung"
            );
            return Err(Ausnahme::neu(
                ExceptionCode::InvalidServerIp,
                "IP mismatch between CS2 server and incoming connection.",
            ));
        }
        Some(_) => {}
    }

    let code = RaumCode::aus_adresse(adresse, port);

    // Vorherigen Link desselben Keys abloesen
    let vorheriger = state.server_links.insert(
        record.id,
        ServerLink {
            verbindung: ctx.id,
            raum: code.clone(),
        },
    );
    if let Some(alt) = vorheriger.filter(|alt| alt.verbindung != ctx.id) {
        tracing::info!(
            alt = %alt.verbindung,
            neu = %ctx.id,
            key = %record.zensiert(),
            "API-Key erneut verwendet – vorheriger Link wird getrennt"
        );
        if let Some(raum) = state.registry.finden(&alt.raum) {
            let mut r = raum.lock();
            if r.server_verbindung == Some(alt.verbindung) {
                r.server_verbindung = None;
            }
        }
        state.broadcaster.an_verbindung_senden(
            &alt.verbindung,
            AusgehendesEreignis::Exception(Ausnahme::api_key_wiederverwendet()),
        );
        state.broadcaster.trennen(&alt.verbindung);
        if alt.raum != code {
            state
                .registry
                .entfernen(&alt.raum, Some(Ausnahme::raum_geschlossen()));
        }
    }

    let (raum, neu) = state.registry.finden_oder_erstellen(&code, record.id);
    {
        let mut r = raum.lock();
        r.server_verbindung = Some(ctx.id);
        r.api_key_id = record.id;
        if neu {
            r.watchdog = Some(watchdog::raum_starten(state.clone(), code.clone()));
        }
    }

    tracing::info!(
        verbindung = %ctx.id,
        raum = %code,
        label = %record.label,
        neu,
        "Game-Server-Link verbunden"
    );
    ctx.rolle = Rolle::ServerLink {
        raum: code,
        api_key_id: record.id,
        verbunden_seit: Instant::now(),
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwarded_header_erster_eintrag() {
        assert_eq!(
            quell_ip_aus_forwarded("203.0.113.7, 172.68.1.1").as_deref(),
            Some("203.0.113.7")
        );
        assert_eq!(quell_ip_aus_forwarded("203.0.113.7").as_deref(), Some("203.0.113.7"));
        assert_eq!(quell_ip_aus_forwarded(""), None);
    }

    #[test]
    fn server_link_braucht_key_adresse_und_port() {
        let mut h = Handshake {
            api_key: Some("abc".into()),
            server_address: Some("1.2.3.4".into()),
            ..Default::default()
        };
        assert!(!h.ist_server_link());
        h.server_port = Some("27015".into());
        assert!(h.ist_server_link());
        h.api_key = Some("  ".into());
        assert!(!h.ist_server_link());
    }
}
