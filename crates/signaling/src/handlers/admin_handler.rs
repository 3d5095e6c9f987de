//! Admin-Handler – Stummschalten und Voice-Konfiguration
//!
//! Beide Ereignisse erfordern ein gueltiges Session-Token und das
//! Admin-Flag des Aufrufers in der autoritativen Spielerliste des Raums.
//! Der Relay erzwingt das Stummschalten nicht selbst, er signalisiert es
//! nur dem Ziel-Client.

use std::sync::Arc;

use proxvoice_core::SteamId;
use proxvoice_protocol::events::{ConfigUpdateDaten, MuteDaten};
use proxvoice_protocol::AusgehendesEreignis;

use crate::error::{SignalingError, SignalingResult};
use crate::handlers::eigener_raum;
use crate::kontext::VerbindungsKontext;
use crate::registry::RaumHandle;
use crate::server_state::RelayState;

/// Prueft Token und Admin-Flag des Aufrufers
fn admin_pruefen(
    token: &str,
    ctx: &VerbindungsKontext,
    state: &Arc<RelayState>,
) -> SignalingResult<(SteamId, RaumHandle)> {
    let steam_id = state.sessions.pruefen(token)?;
    let (_, raum) = eigener_raum(state, ctx)?;

    let ist_admin = raum
        .lock()
        .spieler_finden(&steam_id)
        .is_some_and(|p| p.is_admin);
    if !ist_admin {
        tracing::info!(steam_id = %steam_id, "Admin-Aktion ohne Admin-Recht");
        return Err(SignalingError::zugriff_verweigert("kein Server-Admin"));
    }
    Ok((steam_id, raum))
}

fn rate_limit(state: &Arc<RelayState>, steam_id: &SteamId) -> SignalingResult<()> {
    state
        .rate_limiter
        .pruefe_oeffentlich(steam_id.as_str())
        .map_err(SignalingError::RateLimit)
}

/// Verarbeitet `mute-player`
pub fn handle_mute_player(
    daten: MuteDaten,
    ctx: &VerbindungsKontext,
    state: &Arc<RelayState>,
) -> SignalingResult<()> {
    let (admin, raum) = admin_pruefen(&daten.client_token, ctx, state)?;

    let ziel_id = SteamId::parse(daten.target_steam_id)
        .map_err(|e| SignalingError::UngueltigePayload(e.to_string()))?;
    let ziel = raum
        .lock()
        .peer_zu_steam_id(&ziel_id)
        .ok_or_else(|| SignalingError::UngueltigePayload(format!("{ziel_id} ist nicht im Raum")))?;

    rate_limit(state, &admin)?;

    tracing::info!(admin = %admin, ziel = %ziel_id, "Spieler durch Server-Admin stummgeschaltet");
    state
        .broadcaster
        .an_verbindung_senden(&ziel, AusgehendesEreignis::MutedByServerAdmin);
    Ok(())
}

/// Verarbeitet `update-config`
///
/// Gesetzte Felder werden uebernommen, ungueltige verworfen. Die Clients
/// erhalten die vollstaendige Konfiguration, der Game-Server-Link das
/// native Format.
pub fn handle_update_config(
    daten: ConfigUpdateDaten,
    ctx: &VerbindungsKontext,
    state: &Arc<RelayState>,
) -> SignalingResult<()> {
    let (admin, raum) = admin_pruefen(&daten.client_token, ctx, state)?;
    rate_limit(state, &admin)?;

    let (config, mitglieder, link) = {
        let mut r = raum.lock();
        let ergebnis = r.config.zusammenfuehren(&daten.config);
        for feld in &ergebnis.verworfen {
            tracing::warn!(admin = %admin, feld, "Ungueltiger Konfigurationswert ignoriert");
        }
        r.config = ergebnis.config;
        (r.config.clone(), r.mitglieder(), r.server_verbindung)
    };

    tracing::info!(admin = %admin, "Voice-Konfiguration aktualisiert");
    state.broadcaster.an_verbindungen_senden(
        &mitglieder,
        &AusgehendesEreignis::ServerConfig(config.kodieren()?),
    );
    if let Some(link) = link {
        state
            .broadcaster
            .an_verbindung_senden(&link, AusgehendesEreignis::ServerConfig(config.nativ_kodieren()?));
    }
    Ok(())
}
