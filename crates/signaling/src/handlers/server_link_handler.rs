//! Server-Link-Handler – Ereignisse des autoritativen Game-Servers
//!
//! Angenommen werden nur Ereignisse der Verbindung, die aktuell als Link
//! des Raums eingetragen ist. Ein abgeloester Link wird ignoriert.

use std::sync::Arc;

use proxvoice_protocol::events::{TuerDaten, TuerRotation};
use proxvoice_protocol::{AusgehendesEreignis, Vektor3, VoiceConfig};
use tokio::time::Instant;

use crate::error::{SignalingError, SignalingResult};
use crate::kontext::{Rolle, VerbindungsKontext};
use crate::presence::{self, PushErgebnis};
use crate::room::Room;
use crate::server_state::{RelayState, RelayZaehler};

/// Fuehrt `f` unter dem Raum-Lock aus, sofern `ctx` der aktuelle Link ist
fn mit_link_raum<T>(
    ctx: &VerbindungsKontext,
    state: &Arc<RelayState>,
    f: impl FnOnce(&mut Room) -> T,
) -> SignalingResult<T> {
    let Rolle::ServerLink { raum: code, .. } = &ctx.rolle else {
        return Err(SignalingError::zugriff_verweigert("kein Game-Server-Link"));
    };
    let raum = state
        .registry
        .finden(code)
        .ok_or_else(|| SignalingError::RaumNichtGefunden(code.clone()))?;

    let mut r = raum.lock();
    if r.server_verbindung != Some(ctx.id) {
        return Err(SignalingError::zugriff_verweigert(
            "nicht der aktuelle Link des Raums",
        ));
    }
    Ok(f(&mut *r))
}

/// Verarbeitet `server-config` (natives Format des Plugins)
pub fn handle_server_config(
    bytes: Vec<u8>,
    ctx: &VerbindungsKontext,
    state: &Arc<RelayState>,
) -> SignalingResult<()> {
    let config = VoiceConfig::aus_nativ(&bytes)?;
    let kodiert = config.kodieren()?;

    let mitglieder = mit_link_raum(ctx, state, |r| {
        r.config = config;
        r.mitglieder()
    })?;

    tracing::debug!(verbindung = %ctx.id, "Voice-Konfiguration vom Game-Server");
    state
        .broadcaster
        .an_verbindungen_senden(&mitglieder, &AusgehendesEreignis::ServerConfig(kodiert));
    Ok(())
}

/// Verarbeitet `current-map`
pub fn handle_current_map(
    map_name: String,
    ctx: &VerbindungsKontext,
    state: &Arc<RelayState>,
) -> SignalingResult<()> {
    let mitglieder = mit_link_raum(ctx, state, |r| {
        r.map_name = Some(map_name.clone());
        r.mitglieder()
    })?;

    tracing::debug!(verbindung = %ctx.id, map = %map_name, "Map gewechselt");
    state
        .broadcaster
        .an_verbindungen_senden(&mitglieder, &AusgehendesEreignis::CurrentMap(map_name));
    Ok(())
}

/// Zerlegt `"x y z"` in drei endliche Zahlen
pub fn ursprung_parsen(origin: &str) -> Option<Vektor3> {
    let werte: Vec<f64> = origin
        .split(' ')
        .map(|teil| teil.parse::<f64>().ok().filter(|w| w.is_finite()))
        .collect::<Option<_>>()?;
    match werte.as_slice() {
        [x, y, z] => Some(Vektor3::neu(*x, *y, *z)),
        _ => None,
    }
}

/// Verarbeitet `door-rotation`
pub fn handle_door_rotation(
    daten: TuerDaten,
    ctx: &VerbindungsKontext,
    state: &Arc<RelayState>,
) -> SignalingResult<()> {
    let absorigin = ursprung_parsen(&daten.origin).ok_or_else(|| {
        SignalingError::UngueltigePayload(format!("Tuer-Ursprung '{}'", daten.origin))
    })?;

    let mitglieder = mit_link_raum(ctx, state, |r| r.mitglieder())?;
    state.broadcaster.an_verbindungen_fluechtig(
        &mitglieder,
        &AusgehendesEreignis::DoorRotation(TuerRotation {
            absorigin,
            rotation: daten.rotation,
        }),
    );
    Ok(())
}

/// Verarbeitet `player-positions` (Telemetrie-Push)
pub fn handle_player_positions(
    bytes: Vec<u8>,
    ctx: &VerbindungsKontext,
    state: &Arc<RelayState>,
) -> SignalingResult<()> {
    let ergebnis = mit_link_raum(ctx, state, |r| {
        presence::telemetrie_verarbeiten(r, &bytes, Instant::now(), &state.konfig)
    })?;

    let zaehler = &state.zaehler;
    match ergebnis {
        PushErgebnis::ZuFrueh | PushErgebnis::Dekodierfehler => {
            RelayZaehler::erhoehen(&zaehler.telemetrie_verworfen);
        }
        PushErgebnis::Unterdrueckt => {
            RelayZaehler::erhoehen(&zaehler.telemetrie_angenommen);
            RelayZaehler::erhoehen(&zaehler.broadcasts_unterdrueckt);
        }
        PushErgebnis::Kodierfehler => {
            RelayZaehler::erhoehen(&zaehler.telemetrie_angenommen);
        }
        PushErgebnis::Broadcast {
            bytes, empfaenger, ..
        } => {
            RelayZaehler::erhoehen(&zaehler.telemetrie_angenommen);
            RelayZaehler::erhoehen(&zaehler.broadcasts_gesendet);
            state
                .broadcaster
                .an_verbindungen_fluechtig(&empfaenger, &AusgehendesEreignis::PlayerPositions(bytes));
        }
    }
    Ok(())
}
