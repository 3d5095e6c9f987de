//! Join-Handler – Beitritt eines Voice-Clients zu einem Raum
//!
//! Reihenfolge der Pruefungen:
//! 1. Client-Version (User-Agent)
//! 2. Session-Token
//! 3. Rate-Limit pro Identitaet
//! 4. Ein Geraet pro Identitaet
//! 5. Raum-Code und Existenz des Raums
//! 6. Spieler steht in der Telemetrie des Raums (konfigurierbar)
//!
//! Jede Ablehnung wird als `join-room-result` mit `success: false`
//! beantwortet.

use std::collections::HashMap;
use std::sync::Arc;

use proxvoice_core::{RaumCode, VerbindungsId};
use proxvoice_protocol::events::{JoinRoomDaten, PeerEreignis};
use proxvoice_protocol::{AusgehendesEreignis, Ausnahme, ClientRecord, JoinRoomAntwort};
use tokio::time::Instant;

use crate::error::SignalingResult;
use crate::kontext::{VerbindungsKontext, VerbindungsZustand};
use crate::presence;
use crate::server_state::{RelayState, RelayZaehler};
use crate::watchdog;

const MELDUNG_VERALTET: &str =
    "Your client version is outdated. Please update before joining the room.";
const MELDUNG_AUTH: &str = "Authentication Expired";
const MELDUNG_RATE_LIMIT: &str = "Rate limit hit";
const MELDUNG_ANDERES_GERAET: &str =
    "This account is already connected to a room on another device.";
const MELDUNG_UNGUELTIGER_CODE: &str = "Invalid room code";
const MELDUNG_KEIN_RAUM: &str = "Room does not exist";
const MELDUNG_NICHT_AUF_SERVER: &str = "You must be on the server before joining the room";

/// Erfolgreicher Beitritt
struct Beitritt {
    code: RaumCode,
    antwort: JoinRoomAntwort,
    record: ClientRecord,
    andere: Vec<VerbindungsId>,
}

/// Verarbeitet `join-room`
pub fn handle_join_room(
    daten: JoinRoomDaten,
    ctx: &mut VerbindungsKontext,
    state: &Arc<RelayState>,
) -> SignalingResult<()> {
    let beitritt = match beitreten(daten, ctx, state) {
        Ok(beitritt) => beitritt,
        Err(antwort) => {
            RelayZaehler::erhoehen(&state.zaehler.beitritte_abgelehnt);
            tracing::debug!(
                verbindung = %ctx.id,
                grund = %antwort.message,
                "Beitritt abgelehnt"
            );
            state
                .broadcaster
                .an_verbindung_senden(&ctx.id, AusgehendesEreignis::JoinRoomResult(antwort));
            return Ok(());
        }
    };

    RelayZaehler::erhoehen(&state.zaehler.beitritte);
    tracing::info!(
        verbindung = %ctx.id,
        steam_id = %beitritt.record.steam_id,
        raum = %beitritt.code,
        "Client dem Raum beigetreten"
    );

    ctx.zustand = VerbindungsZustand::ImRaum;
    ctx.raum = Some(beitritt.code.clone());
    ctx.watchdogs.benachrichtigung_abbrechen();
    ctx.watchdogs.peer_abbrechen();
    ctx.watchdogs.peer = Some(watchdog::peer_starten(
        state.clone(),
        beitritt.code,
        ctx.id,
        beitritt.record.steam_id.clone(),
    ));

    state.broadcaster.an_verbindung_senden(
        &ctx.id,
        AusgehendesEreignis::JoinRoomResult(beitritt.antwort),
    );
    state.broadcaster.an_verbindungen_senden(
        &beitritt.andere,
        &AusgehendesEreignis::UserJoined(PeerEreignis {
            socket_id: ctx.id,
            client: beitritt.record,
        }),
    );
    Ok(())
}

fn beitreten(
    daten: JoinRoomDaten,
    ctx: &mut VerbindungsKontext,
    state: &Arc<RelayState>,
) -> Result<Beitritt, JoinRoomAntwort> {
    if let Err(e) = state.versionen.client_pruefen(ctx.client_version.as_deref()) {
        tracing::debug!(verbindung = %ctx.id, fehler = %e, "Client-Version abgelehnt");
        return Err(JoinRoomAntwort::abgelehnt(MELDUNG_VERALTET));
    }

    let steam_id = match state.sessions.pruefen(&daten.token) {
        Ok(steam_id) => steam_id,
        Err(e) => {
            tracing::debug!(verbindung = %ctx.id, fehler = %e, "Token beim Beitritt abgelehnt");
            state.broadcaster.an_verbindung_senden(
                &ctx.id,
                AusgehendesEreignis::Exception(Ausnahme::auth_abgelaufen()),
            );
            return Err(JoinRoomAntwort::abgelehnt(MELDUNG_AUTH));
        }
    };
    if ctx.zustand == VerbindungsZustand::Verbindend {
        ctx.zustand = VerbindungsZustand::Authentifiziert;
    }
    ctx.steam_id = Some(steam_id.clone());

    if let Err(retry_after) = state.rate_limiter.pruefe_oeffentlich(steam_id.as_str()) {
        tracing::debug!(steam_id = %steam_id, retry_after, "Rate-Limit beim Beitritt");
        return Err(JoinRoomAntwort::abgelehnt(MELDUNG_RATE_LIMIT));
    }

    if ctx.raum.is_some() || state.registry.identitaet_finden(&steam_id).is_some() {
        return Err(JoinRoomAntwort::abgelehnt(MELDUNG_ANDERES_GERAET));
    }

    let code = RaumCode::roh(daten.room_code.trim());
    if code.ist_leer() {
        return Err(JoinRoomAntwort::abgelehnt(MELDUNG_UNGUELTIGER_CODE));
    }

    let raum = state
        .registry
        .finden(&code)
        .ok_or_else(|| JoinRoomAntwort::abgelehnt(MELDUNG_KEIN_RAUM))?;

    let mut r = raum.lock();
    if r.geschlossen {
        return Err(JoinRoomAntwort::abgelehnt(MELDUNG_KEIN_RAUM));
    }
    if state.konfig.beitritt_nur_auf_server && !presence::ist_berechtigt(&r, &steam_id) {
        return Err(JoinRoomAntwort::abgelehnt(MELDUNG_NICHT_AUF_SERVER));
    }
    if !state
        .registry
        .identitaet_reservieren(&steam_id, &code, ctx.id)
    {
        return Err(JoinRoomAntwort::abgelehnt(MELDUNG_ANDERES_GERAET));
    }

    let bisherige: HashMap<VerbindungsId, ClientRecord> = r
        .clients
        .iter()
        .filter(|(v, _)| **v != ctx.id)
        .map(|(v, c)| (*v, c.clone()))
        .collect();
    let record = r.peer_hinzufuegen(ctx.id, steam_id, daten.is_muted, Instant::now());

    let antwort = JoinRoomAntwort {
        success: true,
        message: "Joining room".to_string(),
        map_name: r.map_name.clone(),
        joined_clients: Some(bisherige),
        server_config: Some(r.config.clone()),
    };

    Ok(Beitritt {
        andere: r.andere_mitglieder(&ctx.id),
        code: code.clone(),
        antwort,
        record,
    })
}
