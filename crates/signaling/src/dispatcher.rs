//! Message-Dispatcher – Routet eingehende Ereignisse an die richtigen Handler
//!
//! ## Zustandspruefung
//! - Game-Server-Ereignisse (`server-config`, `current-map`,
//!   `door-rotation`, `player-positions`) nur vom Game-Server-Link
//! - Client-Ereignisse nur von Voice-Clients
//! - Nach dem Trennen wird nichts mehr verarbeitet
//!
//! Handler-Fehler werden geloggt und verworfen; die Verbindung bleibt
//! bestehen.

use std::sync::Arc;

use proxvoice_protocol::events::PeerEreignis;
use proxvoice_protocol::{AusgehendesEreignis, EingehendesEreignis};

use crate::handlers::{admin_handler, join_handler, server_link_handler, signal_handler};
use crate::kontext::{Rolle, VerbindungsKontext, VerbindungsZustand};
use crate::server_state::RelayState;

/// Zentraler Message-Dispatcher
pub struct MessageDispatcher {
    state: Arc<RelayState>,
}

impl MessageDispatcher {
    pub fn neu(state: Arc<RelayState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &Arc<RelayState> {
        &self.state
    }

    /// Verarbeitet ein eingehendes Ereignis einer Verbindung
    pub fn dispatch(&self, ereignis: EingehendesEreignis, ctx: &mut VerbindungsKontext) {
        if ctx.ist_getrennt() {
            return;
        }

        let name = ereignis.name();
        if ereignis.ist_server_ereignis() != ctx.ist_server_link() {
            tracing::debug!(
                verbindung = %ctx.id,
                ereignis = name,
                "Ereignis passt nicht zur Rolle der Verbindung – ignoriert"
            );
            return;
        }

        let state = &self.state;
        let ergebnis = match ereignis {
            // -------------------------------------------------------------------
            // Voice-Client
            // -------------------------------------------------------------------
            EingehendesEreignis::JoinRoom(daten) => {
                join_handler::handle_join_room(daten, ctx, state)
            }
            EingehendesEreignis::Signal(daten) => signal_handler::handle_signal(daten, ctx, state),
            EingehendesEreignis::MicrophoneState(daten) => {
                signal_handler::handle_microphone_state(daten, ctx, state)
            }
            EingehendesEreignis::MutePlayer(daten) => {
                admin_handler::handle_mute_player(daten, ctx, state)
            }
            EingehendesEreignis::UpdateConfig(daten) => {
                admin_handler::handle_update_config(daten, ctx, state)
            }

            // -------------------------------------------------------------------
            // Game-Server-Link
            // -------------------------------------------------------------------
            EingehendesEreignis::ServerConfig(bytes) => {
                server_link_handler::handle_server_config(bytes, ctx, state)
            }
            EingehendesEreignis::CurrentMap(map) => {
                server_link_handler::handle_current_map(map, ctx, state)
            }
            EingehendesEreignis::DoorRotation(daten) => {
                server_link_handler::handle_door_rotation(daten, ctx, state)
            }
            EingehendesEreignis::PlayerPositions(bytes) => {
                server_link_handler::handle_player_positions(bytes, ctx, state)
            }
        };

        if let Err(e) = ergebnis {
            tracing::debug!(
                verbindung = %ctx.id,
                ereignis = name,
                fehler = %e,
                "Ereignis verworfen"
            );
        }
    }

    /// Raeumt eine getrennte Verbindung auf
    ///
    /// Bricht alle Timer ab, entfernt die Verbindung aus jedem Raum und
    /// bucht bei Game-Server-Links die verbundene Zeit auf den API-Key.
    /// Mehrfache Aufrufe sind wirkungslos.
    pub async fn verbindung_beenden(&self, ctx: &mut VerbindungsKontext) {
        if ctx.ist_getrennt() {
            return;
        }
        ctx.watchdogs.alle_abbrechen();
        ctx.zustand = VerbindungsZustand::Getrennt;
        ctx.raum = None;

        let state = &self.state;
        for raum in state.registry.alle() {
            let (record, andere) = {
                let mut r = raum.lock();
                match r.peer_entfernen(&ctx.id) {
                    Some(record) => (record, r.mitglieder()),
                    None => continue,
                }
            };
            state.registry.identitaet_freigeben(&record.steam_id, &ctx.id);
            state.broadcaster.an_verbindungen_senden(
                &andere,
                &AusgehendesEreignis::UserLeft(PeerEreignis {
                    socket_id: ctx.id,
                    client: record,
                }),
            );
        }

        if let Rolle::ServerLink {
            raum,
            api_key_id,
            verbunden_seit,
        } = ctx.rolle.clone()
        {
            let sekunden = verbunden_seit.elapsed().as_secs();
            if let Err(e) = state.schluessel.nutzung_erfassen(api_key_id, sekunden).await {
                tracing::warn!(fehler = %e, "Nutzung des API-Keys nicht gespeichert");
            }
            state
                .server_links
                .remove_if(&api_key_id, |_, link| link.verbindung == ctx.id);
            if let Some(handle) = state.registry.finden(&raum) {
                let mut r = handle.lock();
                if r.server_verbindung == Some(ctx.id) {
                    r.server_verbindung = None;
                }
            }
            tracing::info!(
                verbindung = %ctx.id,
                raum = %raum,
                sekunden,
                "Game-Server-Link getrennt"
            );
        }

        state.broadcaster.client_entfernen(&ctx.id);
        tracing::debug!(verbindung = %ctx.id, "Verbindung aufgeraeumt");
    }
}
