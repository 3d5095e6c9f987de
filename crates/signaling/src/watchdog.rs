//! Watchdogs – Zeitgesteuerte Aufraeum- und Benachrichtigungs-Tasks
//!
//! - **Raum**: schliesst einen Raum ohne Telemetrie (Standard 60s)
//! - **Peer**: entfernt einen Client, der nicht mehr in der Telemetrie
//!   auftaucht (Standard 5s Kulanz)
//! - **Benachrichtigung**: meldet einem authentifizierten Client, dass er
//!   auf einem Game-Server spielt, dessen Raum er beitreten kann
//!
//! Alle Tasks laufen auf `tokio::time::interval` und beenden sich selbst,
//! sobald ihr Objekt verschwunden ist. Zusaetzlich bricht der Besitzer
//! (Raum bzw. Verbindung) sie beim Aufraeumen ab.

use std::sync::Arc;

use proxvoice_core::{RaumCode, SteamId, VerbindungsId};
use proxvoice_protocol::events::{PeerEreignis, SpielerAufServer};
use proxvoice_protocol::{AusgehendesEreignis, Ausnahme, ClientRecord};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, Interval, MissedTickBehavior};

use crate::presence;
use crate::server_state::RelayState;

fn takt(periode: Duration) -> Interval {
    let mut intervall = interval_at(Instant::now() + periode, periode);
    intervall.set_missed_tick_behavior(MissedTickBehavior::Delay);
    intervall
}

// ---------------------------------------------------------------------------
// Raum
// ---------------------------------------------------------------------------

/// Startet den Staleness-Watchdog eines Raums
pub fn raum_starten(state: Arc<RelayState>, code: RaumCode) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut intervall = takt(state.konfig.watchdog_takt());
        let timeout = state.konfig.raum_timeout();

        loop {
            intervall.tick().await;

            let Some(raum) = state.registry.finden(&code) else {
                return;
            };
            let veraltet = {
                let r = raum.lock();
                if r.geschlossen {
                    return;
                }
                r.letzte_telemetrie.elapsed() > timeout
            };

            if veraltet {
                tracing::info!(raum = %code, "Keine Telemetrie mehr – Raum wird geschlossen");
                state
                    .registry
                    .entfernen(&code, Some(Ausnahme::raum_geschlossen()));
                return;
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Peer
// ---------------------------------------------------------------------------

/// Startet den Praesenz-Watchdog eines beigetretenen Clients
pub fn peer_starten(
    state: Arc<RelayState>,
    code: RaumCode,
    verbindung: VerbindungsId,
    steam_id: SteamId,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut intervall = takt(state.konfig.watchdog_takt());
        let kulanz = state.konfig.praesenz_kulanz();

        loop {
            intervall.tick().await;

            let Some(raum) = state.registry.finden(&code) else {
                return;
            };
            let andere = {
                let mut r = raum.lock();
                let Some(peer) = r.peers.get(&verbindung) else {
                    return;
                };
                if peer.zuletzt_auf_server.elapsed() <= kulanz {
                    continue;
                }
                r.peer_entfernen(&verbindung);
                state.registry.identitaet_freigeben(&steam_id, &verbindung);
                r.mitglieder()
            };

            tracing::info!(
                verbindung = %verbindung,
                steam_id = %steam_id,
                raum = %code,
                "Spieler nicht mehr auf dem Server – Client wird getrennt"
            );
            state.broadcaster.an_verbindungen_senden(
                &andere,
                &AusgehendesEreignis::UserLeft(PeerEreignis {
                    socket_id: verbindung,
                    client: ClientRecord {
                        steam_id: steam_id.clone(),
                        is_muted: false,
                    },
                }),
            );
            state.broadcaster.an_verbindung_senden(
                &verbindung,
                AusgehendesEreignis::Exception(Ausnahme::spieler_getrennt()),
            );
            state.broadcaster.trennen(&verbindung);
            return;
        }
    })
}

// ---------------------------------------------------------------------------
// Benachrichtigung
// ---------------------------------------------------------------------------

/// Sucht einen Raum, in dessen frischer Telemetrie die Identitaet steht
pub fn raum_mit_spieler(state: &RelayState, steam_id: &SteamId) -> Option<RaumCode> {
    let frische = state.konfig.benachrichtigung_frische();
    state.registry.alle().into_iter().find_map(|raum| {
        let r = raum.lock();
        let treffer = !r.geschlossen
            && presence::ist_berechtigt(&r, steam_id)
            && r.peer_zu_steam_id(steam_id).is_none()
            && r.letzte_telemetrie.elapsed() < frische;
        if treffer {
            Some(r.code.clone())
        } else {
            None
        }
    })
}

/// Startet den `player-on-server`-Timer eines authentifizierten Clients
pub fn benachrichtigung_starten(
    state: Arc<RelayState>,
    verbindung: VerbindungsId,
    steam_id: SteamId,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut intervall = takt(state.konfig.benachrichtigung_takt());

        loop {
            intervall.tick().await;

            if !state.broadcaster.ist_registriert(&verbindung) {
                return;
            }
            if state.registry.identitaet_finden(&steam_id).is_some() {
                continue;
            }
            if let Some(room_code) = raum_mit_spieler(&state, &steam_id) {
                tracing::debug!(verbindung = %verbindung, raum = %room_code, "Spieler auf Server erkannt");
                state.broadcaster.an_verbindung_senden(
                    &verbindung,
                    AusgehendesEreignis::PlayerOnServer(SpielerAufServer { room_code }),
                );
            }
        }
    })
}
