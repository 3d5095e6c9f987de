//! Zustand einer einzelnen Relay-Verbindung
//!
//! State Machine:
//! ```text
//! Verbindend -> Authentifiziert -> ImRaum -> Getrennt
//! ```
//! Ein Game-Server-Link bleibt in `Verbindend` (er authentifiziert sich per
//! API-Key ueber seine `Rolle`, nicht per Session-Token).

use proxvoice_core::{ApiKeyId, RaumCode, SteamId, VerbindungsId};
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbindungsZustand {
    Verbindend,
    Authentifiziert,
    ImRaum,
    Getrennt,
}

/// Rolle einer Verbindung
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rolle {
    /// Voice-Client eines Spielers
    Client,
    /// Autoritativer Telemetrie-Link eines Game-Servers
    ServerLink {
        raum: RaumCode,
        api_key_id: ApiKeyId,
        verbunden_seit: Instant,
    },
}

/// Timer die an eine Verbindung gebunden sind
///
/// Werden beim Trennen abgebrochen; als Absicherung auch im `Drop`.
#[derive(Debug, Default)]
pub struct Watchdogs {
    pub(crate) peer: Option<JoinHandle<()>>,
    pub(crate) benachrichtigung: Option<JoinHandle<()>>,
}

impl Watchdogs {
    pub fn peer_abbrechen(&mut self) {
        if let Some(handle) = self.peer.take() {
            handle.abort();
        }
    }

    pub fn benachrichtigung_abbrechen(&mut self) {
        if let Some(handle) = self.benachrichtigung.take() {
            handle.abort();
        }
    }

    pub fn alle_abbrechen(&mut self) {
        self.peer_abbrechen();
        self.benachrichtigung_abbrechen();
    }

    /// Anzahl der laufenden Timer
    pub fn aktiv(&self) -> usize {
        [&self.peer, &self.benachrichtigung]
            .iter()
            .filter(|h| h.as_ref().is_some_and(|h| !h.is_finished()))
            .count()
    }
}

impl Drop for Watchdogs {
    fn drop(&mut self) {
        self.alle_abbrechen();
    }
}

/// Kontext einer Verbindung (gehoert dem Verbindungs-Task)
#[derive(Debug)]
pub struct VerbindungsKontext {
    pub id: VerbindungsId,
    pub zustand: VerbindungsZustand,
    pub rolle: Rolle,
    /// Version aus dem User-Agent (`CS2VoiceProximity/<version>`)
    pub client_version: Option<String>,
    /// Verifizierte Identitaet (nach gueltigem Session-Token)
    pub steam_id: Option<SteamId>,
    /// Beigetretener Raum
    pub raum: Option<RaumCode>,
    pub watchdogs: Watchdogs,
}

impl VerbindungsKontext {
    pub fn neu(id: VerbindungsId, client_version: Option<String>) -> Self {
        Self {
            id,
            zustand: VerbindungsZustand::Verbindend,
            rolle: Rolle::Client,
            client_version,
            steam_id: None,
            raum: None,
            watchdogs: Watchdogs::default(),
        }
    }

    pub fn ist_server_link(&self) -> bool {
        matches!(self.rolle, Rolle::ServerLink { .. })
    }

    pub fn ist_getrennt(&self) -> bool {
        self.zustand == VerbindungsZustand::Getrennt
    }
}
