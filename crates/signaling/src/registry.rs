//! Raum-Registry – Verwaltet alle aktiven Raeume
//!
//! Neben der Raum-Map fuehrt die Registry einen Identitaets-Index
//! `SteamId -> (Raum, Verbindung)`, der die Regel "ein Geraet pro
//! Identitaet" ohne Scan ueber alle Raeume durchsetzt.
//!
//! Lock-Reihenfolge: erst das Raum-Mutex, dann der Index. Ein DashMap-Guard
//! wird nie gehalten waehrend ein Raum gesperrt wird.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use proxvoice_core::{ApiKeyId, RaumCode, SteamId, VerbindungsId};
use proxvoice_protocol::{AusgehendesEreignis, Ausnahme};
use tokio::time::Instant;

use crate::broadcast::EventBroadcaster;
use crate::room::Room;

/// Geteilter Handle auf einen Raum
pub type RaumHandle = Arc<Mutex<Room>>;

pub struct RaumRegistry {
    raeume: DashMap<RaumCode, RaumHandle>,
    identitaeten: DashMap<SteamId, (RaumCode, VerbindungsId)>,
    broadcaster: EventBroadcaster,
}

impl RaumRegistry {
    pub fn neu(broadcaster: EventBroadcaster) -> Self {
        Self {
            raeume: DashMap::new(),
            identitaeten: DashMap::new(),
            broadcaster,
        }
    }

    /// Liefert den Raum zum Code oder legt ihn an
    ///
    /// Der zweite Wert ist `true` wenn der Raum neu erstellt wurde.
    pub fn finden_oder_erstellen(&self, code: &RaumCode, api_key_id: ApiKeyId) -> (RaumHandle, bool) {
        match self.raeume.entry(code.clone()) {
            Entry::Occupied(eintrag) => (eintrag.get().clone(), false),
            Entry::Vacant(eintrag) => {
                let raum = Arc::new(Mutex::new(Room::neu(
                    code.clone(),
                    api_key_id,
                    Instant::now(),
                )));
                eintrag.insert(raum.clone());
                tracing::info!(raum = %code, "Raum erstellt");
                (raum, true)
            }
        }
    }

    pub fn finden(&self, code: &RaumCode) -> Option<RaumHandle> {
        self.raeume.get(code).map(|r| r.value().clone())
    }

    /// Entfernt einen Raum und trennt alle Mitglieder
    ///
    /// Mit `grund` erhalten die Mitglieder vorher ein `exception`-Ereignis.
    /// Der Game-Server-Link wird ebenfalls getrennt. Idempotent: ein
    /// zweiter Aufruf findet den Raum nicht mehr und gibt `false` zurueck.
    pub fn entfernen(&self, code: &RaumCode, grund: Option<Ausnahme>) -> bool {
        let Some((_, raum)) = self.raeume.remove(code) else {
            return false;
        };

        let (mitglieder, link, watchdog) = {
            let mut r = raum.lock();
            r.geschlossen = true;
            for peer in r.peers.values() {
                self.identitaeten
                    .remove_if(&peer.steam_id, |_, (c, v)| c == code && *v == peer.verbindung);
            }
            let mitglieder = r.mitglieder();
            r.peers.clear();
            r.clients.clear();
            r.spieler.clear();
            (mitglieder, r.server_verbindung.take(), r.watchdog.take())
        };

        if let Some(ausnahme) = grund {
            self.broadcaster
                .an_verbindungen_senden(&mitglieder, &AusgehendesEreignis::Exception(ausnahme));
        }
        for verbindung in mitglieder.iter().chain(link.iter()) {
            self.broadcaster.trennen(verbindung);
        }
        if let Some(handle) = watchdog {
            handle.abort();
        }

        tracing::info!(raum = %code, mitglieder = mitglieder.len(), "Raum entfernt");
        true
    }

    /// Alle Raum-Handles (Snapshot, ohne gehaltene Guards)
    pub fn alle(&self) -> Vec<RaumHandle> {
        self.raeume.iter().map(|e| e.value().clone()).collect()
    }

    pub fn anzahl(&self) -> usize {
        self.raeume.len()
    }

    /// Summe der beigetretenen Voice-Clients ueber alle Raeume
    pub fn peer_anzahl(&self) -> usize {
        self.alle().iter().map(|r| r.lock().peers.len()).sum()
    }

    // -----------------------------------------------------------------------
    // Identitaets-Index
    // -----------------------------------------------------------------------

    pub fn identitaet_finden(&self, steam_id: &SteamId) -> Option<(RaumCode, VerbindungsId)> {
        self.identitaeten.get(steam_id).map(|e| e.value().clone())
    }

    /// Traegt eine Identitaet ein, sofern sie nicht bereits von einer
    /// anderen Verbindung belegt ist
    ///
    /// Muss unter dem Lock des Zielraums aufgerufen werden.
    pub fn identitaet_reservieren(
        &self,
        steam_id: &SteamId,
        code: &RaumCode,
        verbindung: VerbindungsId,
    ) -> bool {
        match self.identitaeten.entry(steam_id.clone()) {
            Entry::Occupied(mut eintrag) => {
                if eintrag.get().1 != verbindung {
                    return false;
                }
                eintrag.insert((code.clone(), verbindung));
                true
            }
            Entry::Vacant(eintrag) => {
                eintrag.insert((code.clone(), verbindung));
                true
            }
        }
    }

    /// Entfernt den Index-Eintrag nur wenn er auf diese Verbindung zeigt
    pub fn identitaet_freigeben(&self, steam_id: &SteamId, verbindung: &VerbindungsId) -> bool {
        self.identitaeten
            .remove_if(steam_id, |_, (_, v)| v == verbindung)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::Ausgehend;
    use proxvoice_protocol::ExceptionCode;

    fn code() -> RaumCode {
        RaumCode::aus_adresse("10.0.0.1", "27015")
    }

    fn steam(id: &str) -> SteamId {
        SteamId::parse(id).unwrap()
    }

    #[tokio::test]
    async fn finden_oder_erstellen_liefert_denselben_raum() {
        let registry = RaumRegistry::neu(EventBroadcaster::neu());
        let (a, neu_a) = registry.finden_oder_erstellen(&code(), ApiKeyId::new());
        let (b, neu_b) = registry.finden_oder_erstellen(&code(), ApiKeyId::new());

        assert!(neu_a);
        assert!(!neu_b);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.anzahl(), 1);
    }

    #[tokio::test]
    async fn entfernen_benachrichtigt_und_trennt_mitglieder() {
        let broadcaster = EventBroadcaster::neu();
        let registry = RaumRegistry::neu(broadcaster.clone());
        let (raum, _) = registry.finden_oder_erstellen(&code(), ApiKeyId::new());

        let peer = VerbindungsId::new();
        let link = VerbindungsId::new();
        let mut rx_peer = broadcaster.client_registrieren(peer);
        let mut rx_link = broadcaster.client_registrieren(link);
        {
            let mut r = raum.lock();
            r.server_verbindung = Some(link);
            r.peer_hinzufuegen(peer, steam("1"), false, Instant::now());
            assert!(registry.identitaet_reservieren(&steam("1"), &code(), peer));
        }

        assert!(registry.entfernen(&code(), Some(Ausnahme::raum_geschlossen())));

        match rx_peer.zuverlaessig.try_recv().unwrap() {
            Ausgehend::Ereignis(AusgehendesEreignis::Exception(a)) => {
                assert_eq!(a.code, ExceptionCode::RoomShutdown)
            }
            anderes => panic!("Unerwartet: {anderes:?}"),
        }
        assert_eq!(rx_peer.zuverlaessig.try_recv().unwrap(), Ausgehend::Trennen);
        assert_eq!(rx_link.zuverlaessig.try_recv().unwrap(), Ausgehend::Trennen);

        assert!(registry.finden(&code()).is_none());
        assert!(registry.identitaet_finden(&steam("1")).is_none());
        assert!(raum.lock().geschlossen);
    }

    #[tokio::test]
    async fn entfernen_ist_idempotent() {
        let registry = RaumRegistry::neu(EventBroadcaster::neu());
        registry.finden_oder_erstellen(&code(), ApiKeyId::new());

        assert!(registry.entfernen(&code(), None));
        assert!(!registry.entfernen(&code(), None));
        assert_eq!(registry.anzahl(), 0);
    }

    #[tokio::test]
    async fn identitaet_nur_einmal_reservierbar() {
        let registry = RaumRegistry::neu(EventBroadcaster::neu());
        let a = VerbindungsId::new();
        let b = VerbindungsId::new();

        assert!(registry.identitaet_reservieren(&steam("1"), &code(), a));
        // gleiche Verbindung darf erneut reservieren
        assert!(registry.identitaet_reservieren(&steam("1"), &code(), a));
        assert!(!registry.identitaet_reservieren(&steam("1"), &code(), b));

        // fremde Verbindung kann den Eintrag nicht freigeben
        assert!(!registry.identitaet_freigeben(&steam("1"), &b));
        assert!(registry.identitaet_freigeben(&steam("1"), &a));
        assert!(registry.identitaet_reservieren(&steam("1"), &code(), b));
    }
}
