//! Raum-Zustand eines Game-Servers
//!
//! Ein Raum gehoert zu genau einem Game-Server (Code `adresse:port`) und
//! haelt die autoritative Spielerliste aus der Telemetrie, die
//! beigetretenen Voice-Clients und die raumweite Voice-Konfiguration.
//!
//! Zugriff nur ueber `Arc<Mutex<Room>>` aus der Registry; das Lock wird
//! nie ueber einen `.await` gehalten.

use std::collections::HashMap;

use proxvoice_core::{ApiKeyId, RaumCode, SteamId, VerbindungsId};
use proxvoice_protocol::{AuthoritativePlayer, ClientRecord, VoiceConfig};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Ein beigetretener Voice-Client
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedPeer {
    pub verbindung: VerbindungsId,
    pub steam_id: SteamId,
    /// Zuletzt in der Telemetrie gesehen
    pub zuletzt_auf_server: Instant,
}

#[derive(Debug)]
pub struct Room {
    pub code: RaumCode,
    pub api_key_id: ApiKeyId,
    /// Aktueller autoritativer Game-Server-Link
    pub server_verbindung: Option<VerbindungsId>,
    pub map_name: Option<String>,
    pub config: VoiceConfig,
    pub letzte_telemetrie: Instant,
    /// Zeitpunkt des letzten angenommenen Pushes (Mindestabstand)
    pub letzte_annahme: Option<Instant>,
    pub letzter_broadcast: Option<Instant>,
    pub spieler: Vec<AuthoritativePlayer>,
    pub peers: HashMap<VerbindungsId, JoinedPeer>,
    pub clients: HashMap<VerbindungsId, ClientRecord>,
    pub(crate) watchdog: Option<JoinHandle<()>>,
    /// Gesetzt sobald der Raum aus der Registry entfernt wurde
    pub geschlossen: bool,
}

impl Room {
    pub fn neu(code: RaumCode, api_key_id: ApiKeyId, jetzt: Instant) -> Self {
        Self {
            code,
            api_key_id,
            server_verbindung: None,
            map_name: None,
            config: VoiceConfig::default(),
            letzte_telemetrie: jetzt,
            letzte_annahme: None,
            letzter_broadcast: None,
            spieler: Vec::new(),
            peers: HashMap::new(),
            clients: HashMap::new(),
            watchdog: None,
            geschlossen: false,
        }
    }

    /// Fuegt einen Peer hinzu; ein vorhandener Eintrag derselben
    /// Verbindung wird vorher entfernt
    pub fn peer_hinzufuegen(
        &mut self,
        verbindung: VerbindungsId,
        steam_id: SteamId,
        is_muted: bool,
        jetzt: Instant,
    ) -> ClientRecord {
        self.peer_entfernen(&verbindung);
        let record = ClientRecord {
            steam_id: steam_id.clone(),
            is_muted,
        };
        self.peers.insert(
            verbindung,
            JoinedPeer {
                verbindung,
                steam_id,
                zuletzt_auf_server: jetzt,
            },
        );
        self.clients.insert(verbindung, record.clone());
        record
    }

    pub fn peer_entfernen(&mut self, verbindung: &VerbindungsId) -> Option<ClientRecord> {
        let peer = self.peers.remove(verbindung);
        let record = self.clients.remove(verbindung);
        match (peer, record) {
            (_, Some(record)) => Some(record),
            (Some(peer), None) => Some(ClientRecord {
                steam_id: peer.steam_id,
                is_muted: false,
            }),
            (None, None) => None,
        }
    }

    /// Alle beigetretenen Verbindungen
    pub fn mitglieder(&self) -> Vec<VerbindungsId> {
        self.peers.keys().copied().collect()
    }

    pub fn andere_mitglieder(&self, ausser: &VerbindungsId) -> Vec<VerbindungsId> {
        self.peers.keys().filter(|v| *v != ausser).copied().collect()
    }

    pub fn ist_mitglied(&self, verbindung: &VerbindungsId) -> bool {
        self.peers.contains_key(verbindung)
    }

    pub fn peer_zu_steam_id(&self, steam_id: &SteamId) -> Option<VerbindungsId> {
        self.peers
            .values()
            .find(|p| &p.steam_id == steam_id)
            .map(|p| p.verbindung)
    }

    /// Autoritativer Eintrag eines Spielers
    pub fn spieler_finden(&self, steam_id: &SteamId) -> Option<&AuthoritativePlayer> {
        self.spieler.iter().find(|p| p.steam_id == steam_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raum() -> Room {
        Room::neu(
            RaumCode::aus_adresse("10.0.0.1", "27015"),
            ApiKeyId::new(),
            Instant::now(),
        )
    }

    fn steam(id: &str) -> SteamId {
        SteamId::parse(id).unwrap()
    }

    #[tokio::test]
    async fn peer_hinzufuegen_ist_idempotent() {
        let mut r = raum();
        let v = VerbindungsId::new();
        r.peer_hinzufuegen(v, steam("1"), false, Instant::now());
        r.peer_hinzufuegen(v, steam("1"), true, Instant::now());

        assert_eq!(r.peers.len(), 1);
        assert_eq!(r.clients.len(), 1);
        assert!(r.clients[&v].is_muted);
    }

    #[tokio::test]
    async fn peer_entfernen_liefert_record() {
        let mut r = raum();
        let v = VerbindungsId::new();
        r.peer_hinzufuegen(v, steam("1"), true, Instant::now());

        let record = r.peer_entfernen(&v).unwrap();
        assert_eq!(record.steam_id, steam("1"));
        assert!(r.peer_entfernen(&v).is_none());
        assert!(r.mitglieder().is_empty());
    }

    #[tokio::test]
    async fn andere_mitglieder_ohne_absender() {
        let mut r = raum();
        let a = VerbindungsId::new();
        let b = VerbindungsId::new();
        r.peer_hinzufuegen(a, steam("1"), false, Instant::now());
        r.peer_hinzufuegen(b, steam("2"), false, Instant::now());

        assert_eq!(r.andere_mitglieder(&a), vec![b]);
        assert_eq!(r.peer_zu_steam_id(&steam("2")), Some(b));
    }
}
