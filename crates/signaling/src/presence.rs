//! Presence-Abgleich – Telemetrie gegen beigetretene Voice-Clients
//!
//! Pro Telemetrie-Push des Game-Servers:
//! 1. Pushes mit zu kleinem Abstand zum letzten angenommenen Push verwerfen
//! 2. Spielerliste ersetzen und Telemetrie-Zeitpunkt setzen
//! 3. Praesenz aller beigetretenen Spieler auffrischen, die in der Liste stehen
//! 4. Broadcast-Menge bilden: nur Spieler die im Spiel *und* im Voice-Raum sind
//! 5. Bei hoechstens einem Spieler seltener senden (Drosselung)
//! 6. Kodieren; das Versenden uebernimmt der Aufrufer (best-effort)
//!
//! Alles hier ist reine Berechnung unter dem Raum-Lock.

use proxvoice_core::{SteamId, VerbindungsId};
use proxvoice_protocol::{feed, AuthoritativePlayer};
use tokio::time::Instant;

use crate::konfig::RelayKonfig;
use crate::room::Room;

/// Ergebnis eines Telemetrie-Pushes
#[derive(Debug, Clone, PartialEq)]
pub enum PushErgebnis {
    /// Mindestabstand zum letzten angenommenen Push unterschritten
    ZuFrueh,
    Dekodierfehler,
    /// Angenommen, aber kein Broadcast (Drosselung)
    Unterdrueckt,
    Kodierfehler,
    Broadcast {
        bytes: Vec<u8>,
        empfaenger: Vec<VerbindungsId>,
        sichtbar: usize,
    },
}

/// Verarbeitet einen Telemetrie-Push fuer einen Raum
pub fn telemetrie_verarbeiten(
    raum: &mut Room,
    bytes: &[u8],
    jetzt: Instant,
    konfig: &RelayKonfig,
) -> PushErgebnis {
    if let Some(letzte) = raum.letzte_annahme {
        if jetzt.saturating_duration_since(letzte) < konfig.telemetrie_min_abstand() {
            tracing::trace!(raum = %raum.code, "Telemetrie zu frueh – verworfen");
            return PushErgebnis::ZuFrueh;
        }
    }

    let spieler = match feed::dekodieren(bytes) {
        Ok(spieler) => spieler,
        Err(e) => {
            tracing::warn!(raum = %raum.code, fehler = %e, "Telemetrie nicht dekodierbar");
            return PushErgebnis::Dekodierfehler;
        }
    };

    raum.spieler = spieler;
    raum.letzte_telemetrie = jetzt;
    raum.letzte_annahme = Some(jetzt);

    for peer in raum.peers.values_mut() {
        if raum
            .spieler
            .iter()
            .any(|p| p.steam_id == peer.steam_id.as_str())
        {
            peer.zuletzt_auf_server = jetzt;
        }
    }

    let kulanz = konfig.praesenz_kulanz();
    let sichtbar: Vec<AuthoritativePlayer> = raum
        .spieler
        .iter()
        .filter(|p| {
            raum.peers.values().any(|peer| {
                peer.steam_id.as_str() == p.steam_id
                    && jetzt.saturating_duration_since(peer.zuletzt_auf_server) <= kulanz
            })
        })
        .cloned()
        .collect();

    if sichtbar.len() <= 1 {
        if let Some(letzter) = raum.letzter_broadcast {
            if jetzt.saturating_duration_since(letzter) < konfig.broadcast_drossel() {
                return PushErgebnis::Unterdrueckt;
            }
        }
    }

    let bytes = match feed::kodieren(&sichtbar) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(raum = %raum.code, fehler = %e, "Spielerliste nicht kodierbar");
            return PushErgebnis::Kodierfehler;
        }
    };
    raum.letzter_broadcast = Some(jetzt);

    PushErgebnis::Broadcast {
        bytes,
        empfaenger: raum.mitglieder(),
        sichtbar: sichtbar.len(),
    }
}

/// Steht die Identitaet in der aktuellen autoritativen Liste des Raums?
pub fn ist_berechtigt(raum: &Room, steam_id: &SteamId) -> bool {
    raum.spieler_finden(steam_id).is_some()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proxvoice_core::{ApiKeyId, RaumCode};
    use proxvoice_protocol::{Team, Vektor3};
    use std::time::Duration;

    fn spieler(steam_id: &str) -> AuthoritativePlayer {
        AuthoritativePlayer {
            steam_id: steam_id.to_string(),
            name: format!("Spieler {steam_id}"),
            is_admin: false,
            origin: Vektor3::neu(1.0, 2.0, 3.0),
            look_at: Vektor3::neu(0.0, 1.0, 0.0),
            team: Team::Terroristen,
            is_alive: true,
            spectating_c4: false,
        }
    }

    fn push(ids: &[&str]) -> Vec<u8> {
        let liste: Vec<_> = ids.iter().map(|id| spieler(id)).collect();
        feed::kodieren(&liste).unwrap()
    }

    fn raum(start: Instant) -> Room {
        Room::neu(RaumCode::aus_adresse("10.0.0.1", "27015"), ApiKeyId::new(), start)
    }

    fn steam(id: &str) -> SteamId {
        SteamId::parse(id).unwrap()
    }

    #[tokio::test]
    async fn mindestabstand_neunzig_millisekunden() {
        let k = RelayKonfig::default();
        let t0 = Instant::now();
        let mut r = raum(t0);

        assert!(matches!(
            telemetrie_verarbeiten(&mut r, &push(&[]), t0, &k),
            PushErgebnis::Broadcast { .. }
        ));
        assert_eq!(
            telemetrie_verarbeiten(&mut r, &push(&[]), t0 + Duration::from_millis(89), &k),
            PushErgebnis::ZuFrueh
        );
        // genau 90ms werden angenommen
        assert_ne!(
            telemetrie_verarbeiten(&mut r, &push(&[]), t0 + Duration::from_millis(90), &k),
            PushErgebnis::ZuFrueh
        );
    }

    #[tokio::test]
    async fn verworfener_push_stempelt_nicht() {
        let k = RelayKonfig::default();
        let t0 = Instant::now();
        let mut r = raum(t0);
        telemetrie_verarbeiten(&mut r, &push(&["1"]), t0, &k);

        let t1 = t0 + Duration::from_millis(50);
        assert_eq!(
            telemetrie_verarbeiten(&mut r, &push(&["2"]), t1, &k),
            PushErgebnis::ZuFrueh
        );
        assert_eq!(r.letzte_telemetrie, t0);
        assert_eq!(r.spieler[0].steam_id, "1");
    }

    #[tokio::test]
    async fn kaputter_push_wird_verworfen() {
        let k = RelayKonfig::default();
        let t0 = Instant::now();
        let mut r = raum(t0);

        assert_eq!(
            telemetrie_verarbeiten(&mut r, &[0xc1], t0, &k),
            PushErgebnis::Dekodierfehler
        );
        assert!(r.letzte_annahme.is_none());
    }

    #[tokio::test]
    async fn nur_beigetretene_spieler_werden_gesendet() {
        let k = RelayKonfig::default();
        let t0 = Instant::now();
        let mut r = raum(t0);
        let a = VerbindungsId::new();
        let b = VerbindungsId::new();
        r.peer_hinzufuegen(a, steam("1"), false, t0);
        r.peer_hinzufuegen(b, steam("2"), false, t0);

        match telemetrie_verarbeiten(&mut r, &push(&["1", "2", "3"]), t0, &k) {
            PushErgebnis::Broadcast {
                bytes,
                empfaenger,
                sichtbar,
            } => {
                assert_eq!(sichtbar, 2);
                let ids: Vec<_> = feed::dekodieren(&bytes)
                    .unwrap()
                    .into_iter()
                    .map(|p| p.steam_id)
                    .collect();
                assert_eq!(ids, vec!["1", "2"]);
                assert_eq!(empfaenger.len(), 2);
            }
            anderes => panic!("Unerwartet: {anderes:?}"),
        }
    }

    #[tokio::test]
    async fn praesenz_wird_aufgefrischt() {
        let k = RelayKonfig::default();
        let t0 = Instant::now();
        let mut r = raum(t0);
        let a = VerbindungsId::new();
        let b = VerbindungsId::new();
        r.peer_hinzufuegen(a, steam("1"), false, t0);
        r.peer_hinzufuegen(b, steam("2"), false, t0);

        let t1 = t0 + Duration::from_secs(2);
        telemetrie_verarbeiten(&mut r, &push(&["1"]), t1, &k);

        assert_eq!(r.peers[&a].zuletzt_auf_server, t1);
        assert_eq!(r.peers[&b].zuletzt_auf_server, t0);
    }

    #[tokio::test]
    async fn drosselung_bei_einem_spieler() {
        let k = RelayKonfig::default();
        let t0 = Instant::now();
        let mut r = raum(t0);
        r.peer_hinzufuegen(VerbindungsId::new(), steam("1"), false, t0);

        assert!(matches!(
            telemetrie_verarbeiten(&mut r, &push(&["1"]), t0, &k),
            PushErgebnis::Broadcast { .. }
        ));
        assert_eq!(
            telemetrie_verarbeiten(&mut r, &push(&["1"]), t0 + Duration::from_millis(500), &k),
            PushErgebnis::Unterdrueckt
        );
        // unterdrueckter Push zaehlt als angenommen
        assert_eq!(r.letzte_annahme, Some(t0 + Duration::from_millis(500)));
        assert!(matches!(
            telemetrie_verarbeiten(&mut r, &push(&["1"]), t0 + Duration::from_millis(900), &k),
            PushErgebnis::Broadcast { .. }
        ));
    }

    #[tokio::test]
    async fn keine_drosselung_bei_mehreren_spielern() {
        let k = RelayKonfig::default();
        let t0 = Instant::now();
        let mut r = raum(t0);
        r.peer_hinzufuegen(VerbindungsId::new(), steam("1"), false, t0);
        r.peer_hinzufuegen(VerbindungsId::new(), steam("2"), false, t0);

        telemetrie_verarbeiten(&mut r, &push(&["1", "2"]), t0, &k);
        assert!(matches!(
            telemetrie_verarbeiten(&mut r, &push(&["1", "2"]), t0 + Duration::from_millis(100), &k),
            PushErgebnis::Broadcast { .. }
        ));
    }

    #[tokio::test]
    async fn berechtigung_folgt_der_spielerliste() {
        let k = RelayKonfig::default();
        let t0 = Instant::now();
        let mut r = raum(t0);
        assert!(!ist_berechtigt(&r, &steam("1")));

        telemetrie_verarbeiten(&mut r, &push(&["1"]), t0, &k);
        assert!(ist_berechtigt(&r, &steam("1")));
        assert!(!ist_berechtigt(&r, &steam("2")));
    }
}
