//! Gemeinsamer Relay-Zustand
//!
//! Haelt alle geteilten Services und Zustands-Manager, die sicher zwischen
//! tokio-Tasks geteilt werden koennen. Jede Verbindung und jeder Watchdog
//! bekommt einen `Arc<RelayState>`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use proxvoice_auth::{KeyStore, RateLimiter, SessionVerifier, VersionsPruefer};
use proxvoice_core::{ApiKeyId, RaumCode, VerbindungsId};
use proxvoice_protocol::events::NeustartWarnung;
use proxvoice_protocol::AusgehendesEreignis;
use serde::Serialize;

use crate::broadcast::EventBroadcaster;
use crate::konfig::RelayKonfig;
use crate::registry::RaumRegistry;

/// Aktiver Game-Server-Link eines API-Keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerLink {
    pub verbindung: VerbindungsId,
    pub raum: RaumCode,
}

// ---------------------------------------------------------------------------
// Zaehler
// ---------------------------------------------------------------------------

/// Monoton steigende Relay-Zaehler (werden vom Metrics-Sampler gelesen)
#[derive(Debug, Default)]
pub struct RelayZaehler {
    pub telemetrie_angenommen: AtomicU64,
    pub telemetrie_verworfen: AtomicU64,
    pub broadcasts_gesendet: AtomicU64,
    pub broadcasts_unterdrueckt: AtomicU64,
    pub beitritte: AtomicU64,
    pub beitritte_abgelehnt: AtomicU64,
}

impl RelayZaehler {
    pub fn erhoehen(zaehler: &AtomicU64) {
        zaehler.fetch_add(1, Ordering::Relaxed);
    }
}

/// Momentaufnahme fuer Health-, Stats- und Metrics-Endpunkte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelayStatistik {
    pub verbindungen: usize,
    pub raeume: usize,
    pub peers: usize,
    pub server_links: usize,
    pub telemetrie_angenommen: u64,
    pub telemetrie_verworfen: u64,
    pub broadcasts_gesendet: u64,
    pub broadcasts_unterdrueckt: u64,
    pub beitritte: u64,
    pub beitritte_abgelehnt: u64,
}

// ---------------------------------------------------------------------------
// RelayState
// ---------------------------------------------------------------------------

/// Gemeinsamer Relay-Zustand (thread-safe, Arc-geteilt)
pub struct RelayState {
    pub konfig: RelayKonfig,
    pub registry: RaumRegistry,
    pub broadcaster: EventBroadcaster,
    pub sessions: SessionVerifier,
    pub schluessel: Arc<dyn KeyStore>,
    pub versionen: VersionsPruefer,
    pub rate_limiter: Arc<RateLimiter>,
    /// API-Key -> aktueller Game-Server-Link
    pub(crate) server_links: DashMap<ApiKeyId, ServerLink>,
    pub zaehler: RelayZaehler,
    /// Startzeitpunkt des Relays (fuer Uptime-Berechnung)
    pub start_time: Instant,
}

impl RelayState {
    pub fn neu(
        konfig: RelayKonfig,
        sessions: SessionVerifier,
        schluessel: Arc<dyn KeyStore>,
        versionen: VersionsPruefer,
        rate_limiter: Arc<RateLimiter>,
    ) -> Arc<Self> {
        let broadcaster = EventBroadcaster::mit_queue_groesse(konfig.fluechtige_queue_groesse);
        Arc::new(Self {
            registry: RaumRegistry::neu(broadcaster.clone()),
            broadcaster,
            konfig,
            sessions,
            schluessel,
            versionen,
            rate_limiter,
            server_links: DashMap::new(),
            zaehler: RelayZaehler::default(),
            start_time: Instant::now(),
        })
    }

    /// Aktueller Link eines API-Keys
    pub fn server_link(&self, api_key_id: &ApiKeyId) -> Option<ServerLink> {
        self.server_links.get(api_key_id).map(|l| l.value().clone())
    }

    /// Kuendigt allen verbundenen Clients einen Neustart an
    pub fn neustart_warnung(&self, minutes: u32) -> usize {
        let anzahl = self
            .broadcaster
            .an_alle_senden(&AusgehendesEreignis::ServerRestartWarning(NeustartWarnung {
                minutes,
            }));
        tracing::info!(minuten = minutes, empfaenger = anzahl, "Neustart-Warnung versendet");
        anzahl
    }

    pub fn statistik(&self) -> RelayStatistik {
        let lesen = |z: &AtomicU64| z.load(Ordering::Relaxed);
        RelayStatistik {
            verbindungen: self.broadcaster.client_anzahl(),
            raeume: self.registry.anzahl(),
            peers: self.registry.peer_anzahl(),
            server_links: self.server_links.len(),
            telemetrie_angenommen: lesen(&self.zaehler.telemetrie_angenommen),
            telemetrie_verworfen: lesen(&self.zaehler.telemetrie_verworfen),
            broadcasts_gesendet: lesen(&self.zaehler.broadcasts_gesendet),
            broadcasts_unterdrueckt: lesen(&self.zaehler.broadcasts_unterdrueckt),
            beitritte: lesen(&self.zaehler.beitritte),
            beitritte_abgelehnt: lesen(&self.zaehler.beitritte_abgelehnt),
        }
    }

    /// Gibt die Uptime in Sekunden zurueck
    pub fn uptime_sek(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proxvoice_auth::{MemoryKeyStore, RateLimitKonfig};

    fn zustand() -> Arc<RelayState> {
        RelayState::neu(
            RelayKonfig::default(),
            SessionVerifier::neu("geheim", "voice.example.org"),
            Arc::new(MemoryKeyStore::neu()),
            VersionsPruefer::neu("0.1.37-alpha.0", "0.0.27").unwrap(),
            RateLimiter::neu(RateLimitKonfig::default()),
        )
    }

    #[tokio::test]
    async fn neustart_warnung_erreicht_alle_verbindungen() {
        let state = zustand();
        let mut a = state.broadcaster.client_registrieren(VerbindungsId::new());
        let mut b = state.broadcaster.client_registrieren(VerbindungsId::new());

        assert_eq!(state.neustart_warnung(3), 2);
        assert!(a.zuverlaessig.try_recv().is_ok());
        assert!(b.zuverlaessig.try_recv().is_ok());
    }

    #[tokio::test]
    async fn statistik_zaehlt_verbindungen_und_raeume() {
        let state = zustand();
        let _rx = state.broadcaster.client_registrieren(VerbindungsId::new());
        state
            .registry
            .finden_oder_erstellen(&RaumCode::aus_adresse("1.2.3.4", "27015"), ApiKeyId::new());
        RelayZaehler::erhoehen(&state.zaehler.telemetrie_angenommen);

        let s = state.statistik();
        assert_eq!(s.verbindungen, 1);
        assert_eq!(s.raeume, 1);
        assert_eq!(s.peers, 0);
        assert_eq!(s.telemetrie_angenommen, 1);
    }
}
