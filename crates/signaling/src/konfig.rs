//! Laufzeit-Konfiguration des Relays
//!
//! Wird aus dem `[relay]`-Abschnitt der Server-Konfiguration geladen.
//! Alle Zeiten sind in Millisekunden bzw. Sekunden angegeben.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::broadcast::FLUECHTIGE_QUEUE_GROESSE;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayKonfig {
    /// Mindestabstand zwischen zwei angenommenen Telemetrie-Pushes
    pub telemetrie_min_abstand_ms: u64,
    /// Drosselung fuer Raeume mit hoechstens einem sichtbaren Spieler
    pub broadcast_drossel_ms: u64,
    /// Kulanzfenster fuer die Praesenz eines beigetretenen Spielers
    pub praesenz_kulanz_sek: u64,
    /// Raum wird geschlossen wenn so lange keine Telemetrie eintrifft
    pub raum_timeout_sek: u64,
    pub watchdog_takt_ms: u64,
    pub benachrichtigung_takt_sek: u64,
    /// Nur Raeume mit juengerer Telemetrie loesen `player-on-server` aus
    pub benachrichtigung_frische_sek: u64,
    /// Beitritt nur fuer Spieler die in der Telemetrie des Raums auftauchen
    pub beitritt_nur_auf_server: bool,
    pub fluechtige_queue_groesse: usize,
}

impl Default for RelayKonfig {
    fn default() -> Self {
        Self {
            telemetrie_min_abstand_ms: 90,
            broadcast_drossel_ms: 900,
            praesenz_kulanz_sek: 5,
            raum_timeout_sek: 60,
            watchdog_takt_ms: 1000,
            benachrichtigung_takt_sek: 5,
            benachrichtigung_frische_sek: 3,
            beitritt_nur_auf_server: true,
            fluechtige_queue_groesse: FLUECHTIGE_QUEUE_GROESSE,
        }
    }
}

impl RelayKonfig {
    pub fn telemetrie_min_abstand(&self) -> Duration {
        Duration::from_millis(self.telemetrie_min_abstand_ms)
    }

    pub fn broadcast_drossel(&self) -> Duration {
        Duration::from_millis(self.broadcast_drossel_ms)
    }

    pub fn praesenz_kulanz(&self) -> Duration {
        Duration::from_secs(self.praesenz_kulanz_sek)
    }

    pub fn raum_timeout(&self) -> Duration {
        Duration::from_secs(self.raum_timeout_sek)
    }

    pub fn watchdog_takt(&self) -> Duration {
        Duration::from_millis(self.watchdog_takt_ms.max(1))
    }

    pub fn benachrichtigung_takt(&self) -> Duration {
        Duration::from_secs(self.benachrichtigung_takt_sek.max(1))
    }

    pub fn benachrichtigung_frische(&self) -> Duration {
        Duration::from_secs(self.benachrichtigung_frische_sek)
    }
}
