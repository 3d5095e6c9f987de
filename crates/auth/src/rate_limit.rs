//! Rate Limiter fuer Proxvoice
//!
//! Token-Bucket pro Identitaet (SteamId fuer Spielaktionen, IP fuer
//! Admin-Endpunkte) mit zwei getrennten Budgets: oeffentlich und admin.
//! Ein Budget erlaubt `punkte` Aktionen pro `dauer_sek` Sekunden.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Punkte pro Zeitfenster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitBudget {
    pub punkte: u32,
    pub dauer_sek: u64,
}

/// Konfiguration fuer den Rate Limiter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitKonfig {
    /// Spielaktionen (join-room, mute-player, update-config) pro SteamId
    pub oeffentlich: RateLimitBudget,
    /// Admin-Endpunkte pro IP
    pub admin: RateLimitBudget,
}

impl Default for RateLimitKonfig {
    fn default() -> Self {
        Self {
            oeffentlich: RateLimitBudget {
                punkte: 10,
                dauer_sek: 10,
            },
            admin: RateLimitBudget {
                punkte: 5,
                dauer_sek: 60,
            },
        }
    }
}

/// Ein Token-Bucket fuer eine einzelne Identitaet
#[derive(Debug)]
struct TokenBucket {
    /// Aktuelle Token-Anzahl (als f64 fuer Bruchteil-Auffuellung)
    token: f64,
    /// Maximale Token-Anzahl (= Burst-Limit)
    max_token: f64,
    /// Auffuellrate in Token pro Sekunde
    fuellrate: f64,
    letzter_auffuellung: Instant,
}

impl TokenBucket {
    fn neu(budget: RateLimitBudget) -> Self {
        let max = budget.punkte as f64;
        Self {
            token: max,
            max_token: max,
            fuellrate: max / budget.dauer_sek.max(1) as f64,
            letzter_auffuellung: Instant::now(),
        }
    }

    /// Versucht ein Token zu verbrauchen. Gibt `true` zurueck wenn erlaubt.
    fn verbrauchen(&mut self) -> bool {
        self.auffuellen();
        if self.token >= 1.0 {
            self.token -= 1.0;
            true
        } else {
            false
        }
    }

    /// Berechnet wie viele Sekunden bis zum naechsten verfuegbaren Token
    fn retry_after_secs(&mut self) -> u64 {
        self.auffuellen();
        let fehlend = 1.0 - self.token;
        if fehlend <= 0.0 || self.fuellrate <= 0.0 {
            return 0;
        }
        (fehlend / self.fuellrate).ceil() as u64
    }

    fn auffuellen(&mut self) {
        let jetzt = Instant::now();
        let vergangen = jetzt.duration_since(self.letzter_auffuellung).as_secs_f64();
        self.token = (self.token + vergangen * self.fuellrate).min(self.max_token);
        self.letzter_auffuellung = jetzt;
    }
}

/// Rate Limiter mit Token-Bucket-Algorithmus
///
/// Eine Ablehnung hat keine Seiteneffekte; der Aufrufer entscheidet ob
/// die Aktion still verworfen oder mit Fehler beantwortet wird.
pub struct RateLimiter {
    konfig: RateLimitKonfig,
    oeffentliche_buckets: Mutex<HashMap<String, TokenBucket>>,
    admin_buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl RateLimiter {
    pub fn neu(konfig: RateLimitKonfig) -> Arc<Self> {
        Arc::new(Self {
            konfig,
            oeffentliche_buckets: Mutex::new(HashMap::new()),
            admin_buckets: Mutex::new(HashMap::new()),
        })
    }

    fn pruefe(
        buckets: &Mutex<HashMap<String, TokenBucket>>,
        budget: RateLimitBudget,
        identitaet: &str,
    ) -> Result<(), u64> {
        let mut buckets = buckets.lock();
        let bucket = buckets
            .entry(identitaet.to_string())
            .or_insert_with(|| TokenBucket::neu(budget));
        if bucket.verbrauchen() {
            Ok(())
        } else {
            Err(bucket.retry_after_secs())
        }
    }

    /// Prueft und verbraucht ein Token aus dem oeffentlichen Budget.
    ///
    /// Gibt `Ok(())` zurueck wenn erlaubt, `Err(retry_after_secs)` sonst.
    pub fn pruefe_oeffentlich(&self, identitaet: &str) -> Result<(), u64> {
        Self::pruefe(
            &self.oeffentliche_buckets,
            self.konfig.oeffentlich,
            identitaet,
        )
    }

    /// Prueft und verbraucht ein Token aus dem Admin-Budget.
    pub fn pruefe_admin(&self, identitaet: &str) -> Result<(), u64> {
        Self::pruefe(&self.admin_buckets, self.konfig.admin, identitaet)
    }

    /// Bereinigt Buckets die seit mehr als 5 Minuten inaktiv sind (Speicher-Management).
    pub fn cleanup(&self) {
        let schwellwert = Duration::from_secs(5 * 60);
        let jetzt = Instant::now();

        let mut oeffentlich = self.oeffentliche_buckets.lock();
        oeffentlich.retain(|_, b| jetzt.duration_since(b.letzter_auffuellung) < schwellwert);

        let mut admin = self.admin_buckets.lock();
        admin.retain(|_, b| jetzt.duration_since(b.letzter_auffuellung) < schwellwert);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget(punkte: u32, dauer_sek: u64) -> RateLimitBudget {
        RateLimitBudget { punkte, dauer_sek }
    }

    #[test]
    fn token_bucket_erlaubt_anfragen_bis_limit() {
        let mut bucket = TokenBucket::neu(budget(5, 60));
        for _ in 0..5 {
            assert!(bucket.verbrauchen(), "Anfrage sollte erlaubt sein");
        }
        assert!(!bucket.verbrauchen(), "6. Anfrage sollte abgelehnt werden");
    }

    #[test]
    fn budgets_sind_getrennt() {
        let limiter = RateLimiter::neu(RateLimitKonfig {
            oeffentlich: budget(1, 60),
            admin: budget(2, 60),
        });

        assert!(limiter.pruefe_oeffentlich("7656").is_ok());
        assert!(limiter.pruefe_oeffentlich("7656").is_err());
        // gleiche Identitaet, anderes Budget
        assert!(limiter.pruefe_admin("7656").is_ok());
        assert!(limiter.pruefe_admin("7656").is_ok());
        assert!(limiter.pruefe_admin("7656").is_err());
    }

    #[test]
    fn verschiedene_identitaeten_unabhaengig() {
        let limiter = RateLimiter::neu(RateLimitKonfig {
            oeffentlich: budget(1, 60),
            admin: budget(1, 60),
        });

        assert!(limiter.pruefe_admin("192.168.1.1").is_ok());
        assert!(limiter.pruefe_admin("192.168.1.2").is_ok());
        assert!(limiter.pruefe_admin("192.168.1.1").is_err());
    }

    #[test]
    fn ablehnung_liefert_wartezeit() {
        let limiter = RateLimiter::neu(RateLimitKonfig {
            oeffentlich: budget(2, 10),
            admin: budget(1, 60),
        });
        assert!(limiter.pruefe_oeffentlich("a").is_ok());
        assert!(limiter.pruefe_oeffentlich("a").is_ok());
        let ergebnis = limiter.pruefe_oeffentlich("a");
        assert!(ergebnis.is_err());
        assert!(ergebnis.unwrap_err() > 0);
    }

    #[test]
    fn token_bucket_auffuellung_nach_zeit() {
        // 60 Punkte pro 60 Sekunden = 1/Sekunde
        let mut bucket = TokenBucket::neu(budget(60, 60));
        for _ in 0..60 {
            bucket.verbrauchen();
        }
        assert!(!bucket.verbrauchen());
        bucket.letzter_auffuellung = Instant::now() - Duration::from_secs(2);
        assert!(
            bucket.verbrauchen(),
            "Nach 2 Sekunden sollte 1 Token verfuegbar sein"
        );
    }

    #[test]
    fn cleanup_entfernt_inaktive_buckets() {
        let limiter = RateLimiter::neu(RateLimitKonfig::default());
        limiter.pruefe_oeffentlich("a").unwrap();
        limiter
            .oeffentliche_buckets
            .lock()
            .get_mut("a")
            .unwrap()
            .letzter_auffuellung = Instant::now() - Duration::from_secs(6 * 60);
        limiter.cleanup();
        assert!(limiter.oeffentliche_buckets.lock().is_empty());
    }
}
