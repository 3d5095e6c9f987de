//! API-Keys fuer Game-Server-Links
//!
//! Jeder Game-Server verbindet sich mit einem API-Key. Die Key-Datensaetze
//! liegen ausserhalb des Relays (JSON-Datei, gepflegt ueber ein
//! Admin-Werkzeug); der Relay liest sie nur und bucht die verbundene Zeit
//! als `usage` zurueck.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use proxvoice_core::ApiKeyId;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Ein API-Key-Datensatz (wie er in `db.json` gespeichert wird)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    pub id: ApiKeyId,
    pub key: String,
    /// Ausstellungszeitpunkt (Unix-Millisekunden)
    pub iat: i64,
    /// Ablaufzeitpunkt (Unix-Millisekunden)
    pub exp: i64,
    pub label: String,
    /// Summe der verbundenen Sekunden
    #[serde(default)]
    pub usage: u64,
}

impl ApiKeyRecord {
    /// Gibt `true` zurueck solange der Key nicht abgelaufen ist
    pub fn ist_aktiv(&self) -> bool {
        self.ist_aktiv_zu(Utc::now().timestamp_millis())
    }

    pub fn ist_aktiv_zu(&self, jetzt_ms: i64) -> bool {
        jetzt_ms < self.exp
    }

    /// Key fuer Logs, nur die letzten drei Zeichen sichtbar
    pub fn zensiert(&self) -> String {
        let laenge = self.key.chars().count();
        let ende: String = self.key.chars().skip(laenge.saturating_sub(3)).collect();
        format!("**************{ende}")
    }
}

/// Zugriff auf die externen Key-Datensaetze
#[async_trait]
pub trait KeyStore: Send + Sync {
    async fn finden(&self, key: &str) -> AuthResult<Option<ApiKeyRecord>>;

    /// Addiert verbundene Sekunden auf den Datensatz (no-op wenn unbekannt)
    async fn nutzung_erfassen(&self, id: ApiKeyId, sekunden: u64) -> AuthResult<()>;
}

/// Prueft einen API-Key gegen den Store
///
/// Unbekannte und abgelaufene Keys werden unterschieden.
pub async fn api_key_pruefen(store: &dyn KeyStore, key: &str) -> AuthResult<ApiKeyRecord> {
    match store.finden(key).await? {
        None => Err(AuthError::ApiKeyUnbekannt),
        Some(record) if !record.ist_aktiv() => Err(AuthError::ApiKeyAbgelaufen),
        Some(record) => Ok(record),
    }
}

// ---------------------------------------------------------------------------
// JSON-Datei
// ---------------------------------------------------------------------------

/// Key-Store auf Basis einer JSON-Datei (Array von `ApiKeyRecord`)
///
/// Die Datei wird bei jedem Zugriff neu gelesen, damit extern angelegte
/// oder widerrufene Keys ohne Neustart greifen.
#[derive(Debug)]
pub struct JsonKeyStore {
    pfad: PathBuf,
    schreib_sperre: tokio::sync::Mutex<()>,
}

impl JsonKeyStore {
    pub fn neu(pfad: impl Into<PathBuf>) -> Self {
        Self {
            pfad: pfad.into(),
            schreib_sperre: tokio::sync::Mutex::new(()),
        }
    }

    async fn lesen(&self) -> AuthResult<Vec<ApiKeyRecord>> {
        match tokio::fs::read(&self.pfad).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(pfad = %self.pfad.display(), "Key-Datenbank fehlt, keine Keys geladen");
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl KeyStore for JsonKeyStore {
    async fn finden(&self, key: &str) -> AuthResult<Option<ApiKeyRecord>> {
        Ok(self.lesen().await?.into_iter().find(|r| r.key == key))
    }

    async fn nutzung_erfassen(&self, id: ApiKeyId, sekunden: u64) -> AuthResult<()> {
        let _sperre = self.schreib_sperre.lock().await;
        let mut records = self.lesen().await?;
        let Some(record) = records.iter_mut().find(|r| r.id == id) else {
            return Ok(());
        };
        record.usage = record.usage.saturating_add(sekunden);

        let json = serde_json::to_vec_pretty(&records)?;
        if let Some(verzeichnis) = self.pfad.parent() {
            if !verzeichnis.as_os_str().is_empty() {
                tokio::fs::create_dir_all(verzeichnis).await?;
            }
        }
        tokio::fs::write(&self.pfad, json).await?;
        tracing::debug!(key_id = %id, sekunden, "Key-Nutzung erfasst");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-Memory
// ---------------------------------------------------------------------------

/// Key-Store im Speicher (Tests, lokale Entwicklung)
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    records: RwLock<Vec<ApiKeyRecord>>,
}

impl MemoryKeyStore {
    pub fn neu() -> Self {
        Self::default()
    }

    pub fn einfuegen(&self, record: ApiKeyRecord) {
        let mut records = self.records.write();
        records.retain(|r| r.id != record.id);
        records.push(record);
    }

    pub fn nutzung(&self, id: ApiKeyId) -> Option<u64> {
        self.records.read().iter().find(|r| r.id == id).map(|r| r.usage)
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn finden(&self, key: &str) -> AuthResult<Option<ApiKeyRecord>> {
        Ok(self.records.read().iter().find(|r| r.key == key).cloned())
    }

    async fn nutzung_erfassen(&self, id: ApiKeyId, sekunden: u64) -> AuthResult<()> {
        if let Some(record) = self.records.write().iter_mut().find(|r| r.id == id) {
            record.usage = record.usage.saturating_add(sekunden);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: &str, exp_offset_ms: i64) -> ApiKeyRecord {
        let jetzt = Utc::now().timestamp_millis();
        ApiKeyRecord {
            id: ApiKeyId::new(),
            key: key.to_string(),
            iat: jetzt,
            exp: jetzt + exp_offset_ms,
            label: "Testserver".into(),
            usage: 0,
        }
    }

    #[test]
    fn zensierter_key() {
        assert_eq!(record("live_abcdefXYZ", 1000).zensiert(), "**************XYZ");
        assert_eq!(record("ab", 1000).zensiert(), "**************ab");
    }

    #[tokio::test]
    async fn unbekannt_und_abgelaufen_werden_unterschieden() {
        let store = MemoryKeyStore::neu();
        store.einfuegen(record("aktiv", 60_000));
        store.einfuegen(record("alt", -1));

        assert!(api_key_pruefen(&store, "aktiv").await.is_ok());
        assert!(matches!(
            api_key_pruefen(&store, "alt").await,
            Err(AuthError::ApiKeyAbgelaufen)
        ));
        assert!(matches!(
            api_key_pruefen(&store, "gibt-es-nicht").await,
            Err(AuthError::ApiKeyUnbekannt)
        ));
    }

    #[tokio::test]
    async fn json_store_liest_und_bucht_nutzung() {
        let verzeichnis =
            std::env::temp_dir().join(format!("proxvoice-keys-{}", ApiKeyId::new().inner()));
        let pfad = verzeichnis.join("db.json");
        let r = record("server_key", 60_000);
        tokio::fs::create_dir_all(&verzeichnis).await.unwrap();
        tokio::fs::write(&pfad, serde_json::to_vec(&vec![r.clone()]).unwrap())
            .await
            .unwrap();

        let store = JsonKeyStore::neu(&pfad);
        assert_eq!(store.finden("server_key").await.unwrap(), Some(r.clone()));

        store.nutzung_erfassen(r.id, 42).await.unwrap();
        store.nutzung_erfassen(r.id, 8).await.unwrap();
        assert_eq!(store.finden("server_key").await.unwrap().unwrap().usage, 50);

        tokio::fs::remove_dir_all(&verzeichnis).await.unwrap();
    }

    #[tokio::test]
    async fn fehlende_datei_ergibt_leeren_store() {
        let store = JsonKeyStore::neu("/nicht/vorhanden/db.json");
        assert_eq!(store.finden("x").await.unwrap(), None);
    }
}
