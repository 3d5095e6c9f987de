//! TURN-Credentials und ICE-Server-Liste
//!
//! Fuer TURN-Server mit statischem Auth-Secret (coturn `use-auth-secret`)
//! werden zeitbegrenzte Zugangsdaten ausgestellt:
//!
//! ```text
//! expiry   = ceil(jetzt / fenster) * fenster + gueltigkeit
//! username = "{expiry}:{steamId}"
//! password = base64(HMAC-SHA1(secret, username))
//! ```
//!
//! Das Runden auf das Erneuerungsfenster sorgt dafuer, dass derselbe
//! Spieler innerhalb eines Fensters identische Zugangsdaten erhaelt; sie
//! werden bis zum Ablauf gecacht.

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use parking_lot::Mutex;
use proxvoice_core::SteamId;
use serde::{Deserialize, Serialize};
use sha1::Sha1;

use crate::error::{AuthError, AuthResult};

type HmacSha1 = Hmac<Sha1>;

const STANDARD_ERNEUERUNGSFENSTER_SEK: u64 = 3600;
const STANDARD_GUELTIGKEIT_SEK: u64 = 86_400;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Ein konfigurierter STUN/TURN-Server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerKonfig {
    pub urls: String,
    /// Statisches Auth-Secret des TURN-Servers
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub renewal_window: Option<u64>,
    #[serde(default)]
    pub credential_expiry: Option<u64>,
    #[serde(default)]
    pub default_username: Option<String>,
    #[serde(default)]
    pub default_password: Option<String>,
}

impl IceServerKonfig {
    pub fn ist_turn(&self) -> bool {
        self.urls.starts_with("turn")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IceKonfig {
    pub servers: Vec<IceServerKonfig>,
    /// Nur TURN-Server ausliefern (erzwingt Relay-Verbindungen)
    pub force_relay_only: bool,
}

// ---------------------------------------------------------------------------
// Ausgabe
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IceTyp {
    Stun,
    Turn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnCredential {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceServer {
    #[serde(rename = "type")]
    pub typ: IceTyp,
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_credential: Option<TurnCredential>,
}

#[derive(Debug, Clone)]
struct CacheEintrag {
    credential: TurnCredential,
    laeuft_ab: u64,
}

/// Stellt ICE-Server-Listen mit TURN-Zugangsdaten aus
#[derive(Debug)]
pub struct TurnAussteller {
    konfig: IceKonfig,
    /// (Server-URI, SteamId) -> letzte Zugangsdaten
    cache: Mutex<HashMap<(String, SteamId), CacheEintrag>>,
}

impl TurnAussteller {
    pub fn neu(konfig: IceKonfig) -> Self {
        Self {
            konfig,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn nur_relay(&self) -> bool {
        self.konfig.force_relay_only
    }

    /// ICE-Server fuer einen verifizierten Spieler zum Zeitpunkt `jetzt_sek`
    pub fn ice_server(&self, steam_id: &SteamId, jetzt_sek: u64) -> AuthResult<Vec<IceServer>> {
        let mut liste = Vec::with_capacity(self.konfig.servers.len());

        for server in &self.konfig.servers {
            if !server.ist_turn() {
                if !self.konfig.force_relay_only {
                    liste.push(IceServer {
                        typ: IceTyp::Stun,
                        uri: server.urls.clone(),
                        turn_credential: None,
                    });
                }
                continue;
            }

            let turn_credential = match (
                &server.secret,
                &server.default_username,
                &server.default_password,
            ) {
                (Some(secret), _, _) => {
                    Some(self.credential(server, secret, steam_id, jetzt_sek)?)
                }
                (None, Some(username), Some(password)) => Some(TurnCredential {
                    username: username.clone(),
                    password: password.clone(),
                }),
                _ => None,
            };

            liste.push(IceServer {
                typ: IceTyp::Turn,
                uri: server.urls.clone(),
                turn_credential,
            });
        }

        Ok(liste)
    }

    fn credential(
        &self,
        server: &IceServerKonfig,
        secret: &str,
        steam_id: &SteamId,
        jetzt_sek: u64,
    ) -> AuthResult<TurnCredential> {
        let fenster = server
            .renewal_window
            .unwrap_or(STANDARD_ERNEUERUNGSFENSTER_SEK)
            .max(1);
        let gueltigkeit = server.credential_expiry.unwrap_or(STANDARD_GUELTIGKEIT_SEK);
        let ablauf = jetzt_sek.div_ceil(fenster) * fenster + gueltigkeit;
        let username = format!("{ablauf}:{steam_id}");

        let schluessel = (server.urls.clone(), steam_id.clone());
        if let Some(eintrag) = self.cache.lock().get(&schluessel) {
            if eintrag.credential.username == username && eintrag.laeuft_ab > jetzt_sek {
                return Ok(eintrag.credential.clone());
            }
        }

        let credential = TurnCredential {
            password: hmac_passwort(secret, &username)?,
            username,
        };
        tracing::debug!(steam_id = %steam_id, uri = %server.urls, "TURN-Credential ausgestellt");

        self.cache.lock().insert(
            schluessel,
            CacheEintrag {
                credential: credential.clone(),
                laeuft_ab: ablauf,
            },
        );
        Ok(credential)
    }

    /// Entfernt abgelaufene Cache-Eintraege
    pub fn cleanup(&self, jetzt_sek: u64) {
        self.cache.lock().retain(|_, e| e.laeuft_ab > jetzt_sek);
    }
}

fn hmac_passwort(secret: &str, username: &str) -> AuthResult<String> {
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes())
        .map_err(|e| AuthError::intern(format!("HMAC-Schluessel ungueltig: {e}")))?;
    mac.update(username.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(secret: Option<&str>) -> IceServerKonfig {
        IceServerKonfig {
            urls: "turn:turn.example.org:3478".into(),
            secret: secret.map(str::to_string),
            renewal_window: None,
            credential_expiry: None,
            default_username: None,
            default_password: None,
        }
    }

    fn stun() -> IceServerKonfig {
        IceServerKonfig {
            urls: "stun:stun.example.org:3478".into(),
            ..turn(None)
        }
    }

    fn steam() -> SteamId {
        SteamId::parse("76561198000000001").unwrap()
    }

    #[test]
    fn hmac_credential_mit_fenster() {
        let aussteller = TurnAussteller::neu(IceKonfig {
            servers: vec![turn(Some("geheim"))],
            force_relay_only: false,
        });
        let liste = aussteller.ice_server(&steam(), 1_700_000_000).unwrap();

        assert_eq!(liste.len(), 1);
        assert_eq!(liste[0].typ, IceTyp::Turn);
        let cred = liste[0].turn_credential.as_ref().unwrap();
        assert_eq!(cred.username, "1700089200:76561198000000001");
        assert_eq!(cred.password, "XyIp2ttya+sZ0ezdPL88lrCEFNk=");
    }

    #[test]
    fn gleiches_fenster_liefert_gleiche_credentials() {
        let aussteller = TurnAussteller::neu(IceKonfig {
            servers: vec![turn(Some("geheim"))],
            force_relay_only: false,
        });
        let a = aussteller.ice_server(&steam(), 1_700_000_000).unwrap();
        let b = aussteller.ice_server(&steam(), 1_700_001_000).unwrap();
        assert_eq!(a, b);

        // naechstes Fenster -> neuer Username
        let c = aussteller.ice_server(&steam(), 1_700_003_000).unwrap();
        assert_ne!(
            a[0].turn_credential.as_ref().unwrap().username,
            c[0].turn_credential.as_ref().unwrap().username
        );
    }

    #[test]
    fn nur_relay_filtert_stun() {
        let aussteller = TurnAussteller::neu(IceKonfig {
            servers: vec![stun(), turn(Some("geheim"))],
            force_relay_only: true,
        });
        let liste = aussteller.ice_server(&steam(), 1_700_000_000).unwrap();
        assert_eq!(liste.len(), 1);
        assert_eq!(liste[0].typ, IceTyp::Turn);
    }

    #[test]
    fn statische_zugangsdaten_als_fallback() {
        let mut server = turn(None);
        server.default_username = Some("gast".into());
        server.default_password = Some("passwort".into());
        let aussteller = TurnAussteller::neu(IceKonfig {
            servers: vec![stun(), server],
            force_relay_only: false,
        });
        let liste = aussteller.ice_server(&steam(), 0).unwrap();
        assert_eq!(liste.len(), 2);
        assert_eq!(liste[0].typ, IceTyp::Stun);
        assert!(liste[0].turn_credential.is_none());
        assert_eq!(liste[1].turn_credential.as_ref().unwrap().username, "gast");
    }

    #[test]
    fn serialisierung_wie_client_erwartet() {
        let server = IceServer {
            typ: IceTyp::Stun,
            uri: "stun:x".into(),
            turn_credential: None,
        };
        let json = serde_json::to_value(&server).unwrap();
        assert_eq!(json, serde_json::json!({"type": "STUN", "uri": "stun:x"}));
    }
}
