//! Versionspruefung fuer Client und Game-Server-Plugin
//!
//! Reine Zulassungsschranke: Versionen unterhalb der konfigurierten
//! Untergrenze werden abgelehnt. Prerelease-Versionen nehmen am Vergleich
//! teil (`0.1.37-alpha.1` erfuellt `>= 0.1.37-alpha.0`).

use semver::Version;

use crate::error::{AuthError, AuthResult};

/// Produktkennung im User-Agent des Desktop-Clients
const CLIENT_KENNUNG: &str = "CS2VoiceProximity/";

pub const STANDARD_MIN_CLIENT: &str = "0.1.37-alpha.0";
pub const STANDARD_MIN_PLUGIN: &str = "0.0.27";

/// Liest die Client-Version aus dem User-Agent (`CS2VoiceProximity/<version>`)
pub fn client_version_aus_user_agent(user_agent: &str) -> Option<&str> {
    let (_, rest) = user_agent.split_once(CLIENT_KENNUNG)?;
    rest.split_whitespace().next()
}

fn version_parsen(wert: &str) -> Option<Version> {
    let wert = wert.trim();
    let wert = wert.strip_prefix('v').unwrap_or(wert);
    Version::parse(wert).ok()
}

#[derive(Debug, Clone)]
pub struct VersionsPruefer {
    min_client: Version,
    min_plugin: Version,
}

impl VersionsPruefer {
    pub fn neu(min_client: &str, min_plugin: &str) -> AuthResult<Self> {
        let parsen = |wert: &str| {
            Version::parse(wert).map_err(|e| AuthError::Mindestversion {
                wert: wert.to_string(),
                grund: e.to_string(),
            })
        };
        Ok(Self {
            min_client: parsen(min_client)?,
            min_plugin: parsen(min_plugin)?,
        })
    }

    pub fn client_pruefen(&self, version: Option<&str>) -> AuthResult<()> {
        match version.and_then(version_parsen) {
            Some(v) if v >= self.min_client => Ok(()),
            _ => Err(AuthError::ClientVeraltet(
                version.unwrap_or("<fehlt>").to_string(),
            )),
        }
    }

    pub fn plugin_pruefen(&self, version: Option<&str>) -> AuthResult<()> {
        match version.and_then(version_parsen) {
            Some(v) if v >= self.min_plugin => Ok(()),
            _ => Err(AuthError::PluginVeraltet(
                version.unwrap_or("<fehlt>").to_string(),
            )),
        }
    }
}
