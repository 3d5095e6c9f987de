//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte; nur das JWT-Secret muss gesetzt werden
//! (Datei oder `PROXVOICE_JWT_SECRET`).

use anyhow::{bail, Context, Result};
use proxvoice_auth::{IceKonfig, RateLimitKonfig};
use proxvoice_signaling::RelayKonfig;
use serde::{Deserialize, Serialize};

pub const ENV_CONFIG: &str = "PROXVOICE_CONFIG";
pub const ENV_JWT_SECRET: &str = "PROXVOICE_JWT_SECRET";
pub const ENV_RESTART_SECRET: &str = "PROXVOICE_RESTART_SECRET";

pub const STANDARD_CONFIG_PFAD: &str = "config/server.toml";

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind-Adresse, Port, Domain
    pub server: ServerEinstellungen,
    pub logging: LoggingEinstellungen,
    /// Secrets, Key-Datenbank, Mindestversionen
    pub auth: AuthEinstellungen,
    pub rate_limit: RateLimitKonfig,
    /// Zeitfenster und Schwellwerte des Relays
    pub relay: RelayKonfig,
    /// STUN/TURN-Server fuer `/get-ice-servers`
    pub ice: IceKonfig,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    pub bind_adresse: String,
    pub port: u16,
    /// Oeffentliche Domain; gleichzeitig die Audience der Session-Tokens
    pub domain: String,
    /// CORS-Origins (leer = alle erlaubt)
    pub cors_origins: Vec<String>,
    /// Intervall fuer Metriken-Sampling und Cache-Aufraeumen
    pub wartung_intervall_sek: u64,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 3000,
            domain: "localhost".into(),
            cors_origins: vec![],
            wartung_intervall_sek: 15,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Filter-Direktive: "trace", "debug", "info", "warn", "error" oder
    /// modulweise (`proxvoice_signaling=debug,info`)
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Authentifizierung
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthEinstellungen {
    /// HS256-Secret der Session-Tokens
    pub jwt_secret: Option<String>,
    /// Pfad der JSON-Key-Datenbank
    pub key_datenbank: String,
    /// Secret fuer `POST /admin/restart-warning` (ohne = Endpunkt gesperrt)
    pub restart_secret: Option<String>,
    pub min_client_version: String,
    pub min_plugin_version: String,
}

impl Default for AuthEinstellungen {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            key_datenbank: "db/db.json".into(),
            restart_secret: None,
            min_client_version: "0.1.37-alpha.0".into(),
            min_plugin_version: "0.0.27".into(),
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => Self::aus_toml(&inhalt)
                .with_context(|| format!("Konfigurationsfehler in '{pfad}'")),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => {
                Err(e).with_context(|| format!("Konfigurationsdatei '{pfad}' nicht lesbar"))
            }
        }
    }

    pub fn aus_toml(inhalt: &str) -> Result<Self> {
        Ok(toml::from_str(inhalt)?)
    }

    /// Uebernimmt Secrets aus der Umgebung
    pub fn umgebung_anwenden(&mut self) {
        self.secrets_setzen(
            std::env::var(ENV_JWT_SECRET).ok(),
            std::env::var(ENV_RESTART_SECRET).ok(),
        );
    }

    fn secrets_setzen(&mut self, jwt: Option<String>, restart: Option<String>) {
        if let Some(secret) = jwt.filter(|s| !s.is_empty()) {
            self.auth.jwt_secret = Some(secret);
        }
        if let Some(secret) = restart.filter(|s| !s.is_empty()) {
            self.auth.restart_secret = Some(secret);
        }
    }

    /// Prueft die Konfiguration vor dem Start
    pub fn validieren(&self) -> Result<()> {
        match self.auth.jwt_secret.as_deref() {
            None | Some("") => bail!("JWT-Secret fehlt (auth.jwt_secret oder {ENV_JWT_SECRET})"),
            Some(_) => {}
        }
        if self.server.domain.is_empty() {
            bail!("server.domain darf nicht leer sein");
        }
        if self.relay.fluechtige_queue_groesse == 0 {
            bail!("relay.fluechtige_queue_groesse muss groesser als 0 sein");
        }
        if self.relay.watchdog_takt_ms == 0 || self.relay.benachrichtigung_takt_sek == 0 {
            bail!("Watchdog-Takte muessen groesser als 0 sein");
        }
        Ok(())
    }

    pub fn jwt_secret(&self) -> &str {
        self.auth.jwt_secret.as_deref().unwrap_or_default()
    }

    /// Gibt die vollstaendige Bind-Adresse zurueck
    pub fn bind_adresse(&self) -> String {
        format!("{}:{}", self.server.bind_adresse, self.server.port)
    }
}
