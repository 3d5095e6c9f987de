//! Proxvoice Relay – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet den Relay.

use anyhow::Result;
use proxvoice_observability::logging_initialisieren;
use proxvoice_server::{
    config::{ServerConfig, ENV_CONFIG, STANDARD_CONFIG_PFAD},
    Server,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config_pfad = std::env::var(ENV_CONFIG).unwrap_or_else(|_| STANDARD_CONFIG_PFAD.into());

    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let mut config = ServerConfig::laden(&config_pfad)?;
    config.umgebung_anwenden();

    logging_initialisieren(&config.logging.level, &config.logging.format)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "Proxvoice Relay wird initialisiert"
    );

    Server::neu(config).starten().await
}
