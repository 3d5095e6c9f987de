//! Structured Logging Setup via tracing-subscriber
//!
//! Die Werte aus der Konfigurationsdatei koennen per Umgebung
//! ueberschrieben werden:
//! - `PROXVOICE_LOG_LEVEL`: Filter-Direktive (z.B. `info` oder
//!   `proxvoice_signaling=debug,info`)
//! - `PROXVOICE_LOG_FORMAT`: `text` oder `json`

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, EnvFilter};

pub const ENV_LOG_LEVEL: &str = "PROXVOICE_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "PROXVOICE_LOG_FORMAT";

/// Ausgabeformat der Log-Zeilen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn parsen(wert: &str) -> Option<Self> {
        match wert {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Ermittelt Filter und Format: Umgebung vor Konfiguration
pub fn logging_parameter(level: &str, format: &str) -> (String, LogFormat) {
    let level = std::env::var(ENV_LOG_LEVEL).unwrap_or_else(|_| level.to_string());
    let format = std::env::var(ENV_LOG_FORMAT)
        .ok()
        .and_then(|f| LogFormat::parsen(&f))
        .or_else(|| LogFormat::parsen(format))
        .unwrap_or(LogFormat::Text);
    (level, format)
}

/// Initialisiert das globale Logging
///
/// Schlaegt fehl, wenn bereits ein Subscriber gesetzt ist. Ein
/// ungueltiger Filter faellt auf `info` zurueck.
pub fn logging_initialisieren(level: &str, format: &str) -> Result<()> {
    let (level, format) = logging_parameter(level, format);
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));

    let ergebnis = match format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => fmt().with_env_filter(filter).with_target(true).try_init(),
    };
    ergebnis.map_err(|e| anyhow!("Logging bereits initialisiert: {e}"))
}
