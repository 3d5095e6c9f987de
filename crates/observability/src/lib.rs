//! # proxvoice-observability
//!
//! Observability-Crate fuer den Proxvoice-Relay:
//! - Prometheus-kompatible Metriken (`/metrics`)
//! - Health-Check-Endpunkt (`/health`)
//! - Structured Logging (Text oder JSON) via tracing-subscriber
//! - Request-Timing Middleware

pub mod health;
pub mod logging;
pub mod metrics;
pub mod middleware;

pub use health::{health_router, HealthResponse, HealthState, HealthStatus};
pub use logging::{logging_initialisieren, LogFormat};
pub use metrics::{
    metrics_router, sampler_starten, MesswertQuelle, ProxvoiceMetriken, RelayMesswerte,
};
pub use middleware::{metriken_middleware, request_timing_layer};
