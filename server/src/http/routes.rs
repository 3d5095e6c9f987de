//! Route-Definitionen der HTTP-Endpunkte

use axum::{
    routing::{get, post},
    Router,
};

use crate::http::{handlers, AppState};

pub fn http_router() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::status))
        .route("/get-ice-servers", get(handlers::get_ice_servers))
        .route("/admin/restart-warning", post(handlers::restart_warning))
}
