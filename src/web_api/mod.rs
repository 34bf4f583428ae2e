//! WebAPI - Gallery Endpoints
//!
//! ## Responsibilities
//!
//! - Session index, snapshot and thumbnail listings
//! - Printer status
//! - Static serving of the output root under `/serve/`

mod routes;

pub use routes::create_router;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::models::HealthResponse;
use crate::state::AppState;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_sec: state.started_at.elapsed().as_secs(),
        printer_status_enabled: state.printer_status.is_some(),
        live_feed_enabled: state.config.live_feed_url.is_some(),
    };

    Json(response)
}
