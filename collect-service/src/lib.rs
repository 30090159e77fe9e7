//! HTTP intake, worker pools, and metrics pass-through for the inventory
//! collection pipeline. See `collect-core` for the domain types, queue
//! substrate, persistence, diff engine, and auth gate this crate wires
//! together into a running service.

pub mod app_state;
pub mod config;
pub mod errors;
pub mod middleware;
pub mod routes;
pub mod sinks;
pub mod workers;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::workers::HealthHandle;

/// Builds the full router: the intake and pass-through routes from
/// [`routes::build`], plus process-level liveness/readiness endpoints backed
/// by the Worker Manager's aggregate health.
pub fn build_app(state: AppState, health: HealthHandle) -> Router {
    let operational = Router::new()
        .route("/ping", get(ping_handler))
        .route("/health", get(health_handler))
        .with_state(health);

    routes::build(state).merge(operational).layer(TraceLayer::new_for_http())
}

async fn ping_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "collect-service",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Reflects the Worker Manager's aggregate health: started, every worker's
/// last activity within `5 * heartbeat_interval`, and the circuit not open.
async fn health_handler(State(health): State<HealthHandle>) -> (StatusCode, Json<Value>) {
    let healthy = health.healthy().await;
    let status = if healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    (
        status,
        Json(json!({
            "status": if healthy { "healthy" } else { "unhealthy" },
            "uptime_secs": health.uptime().as_secs(),
        })),
    )
}
