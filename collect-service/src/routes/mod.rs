pub mod intake;
pub mod metrics_passthrough;

use axum::routing::{any, post};
use axum::{middleware, Router};

use crate::app_state::AppState;
use crate::middleware::auth::{require_passthrough_auth, require_system_auth};

/// Builds the full Axum router: intake endpoints behind system-only auth,
/// the pass-through behind the combined system-or-admin auth.
pub fn build(state: AppState) -> Router {
    let intake_routes = Router::new()
        .route("/api/systems/inventory", post(intake::submit_inventory))
        .route("/api/systems/heartbeat", post(intake::heartbeat))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_system_auth));

    let passthrough_routes = Router::new()
        .route("/api/services/mimir/{*path}", any(metrics_passthrough::pass_through))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_passthrough_auth));

    Router::new()
        .merge(intake_routes)
        .merge(passthrough_routes)
        .with_state(state)
}
