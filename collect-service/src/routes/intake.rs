use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use collect_core::domain::{InventorySubmission, QueueFamily};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::app_state::AppState;
use crate::errors::{AppError, AppResult};
use crate::middleware::auth::Caller;

/// Request envelope accepted by `submit-inventory`: the raw device payload
/// is carried under `data`, never inlined at the top level, so the envelope
/// can grow unrelated metadata later without breaking existing producers.
#[derive(Debug, Deserialize)]
pub struct SubmitInventoryRequest {
    data: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct HeartbeatResponse {
    acknowledged_at: chrono::DateTime<Utc>,
}

/// `POST /api/systems/inventory`
///
/// Validates shape and size, stamps tenant-id and capture time, and hands
/// the submission to the Inventory queue. Everything past this point — the
/// persistence, diffing, and notification — happens asynchronously.
pub async fn submit_inventory(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    headers: axum::http::HeaderMap,
    Json(body): Json<SubmitInventoryRequest>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let tenant = system_binding(&caller)?;

    if let Some(len) = content_length(&headers) {
        if len > state.config.max_request_size {
            return Err(AppError::payload_too_large(format!(
                "payload of {len} bytes exceeds limit of {limit} bytes",
                limit = state.config.max_request_size
            )));
        }
    }

    let data = body.data.ok_or_else(|| AppError::bad_request("missing `data` field"))?;
    if data.is_null() {
        return Err(AppError::bad_request("`data` must not be empty"));
    }

    if state.circuit.is_open().await {
        warn!(tenant_id = %tenant.tenant_id, "circuit open, rejecting inventory submission");
        return Err(AppError::internal("queue unavailable"));
    }

    let size = serde_json::to_vec(&data).map(|b| b.len() as u64).unwrap_or(0);
    if size >= state.config.large_payload_warn_bytes {
        warn!(tenant_id = %tenant.tenant_id, size, "large inventory payload accepted");
    }

    let submission = InventorySubmission {
        tenant_id: tenant.tenant_id.clone(),
        captured_at: Utc::now(),
        payload: data,
    };
    let payload = serde_json::to_value(&submission).map_err(|err| {
        AppError::bad_request(format!("submission could not be serialized: {err}"))
    })?;

    // Bounds how many submissions are accepted-but-not-yet-enqueued at once;
    // an exhausted semaphore means the queue substrate is already falling
    // behind, so this is reported the same way as an enqueue timeout.
    let _permit = match state.local_buffer.clone().try_acquire_owned() {
        Ok(permit) => permit,
        Err(_) => {
            warn!(tenant_id = %tenant.tenant_id, "local buffer exhausted, rejecting inventory submission");
            return Err(AppError::internal("queue unavailable"));
        }
    };

    let enqueue = state.queue.enqueue(QueueFamily::Inventory, payload);
    match tokio::time::timeout(state.config.enqueue_timeout, enqueue).await {
        Ok(Ok(_message_id)) => {
            state.circuit.record_success().await;
            Ok((StatusCode::ACCEPTED, Json(json!({ "status": "accepted" }))))
        }
        Ok(Err(err)) => {
            warn!(tenant_id = %tenant.tenant_id, error = %err, "inventory enqueue failed");
            state.circuit.record_failure().await;
            Err(AppError::internal("queue unavailable"))
        }
        Err(_) => {
            warn!(tenant_id = %tenant.tenant_id, "inventory enqueue timed out");
            state.circuit.record_failure().await;
            Err(AppError::internal("queue unavailable"))
        }
    }
}

/// `POST /api/systems/heartbeat`
///
/// The body is ignored entirely; only the authenticated identity and the
/// server's own clock matter.
pub async fn heartbeat(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> AppResult<Json<HeartbeatResponse>> {
    let tenant = system_binding(&caller)?;
    let now = Utc::now();

    state.store.upsert_heartbeat(&tenant.tenant_system_id(), now).await?;

    Ok(Json(HeartbeatResponse { acknowledged_at: now }))
}

fn system_binding(caller: &Caller) -> AppResult<&collect_core::domain::TenantBinding> {
    match caller {
        Caller::System(binding) => Ok(binding),
        Caller::Admin => Err(AppError::unauthorized("system credentials required")),
    }
}

fn content_length(headers: &axum::http::HeaderMap) -> Option<u64> {
    headers
        .get(axum::http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}
