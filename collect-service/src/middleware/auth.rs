use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use collect_core::domain::TenantBinding;

use crate::app_state::AppState;

/// Identity attached to the request by [`require_system_auth`] and
/// [`require_passthrough_auth`]. The Metrics Pass-Through is the only route
/// that accepts either variant; every other authenticated route only ever
/// sees `Caller::System`.
#[derive(Debug, Clone)]
pub enum Caller {
    System(TenantBinding),
    Admin,
}

/// Authenticates `submit-inventory` and `heartbeat`: only an edge system's
/// `(system_id, secret)` pair is accepted here, never the administrator
/// credential, since neither endpoint has a notion of tenant-scope bypass.
pub async fn require_system_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let (system_id, secret) = extract_basic(&request).ok_or(StatusCode::UNAUTHORIZED)?;

    let binding = state
        .auth
        .verify_system(&system_id, &secret)
        .await
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    request.extensions_mut().insert(Caller::System(binding));
    Ok(next.run(request).await)
}

/// Authenticates the Metrics Pass-Through: tries the system credential
/// first, then the single configured administrator credential. Either one
/// admits the request; the route handler itself enforces path/scope
/// restrictions based on which `Caller` variant it sees.
pub async fn require_passthrough_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let (id, secret) = extract_basic(&request).ok_or(StatusCode::UNAUTHORIZED)?;

    let caller = match state.auth.verify_system(&id, &secret).await {
        Ok(binding) => Caller::System(binding),
        Err(_) if state.auth.verify_admin(&id, &secret) => Caller::Admin,
        Err(_) => return Err(StatusCode::UNAUTHORIZED),
    };

    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

fn extract_basic(request: &Request) -> Option<(String, String)> {
    let header_value = request.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = header_value.strip_prefix("Basic ")?;
    let decoded = BASE64.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (id, secret) = decoded.split_once(':')?;
    Some((id.to_string(), secret.to_string()))
}
