use axum::body::Bytes;
use axum::extract::{OriginalUri, State};
use axum::http::{HeaderMap, HeaderName, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use tracing::warn;

use crate::app_state::AppState;
use crate::errors::AppError;
use crate::middleware::auth::Caller;

/// Paths a non-admin caller is allowed to reach through the pass-through,
/// mirroring the Alertmanager API v2 surface this proxies to.
fn is_allowed(method: &Method, path: &str) -> bool {
    match path {
        "/api/v2/alerts" | "/api/v2/silences" => method == Method::GET || method == Method::POST,
        "/api/v2/status" | "/api/v1/status/buildinfo" => method == Method::GET,
        _ => false,
    }
}

/// `* /api/services/mimir/*`
///
/// Request body is fully buffered before forwarding so a retried send
/// replays it identically; `Accept-Encoding` is stripped so the upstream
/// response always comes back uncompressed and can be streamed through
/// unmodified.
pub async fn pass_through(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let downstream_path = uri
        .path()
        .strip_prefix("/api/services/mimir")
        .unwrap_or("")
        .to_string();
    let downstream_path = if downstream_path.is_empty() { "/".to_string() } else { downstream_path };

    let scope = match &caller {
        Caller::System(binding) => {
            if !is_allowed(&method, &downstream_path) {
                return Err(AppError::new(
                    StatusCode::FORBIDDEN,
                    format!("path {downstream_path} is not allow-listed"),
                ));
            }
            Some(binding.tenant_id.clone())
        }
        Caller::Admin => None,
    };

    let target = format!("{}{}", state.alertmanager_base_url, downstream_path);
    let target = match uri.query() {
        Some(query) => format!("{target}?{query}"),
        None => target,
    };

    let mut upstream_headers = reqwest::header::HeaderMap::new();
    for (name, value) in headers.iter() {
        if name == axum::http::header::ACCEPT_ENCODING || name == axum::http::header::HOST {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            reqwest::header::HeaderName::from_bytes(name.as_str().as_bytes()),
            reqwest::header::HeaderValue::from_bytes(value.as_bytes()),
        ) {
            upstream_headers.insert(name, value);
        }
    }
    if let Some(scope) = &scope {
        if let Ok(value) = reqwest::header::HeaderValue::from_str(scope) {
            upstream_headers.insert(HeaderName::from_static("scope"), value);
        }
    }

    let request = state
        .http_client
        .request(
            reqwest::Method::from_bytes(method.as_str().as_bytes()).unwrap_or(reqwest::Method::GET),
            &target,
        )
        .headers(upstream_headers)
        .body(body);

    let upstream_response = match request.send().await {
        Ok(response) => response,
        Err(err) => {
            warn!(target = %target, error = %err, "metrics pass-through upstream unreachable");
            return Err(AppError::new(StatusCode::BAD_GATEWAY, "upstream unreachable"));
        }
    };

    let status =
        StatusCode::from_u16(upstream_response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response_headers = HeaderMap::new();
    for (name, value) in upstream_response.headers().iter() {
        if let (Ok(name), Ok(value)) = (
            axum::http::HeaderName::from_bytes(name.as_str().as_bytes()),
            axum::http::HeaderValue::from_bytes(value.as_bytes()),
        ) {
            response_headers.insert(name, value);
        }
    }

    let body = match upstream_response.bytes().await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(error = %err, "failed reading upstream response body");
            return Err(AppError::new(StatusCode::BAD_GATEWAY, "upstream read failed"));
        }
    };

    Ok((status, response_headers, body).into_response())
}
