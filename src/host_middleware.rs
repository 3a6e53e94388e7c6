// host_middleware.rs
//! Rejects requests whose Host header is not in `ALLOWED_HOSTS`

use axum::{
    extract::{Extension, Request},
    http::{header::HOST, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::warn;

use crate::common::{error::ErrorResponse, AppState};

/// Host name of the request without any port, lowercased
fn request_host(request: &Request) -> Option<String> {
    let raw = request
        .headers()
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().host().map(str::to_string))?;

    let host = if let Some(rest) = raw.strip_prefix('[') {
        // IPv6 literal, e.g. [::1]:8080
        rest.split(']').next().unwrap_or_default().to_string()
    } else {
        raw.split(':').next().unwrap_or_default().to_string()
    };

    (!host.is_empty()).then(|| host.to_ascii_lowercase())
}

/// `*` allows everything, `*.example.com` allows any subdomain of example.com
pub fn host_allowed(host: &str, allowed: &[String]) -> bool {
    allowed.iter().any(|pattern| {
        let pattern = pattern.to_ascii_lowercase();
        if pattern == "*" {
            true
        } else if let Some(suffix) = pattern.strip_prefix("*.") {
            host.ends_with(&format!(".{}", suffix))
        } else {
            host == pattern
        }
    })
}

pub async fn trusted_host_middleware(
    Extension(state): Extension<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    match request_host(&request) {
        Some(host) if host_allowed(&host, &state.config.allowed_hosts) => next.run(request).await,
        host => {
            warn!(host = ?host, "Rejected request with untrusted Host header");
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "Invalid host header".to_string(),
                    code: "INVALID_HOST".to_string(),
                }),
            )
                .into_response()
        }
    }
}
