//! Authentication middleware.
//!
//! Every file route requires a bearer token, validated against the
//! external auth service on each request. The validated identity, not
//! anything the client claims in the request body, decides which
//! namespace a request operates on.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use ferry_proto::auth::v1::ValidateTokenRequest;
use uuid::Uuid;

/// Maximum length for client-provided trace IDs. Longer values are
/// truncated to keep logs bounded.
const MAX_TRACE_ID_LEN: usize = 128;

/// Trace ID for request correlation, carried as a request extension.
#[derive(Clone, Debug)]
pub struct TraceId(pub String);

impl TraceId {
    /// Generate a new random trace ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a trace ID from a client-provided value, sanitized for log
    /// safety: character-truncated and restricted to printable ASCII.
    pub fn from_client(value: &str) -> Self {
        let sanitized: String = value
            .chars()
            .take(MAX_TRACE_ID_LEN)
            .filter(|c| c.is_ascii_graphic() || *c == ' ')
            .collect();

        if sanitized.is_empty() {
            Self::new()
        } else {
            Self(sanitized)
        }
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Extract the trace ID from the X-Trace-Id header or generate one.
fn extract_or_generate_trace_id(req: &Request) -> TraceId {
    req.headers()
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .map(TraceId::from_client)
        .unwrap_or_else(TraceId::new)
}

/// Authenticated request extension.
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    /// Identity confirmed by the auth service.
    pub user_id: String,
}

/// Extract bearer token from the Authorization header.
/// Per RFC 6750, the "Bearer" scheme is case-insensitive.
fn extract_bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            if v.len() >= 7 && v[..7].eq_ignore_ascii_case("bearer ") {
                Some(&v[7..])
            } else {
                None
            }
        })
}

/// Middleware that validates the bearer token and attaches the resolved
/// identity to the request. The validation call runs under the
/// configured timeout so a stuck auth service fails requests instead of
/// hanging them.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let trace_id = extract_or_generate_trace_id(&req);
    let trace_id_str = trace_id.0.clone();
    req.extensions_mut().insert(trace_id);

    let token = extract_bearer_token(&req)
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?
        .to_string();

    let mut auth = state.auth.clone();
    let validation = tokio::time::timeout(
        state.config.auth_timeout(),
        auth.validate_token(ValidateTokenRequest { token }),
    )
    .await
    .map_err(|_| ApiError::AuthUnavailable("token validation timed out".to_string()))?
    .map_err(|status| match status.code() {
        tonic::Code::Unavailable => {
            ApiError::AuthUnavailable(status.message().to_string())
        }
        _ => ApiError::Unauthorized(status.message().to_string()),
    })?
    .into_inner();

    if !validation.valid || validation.user_id.is_empty() {
        return Err(ApiError::Unauthorized("invalid token".to_string()));
    }

    tracing::debug!(
        user_id = %validation.user_id,
        trace_id = %trace_id_str,
        "token validated"
    );
    req.extensions_mut().insert(AuthenticatedUser {
        user_id: validation.user_id,
    });

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_id_sanitizes_client_values() {
        let id = TraceId::from_client("req-123");
        assert_eq!(id.0, "req-123");

        let id = TraceId::from_client("evil\nvalue\x07");
        assert_eq!(id.0, "evilvalue");

        // Unusable input falls back to a generated ID
        let id = TraceId::from_client("\n\x07");
        assert!(!id.0.is_empty());

        let long = "x".repeat(300);
        assert_eq!(TraceId::from_client(&long).0.len(), MAX_TRACE_ID_LEN);
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        let req = axum::http::Request::builder()
            .header(AUTHORIZATION, "BeArEr tok-1")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(extract_bearer_token(&req), Some("tok-1"));

        let req = axum::http::Request::builder()
            .header(AUTHORIZATION, "Basic dXNlcjpwdw==")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(extract_bearer_token(&req), None);
    }
}
