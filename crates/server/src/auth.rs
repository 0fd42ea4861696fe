//! Request identity: trace ids and the gateway-provided principal.
//!
//! Authentication happens upstream. A trusted gateway forwards the caller's
//! owner id and scope in headers; this layer only parses them.

use crate::error::ApiError;
use axum::extract::{FromRequestParts, Request};
use axum::http::HeaderMap;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use runlet_core::{OwnerId, Scope};
use tracing::Instrument;
use uuid::Uuid;

/// Header carrying the caller's owner id.
pub const OWNER_HEADER: &str = "x-runlet-owner";

/// Header carrying the caller's scope.
pub const SCOPE_HEADER: &str = "x-runlet-scope";

/// Maximum length for trace IDs.
/// Longer trace IDs are truncated to prevent log bloat and potential log injection.
const MAX_TRACE_ID_LEN: usize = 128;

/// Trace ID for request correlation.
#[derive(Clone, Debug)]
pub struct TraceId(pub String);

impl TraceId {
    /// Generate a new random trace ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a trace ID from a client-provided value, truncated and limited
    /// to printable ASCII.
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

    pub fn as_str(&self) -> &str {
        &self.0
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

fn extract_or_generate_trace_id(req: &Request) -> TraceId {
    req.headers()
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .map(TraceId::from_client)
        .unwrap_or_else(TraceId::new)
}

/// Attach a trace id to the request and run it inside a span carrying it.
pub async fn trace_middleware(mut req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(&req);
    let span = tracing::info_span!("request", trace_id = %trace_id);
    req.extensions_mut().insert(trace_id);
    next.run(req).instrument(span).await
}

/// The caller of a management endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub owner_id: OwnerId,
    pub scope: Scope,
}

impl Principal {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ApiError> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ApiError::Unauthorized(format!("missing {name} header")))
        };

        let owner_id = header(OWNER_HEADER)?
            .parse::<OwnerId>()
            .map_err(|_| ApiError::Unauthorized(format!("{OWNER_HEADER} must be an integer")))?;
        let scope = Scope::new(header(SCOPE_HEADER)?)
            .map_err(|e| ApiError::Unauthorized(format!("invalid {SCOPE_HEADER}: {e}")))?;
        Ok(Self { owner_id, scope })
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_headers(&parts.headers)
    }
}
