//! Script invocation endpoints.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Path, Query, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::Response;
use runlet_core::DEBUG_QUERY_PARAM;
use runlet_sandbox::{InvocationRequest, InvocationResponse, ResponseBody};
use std::collections::BTreeMap;

/// ANY /lambda/{scope}/{name}
pub async fn invoke_script(
    State(state): State<AppState>,
    Path((scope, name)): Path<(String, String)>,
    Query(query): Query<BTreeMap<String, String>>,
    req: Request,
) -> ApiResult<Response> {
    invoke(state, scope, name, "/".to_string(), query, req).await
}

/// ANY /lambda/{scope}/{name}/{*rest}
pub async fn invoke_script_path(
    State(state): State<AppState>,
    Path((scope, name, rest)): Path<(String, String, String)>,
    Query(query): Query<BTreeMap<String, String>>,
    req: Request,
) -> ApiResult<Response> {
    invoke(state, scope, name, format!("/{rest}"), query, req).await
}

fn debug_requested(query: &mut BTreeMap<String, String>) -> bool {
    query
        .remove(DEBUG_QUERY_PARAM)
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

async fn invoke(
    state: AppState,
    scope: String,
    name: String,
    path: String,
    mut query: BTreeMap<String, String>,
    req: Request,
) -> ApiResult<Response> {
    let debug = debug_requested(&mut query);
    let (parts, body) = req.into_parts();

    let headers = parts
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    let body = axum::body::to_bytes(body, state.config.server.max_body_bytes)
        .await
        .map_err(|e| ApiError::BadRequest(format!("failed to read request body: {e}")))?;

    let request = InvocationRequest {
        method: parts.method.as_str().to_string(),
        path,
        headers,
        query,
        body: String::from_utf8_lossy(&body).into_owned(),
    };

    let response = state
        .executor
        .execute(&scope, &name, request, debug)
        .await?;
    into_http_response(response)
}

fn into_http_response(response: InvocationResponse) -> ApiResult<Response> {
    let status = StatusCode::from_u16(response.status)
        .map_err(|e| ApiError::Internal(format!("handler status: {e}")))?;
    let has_content_type = response
        .headers
        .iter()
        .any(|(name, _)| name.as_str() == CONTENT_TYPE.as_str());

    let (default_type, body) = match response.body {
        ResponseBody::Empty => (None, Body::empty()),
        ResponseBody::Text(text) => (Some("text/plain; charset=utf-8"), Body::from(text)),
        ResponseBody::Json(value) => {
            let bytes = serde_json::to_vec(&value)
                .map_err(|e| ApiError::Internal(format!("handler body: {e}")))?;
            (Some("application/json"), Body::from(bytes))
        }
    };

    let mut builder = Response::builder().status(status);
    for (name, value) in &response.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(content_type) = default_type
        && !has_content_type
    {
        builder = builder.header(CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
    builder
        .body(body)
        .map_err(|e| ApiError::Internal(format!("handler response: {e}")))
}
