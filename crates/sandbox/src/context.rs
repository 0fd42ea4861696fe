//! Per-request context handed to tenant handlers.

use parking_lot::Mutex;
use rhai::{CustomType, Dynamic, EvalAltResult, ImmutableString, Map, TypeBuilder};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Request data visible to a handler.
#[derive(Debug, Clone, Default)]
pub struct InvocationRequest {
    pub method: String,
    /// Path below the script's route; "/" when the script itself was invoked.
    pub path: String,
    /// Header names are lowercase.
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub body: String,
}

/// Body produced by a handler.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Empty,
    Text(String),
    Json(serde_json::Value),
}

/// Response assembled from the handler's calls and return value.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: ResponseBody,
}

#[derive(Debug)]
struct ResponseState {
    status: u16,
    headers: Vec<(String, String)>,
    body: Option<ResponseBody>,
}

#[derive(Debug)]
struct RequestData {
    method: ImmutableString,
    path: ImmutableString,
    headers: Map,
    query: Map,
    body: ImmutableString,
    env: Map,
}

/// The `Context` value a handler receives.
///
/// Clones share the same response state, so calls made through any copy of
/// the context contribute to one response.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request: Arc<RequestData>,
    response: Arc<Mutex<ResponseState>>,
}

fn to_map(values: BTreeMap<String, String>) -> Map {
    values
        .into_iter()
        .map(|(k, v)| (k.into(), Dynamic::from(v)))
        .collect()
}

fn runtime_error(message: String) -> Box<EvalAltResult> {
    message.into()
}

fn valid_header_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}

fn valid_header_value(value: &str) -> bool {
    value.bytes().all(|b| b == b'\t' || (b >= 0x20 && b != 0x7f))
}

impl RequestContext {
    pub fn new(request: InvocationRequest, env: Map) -> Self {
        Self {
            request: Arc::new(RequestData {
                method: request.method.into(),
                path: request.path.into(),
                headers: to_map(request.headers),
                query: to_map(request.query),
                body: request.body.into(),
                env,
            }),
            response: Arc::new(Mutex::new(ResponseState {
                status: 200,
                headers: Vec::new(),
                body: None,
            })),
        }
    }

    fn set_status(&mut self, code: i64) -> Result<(), Box<EvalAltResult>> {
        let status = u16::try_from(code)
            .ok()
            .filter(|c| (100..=599).contains(c))
            .ok_or_else(|| runtime_error(format!("invalid HTTP status code: {code}")))?;
        self.response.lock().status = status;
        Ok(())
    }

    fn set_header(
        &mut self,
        name: ImmutableString,
        value: ImmutableString,
    ) -> Result<(), Box<EvalAltResult>> {
        if !valid_header_name(&name) {
            return Err(runtime_error(format!("invalid header name: {name:?}")));
        }
        if !valid_header_value(&value) {
            return Err(runtime_error(format!("invalid value for header {name}")));
        }
        let name = name.to_ascii_lowercase();
        let mut response = self.response.lock();
        response.headers.retain(|(existing, _)| *existing != name);
        response.headers.push((name, value.to_string()));
        Ok(())
    }

    fn send(&mut self, text: ImmutableString) {
        self.response.lock().body = Some(ResponseBody::Text(text.to_string()));
    }

    fn json(&mut self, value: Dynamic) -> Result<(), Box<EvalAltResult>> {
        let value: serde_json::Value = rhai::serde::from_dynamic(&value)?;
        self.response.lock().body = Some(ResponseBody::Json(value));
        Ok(())
    }

    /// Build the final response. A non-unit return value is used as the body
    /// when the handler did not set one explicitly.
    pub fn into_response(self, returned: Dynamic) -> Result<InvocationResponse, String> {
        let mut state = self.response.lock();
        let body = match state.body.take() {
            Some(body) => body,
            None if returned.is_unit() => ResponseBody::Empty,
            None if returned.is_string() => ResponseBody::Text(returned.to_string()),
            None => ResponseBody::Json(
                rhai::serde::from_dynamic(&returned)
                    .map_err(|e| format!("handler returned a value that is not JSON: {e}"))?,
            ),
        };
        Ok(InvocationResponse {
            status: state.status,
            headers: std::mem::take(&mut state.headers),
            body,
        })
    }
}

impl CustomType for RequestContext {
    fn build(mut builder: TypeBuilder<Self>) {
        builder
            .with_name("Context")
            .with_get("method", |ctx: &mut Self| ctx.request.method.clone())
            .with_get("path", |ctx: &mut Self| ctx.request.path.clone())
            .with_get("headers", |ctx: &mut Self| ctx.request.headers.clone())
            .with_get("query", |ctx: &mut Self| ctx.request.query.clone())
            .with_get("body", |ctx: &mut Self| ctx.request.body.clone())
            .with_get("env", |ctx: &mut Self| ctx.request.env.clone())
            .with_fn("set_status", Self::set_status)
            .with_fn("set_header", Self::set_header)
            .with_fn("send", Self::send)
            .with_fn("json", Self::json);
    }
}
