//! Script fixtures.

#![allow(dead_code)]

use runlet_core::OwnerId;
use runlet_sandbox::{InvocationRequest, ResponseBody};

pub const OWNER: OwnerId = 1;
pub const OTHER_OWNER: OwnerId = 2;
pub const SCOPE: &str = "acme";

/// Wrap a handler body in a script that satisfies the entry contract.
pub fn script(body: &str) -> String {
    format!(
        "fn handle_request(ctx) {{\n    {body}\n}}\n\nexport const handler = Fn(\"handle_request\");\n"
    )
}

/// A script that responds with a fixed text body.
pub fn replying(message: &str) -> String {
    script(&format!("ctx.send(\"{message}\");"))
}

/// A script that echoes its env as JSON.
pub fn env_echo() -> String {
    script("ctx.json(ctx.env);")
}

/// Passes the structural check but does not parse.
pub fn broken() -> String {
    script("let = ;")
}

pub fn get(path: &str) -> InvocationRequest {
    InvocationRequest {
        method: "GET".to_string(),
        path: path.to_string(),
        ..Default::default()
    }
}

pub fn text(body: &ResponseBody) -> &str {
    match body {
        ResponseBody::Text(text) => text,
        other => panic!("expected a text body, got {other:?}"),
    }
}
