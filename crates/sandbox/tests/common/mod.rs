//! Shared helpers for sandbox integration tests.

#![allow(dead_code)]

use runlet_core::config::SandboxLimits;
use runlet_sandbox::{Capabilities, CompiledHandler, InvocationRequest, SandboxEngine};
use std::sync::Arc;

pub const ORIGIN: &str = "lambda:acme/hello";

pub fn engine() -> SandboxEngine {
    SandboxEngine::new(&Capabilities::platform(), &SandboxLimits::default())
        .expect("platform engine builds")
}

/// Wrap a handler body in a script that satisfies the entry contract.
pub fn script(body: &str) -> String {
    format!("fn handle_request(ctx) {{\n{body}\n}}\n\nexport const handler = Fn(\"handle_request\");\n")
}

pub fn compile(engine: &SandboxEngine, body: &str) -> Arc<CompiledHandler> {
    Arc::new(
        engine
            .compile(ORIGIN, &script(body), None)
            .expect("script compiles"),
    )
}

pub fn request(method: &str, path: &str) -> InvocationRequest {
    InvocationRequest {
        method: method.to_string(),
        path: path.to_string(),
        ..Default::default()
    }
}
