//! HTTP server for the Runlet function runtime.
//!
//! This crate provides:
//! - The coordinator keeping metadata, content, env and cache consistent
//! - The execute path from (scope, name) to a handler response
//! - Script management and invocation endpoints
//! - Startup checks and metrics

pub mod auth;
pub mod bootstrap;
pub mod coordinator;
pub mod error;
pub mod executor;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;

pub use auth::{Principal, TraceId};
pub use coordinator::{Coordinator, ScriptSource};
pub use error::ApiError;
pub use executor::Executor;
pub use routes::create_router;
pub use state::AppState;
