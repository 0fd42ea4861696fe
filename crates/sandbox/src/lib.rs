//! Sandboxed execution of tenant Rhai scripts.
//!
//! This crate provides:
//! - The structural entry contract every script must satisfy
//! - A restricted engine that compiles scripts into handlers and invokes them
//! - The importable module allow-list
//! - A bounded, sliding-TTL cache of compiled handlers

pub mod cache;
pub mod context;
pub mod contract;
pub mod engine;
pub mod error;
pub mod modules;
mod stack;

pub use cache::{FillTicket, HandlerCache};
pub use context::{InvocationRequest, InvocationResponse, ResponseBody};
pub use engine::{CompiledHandler, SandboxEngine};
pub use error::{CompileError, SandboxError, SandboxResult};
pub use modules::Capabilities;
