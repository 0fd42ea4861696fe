//! Error types for the core domain.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// A failure raised by tenant code, either while compiling or while running.
///
/// `stack` is only populated when the caller asked for debug output, and then
/// only carries frames that belong to the tenant script.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TenantError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<Vec<String>>,
}

impl TenantError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: Vec<String>) -> Self {
        self.stack = Some(stack);
        self
    }
}

impl fmt::Display for TenantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for TenantError {}

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("name conflict: {0}")]
    NameConflict(String),

    #[error("invalid content: {0}")]
    InvalidContent(String),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("compile error: {0}")]
    CompileError(String),

    #[error("tenant runtime error: {0}")]
    TenantRuntime(TenantError),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
