//! Sandbox error types.

use thiserror::Error;

/// Failure to bring up the sandbox itself (never tenant-originated).
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to read extension module {name}: {source}")]
    ModuleIo {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("extension module {name} is invalid: {reason}")]
    ModuleInvalid { name: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for sandbox setup.
pub type SandboxResult<T> = std::result::Result<T, SandboxError>;

/// Tenant source that cannot be turned into a handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct CompileError(pub String);

impl CompileError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<CompileError> for runlet_core::Error {
    fn from(err: CompileError) -> Self {
        runlet_core::Error::CompileError(err.0)
    }
}
