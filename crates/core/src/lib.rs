//! Core domain types and shared logic for the Runlet function runtime.
//!
//! This crate defines the pieces every other crate agrees on:
//! - Scope, script name and owner identifiers
//! - The storage and cache key scheme
//! - The domain error taxonomy
//! - Application configuration

pub mod config;
pub mod error;
pub mod keys;
pub mod script;

pub use error::{Error, Result, TenantError};
pub use script::{MAX_NAME_LEN, OwnerId, Scope, ScriptId, ScriptIdentity, ScriptName};

/// Query parameter that asks for a tenant stack trace on failure.
pub const DEBUG_QUERY_PARAM: &str = "__runlet_debug";
