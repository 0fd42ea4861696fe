//! HTTP request handlers.

pub mod exec;
pub mod health;
pub mod scripts;

pub use exec::*;
pub use health::*;
pub use scripts::*;
