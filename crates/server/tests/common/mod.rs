//! Common test utilities and fixtures.

pub mod scripts;
pub mod server;

#[allow(unused_imports)]
pub use scripts::*;
#[allow(unused_imports)]
pub use server::*;
