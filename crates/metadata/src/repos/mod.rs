//! Repository traits for metadata operations.

pub mod scripts;

pub use scripts::ScriptRepo;
