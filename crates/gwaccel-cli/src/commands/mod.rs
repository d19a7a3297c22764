//! CLI command implementations.

pub mod common;
pub mod devices;
pub mod probe;
pub mod version;
