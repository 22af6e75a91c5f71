//! CLI command implementations.

pub mod config;
pub mod daemon;
pub mod refresh;
pub mod usage;
