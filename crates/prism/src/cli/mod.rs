//! Command implementations.

pub mod config;
pub mod effects;
pub mod process;
