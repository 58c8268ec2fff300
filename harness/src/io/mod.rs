//! I/O helpers for harness invocations.

pub mod config;
pub mod driver;
pub mod instructions;
