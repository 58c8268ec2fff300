//! Harness that drives an interactive command-line tool programmatically.
//!
//! An invocation writes `instructions.md` into a working directory, launches
//! the tool with a prompt, and returns the text the tool printed between its
//! first two prompts. The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (line cleaning, prompt detection,
//!   result types). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (instructions file, process driver,
//!   config file).

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use crate::core::types::{ErrorCode, InvocationError, InvocationRequest, InvocationResult};
pub use crate::io::driver::{DriverSettings, ProcessDriver};
