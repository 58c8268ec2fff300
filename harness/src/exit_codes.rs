//! Stable exit codes for the harness CLI.

/// The tool produced a response.
pub const OK: i32 = 0;
/// Invalid arguments or config, or an internal error.
pub const INVALID: i32 = 1;
/// The invocation failed (spawn error, unwritable workdir, no response).
pub const FAILED: i32 = 2;
/// The invocation hit its timeout.
pub const TIMEOUT: i32 = 3;
