//! Request and result types shared by the driver and the CLI.
//!
//! These types define the caller-facing contract. A result serializes as
//! `{"success": bool, "output": string, "error"?: {...}}`.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parameters for a single invocation of the external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationRequest {
    /// Text written to `instructions.md` before the tool starts.
    pub instructions: String,
    /// Directory the instructions are written to and the child runs in.
    pub workdir: PathBuf,
    /// Prompt passed to the tool. Falls back to the driver's default prompt.
    pub prompt: Option<String>,
    /// Give up (and kill the child) after this long without a response.
    /// `None` and zero both wait indefinitely.
    pub timeout: Option<Duration>,
    /// Echo raw child output to the host's stdout/stderr.
    pub debug: bool,
    /// Run this literal command through `sh -c` instead of the tool.
    pub test_command: Option<String>,
}

impl InvocationRequest {
    pub fn new(instructions: impl Into<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            instructions: instructions.into(),
            workdir: workdir.into(),
            prompt: None,
            timeout: None,
            debug: false,
            test_command: None,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// A zero duration means no timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_test_command(mut self, command: impl Into<String>) -> Self {
        self.test_command = Some(command.into());
        self
    }
}

/// Failure classification reported alongside an error message.
///
/// Named codes serialize as strings, process exit codes as integers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorCode {
    Named(String),
    Exit(i32),
}

impl ErrorCode {
    pub const EXECUTION_ERROR: &'static str = "EXECUTION_ERROR";
    pub const NO_OUTPUT: &'static str = "NO_OUTPUT";
    pub const TIMEOUT: &'static str = "TIMEOUT";
    pub const UNKNOWN_ERROR: &'static str = "UNKNOWN_ERROR";

    pub fn named(code: &str) -> Self {
        Self::Named(code.to_string())
    }

    pub fn is(&self, code: &str) -> bool {
        matches!(self, Self::Named(name) if name == code)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::Exit(code) => write!(f, "{code}"),
        }
    }
}

/// Error payload of a failed invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationError {
    pub message: String,
    pub code: ErrorCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Outcome of one invocation. Exactly one is produced per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationResult {
    pub success: bool,
    /// Extracted response on success; partial output on timeout; empty otherwise.
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<InvocationError>,
}

impl InvocationResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>, code: ErrorCode) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(InvocationError {
                message: message.into(),
                code,
                details: None,
            }),
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        if let Some(error) = self.error.as_mut() {
            error.details = Some(details);
        }
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn error(&self) -> Option<&InvocationError> {
        self.error.as_ref()
    }

    /// Returns true when the failure code matches `code`.
    pub fn has_code(&self, code: &str) -> bool {
        self.error.as_ref().is_some_and(|err| err.code.is(code))
    }
}

/// POSIX-style name for an I/O error, when one is known.
pub fn os_error_code(err: &io::Error) -> Option<&'static str> {
    use io::ErrorKind;

    let name = match err.kind() {
        ErrorKind::NotFound => "ENOENT",
        ErrorKind::PermissionDenied => "EACCES",
        ErrorKind::AlreadyExists => "EEXIST",
        ErrorKind::Interrupted => "EINTR",
        ErrorKind::BrokenPipe => "EPIPE",
        ErrorKind::WouldBlock => "EAGAIN",
        ErrorKind::InvalidInput => "EINVAL",
        ErrorKind::OutOfMemory => "ENOMEM",
        ErrorKind::NotADirectory => "ENOTDIR",
        ErrorKind::IsADirectory => "EISDIR",
        ErrorKind::ExecutableFileBusy => "ETXTBSY",
        ErrorKind::ArgumentListTooLong => "E2BIG",
        _ => return None,
    };
    Some(name)
}
