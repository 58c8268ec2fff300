//! Runs the interactive tool once and scrapes its response.
//!
//! Stdout and stderr are drained by reader threads that forward chunks over a
//! single channel. The driver loop is the only consumer, so the first terminal
//! event (response found, streams closed, spawn error, or deadline) decides the
//! result and everything after it is dropped with the channel. The child is
//! owned by a [`ChildGuard`] that kills and reaps it on every exit path.

use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::scan::extract_response;
use crate::core::types::{ErrorCode, InvocationRequest, InvocationResult, os_error_code};
use crate::io::config::{DEFAULT_PROMPT, HarnessConfig};
use crate::io::instructions::write_instructions;

/// Environment overrides that keep the tool's rendering plain and scrapeable.
pub const CHILD_ENV: &[(&str, &str)] = &[
    ("NO_COLOR", "1"),
    // Tells the tool not to redraw lines in place.
    ("NO_CLEAR_LINE", "1"),
    ("FORCE_COLOR", "0"),
    ("TERM", "dumb"),
    ("COLUMNS", "80"),
    ("LINES", "24"),
];

pub const INCOMPLETE_OUTPUT_MESSAGE: &str =
    "Process completed without finding complete output between prompts";

const READ_CHUNK_BYTES: usize = 8192;

/// Which tool to launch and how to prompt it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverSettings {
    pub program: String,
    pub default_prompt: String,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            program: "codebuff".to_string(),
            default_prompt: DEFAULT_PROMPT.to_string(),
        }
    }
}

impl From<&HarnessConfig> for DriverSettings {
    fn from(cfg: &HarnessConfig) -> Self {
        Self {
            program: cfg.program.clone(),
            default_prompt: cfg.default_prompt.clone(),
        }
    }
}

/// Launches the tool for one invocation at a time. Holds no per-run state.
#[derive(Debug, Clone, Default)]
pub struct ProcessDriver {
    settings: DriverSettings,
}

impl ProcessDriver {
    pub fn new(settings: DriverSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &DriverSettings {
        &self.settings
    }

    /// Run one invocation to completion.
    ///
    /// Operational failures (unwritable workdir, missing executable, timeout,
    /// exit without a response) come back as a failed [`InvocationResult`].
    /// `Err` means a broken internal invariant.
    #[instrument(skip_all, fields(workdir = %request.workdir.display(), timeout_ms = ?request.timeout.map(|t| t.as_millis())))]
    pub fn run(&self, request: &InvocationRequest) -> Result<InvocationResult> {
        if let Err(err) = write_instructions(&request.workdir, &request.instructions) {
            error!(err = %format!("{err:#}"), "failed to write instructions");
            return Ok(InvocationResult::failure(
                format!("{err:#}"),
                ErrorCode::named(ErrorCode::EXECUTION_ERROR),
            )
            .with_details(json!(format!("{err:?}"))));
        }

        let program = self.program_for(request);
        info!(program, "starting tool");
        if request.debug {
            eprintln!("starting {} {}", program, request.workdir.display());
        }

        let child = match self.command(request).spawn() {
            Ok(child) => child,
            Err(err) => {
                error!(err = %err, program, "failed to spawn tool");
                return Ok(os_failure(program, &err));
            }
        };
        let deadline = request
            .timeout
            .filter(|timeout| !timeout.is_zero())
            .map(|timeout| Instant::now() + timeout);
        let mut guard = ChildGuard::new(child);
        let events = guard.pump_output()?;

        let mut output = OutputBuffer::default();
        let mut open_streams = 2;
        while open_streams > 0 {
            match next_event(&events, deadline) {
                Next::Event(StreamEvent::Chunk(stream, bytes)) => {
                    if request.debug {
                        echo(stream, &bytes);
                    }
                    output.push(&bytes);
                    debug!(?stream, bytes = bytes.len(), total = output.len(), "chunk received");
                    if let Some(response) = extract_response(&output.text()) {
                        debug!(bytes = response.len(), "response found between prompts");
                        return Ok(InvocationResult::success(response));
                    }
                }
                Next::Event(StreamEvent::Closed(stream)) => {
                    debug!(?stream, "stream closed");
                    open_streams -= 1;
                }
                Next::Disconnected => break,
                Next::TimedOut => return Ok(timeout_failure(request, &output)),
            }
        }

        let status = match deadline {
            Some(deadline) => {
                match guard.wait_timeout(deadline.saturating_duration_since(Instant::now())) {
                    Ok(Some(status)) => status,
                    Ok(None) => return Ok(timeout_failure(request, &output)),
                    Err(err) => return Ok(os_failure(program, &err)),
                }
            }
            None => match guard.wait() {
                Ok(status) => status,
                Err(err) => return Ok(os_failure(program, &err)),
            },
        };

        debug!(exit_code = ?status.code(), "tool exited without a complete response");
        let code = status
            .code()
            .map_or_else(|| ErrorCode::named(ErrorCode::NO_OUTPUT), ErrorCode::Exit);
        Ok(InvocationResult::failure(INCOMPLETE_OUTPUT_MESSAGE, code))
    }

    fn program_for<'a>(&'a self, request: &InvocationRequest) -> &'a str {
        if request.test_command.is_some() {
            "sh"
        } else {
            &self.settings.program
        }
    }

    fn command(&self, request: &InvocationRequest) -> Command {
        let mut cmd = match &request.test_command {
            Some(script) => {
                let mut cmd = Command::new("sh");
                cmd.arg("-c").arg(script);
                cmd
            }
            None => {
                let prompt = request
                    .prompt
                    .as_deref()
                    .unwrap_or(&self.settings.default_prompt);
                let mut cmd = Command::new(&self.settings.program);
                cmd.arg(&request.workdir).arg(prompt);
                cmd
            }
        };
        cmd.current_dir(&request.workdir)
            .envs(CHILD_ENV.iter().copied())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

enum StreamEvent {
    Chunk(Stream, Vec<u8>),
    Closed(Stream),
}

enum Next {
    Event(StreamEvent),
    TimedOut,
    Disconnected,
}

fn next_event(events: &Receiver<StreamEvent>, deadline: Option<Instant>) -> Next {
    let received = match deadline {
        Some(deadline) => events.recv_timeout(deadline.saturating_duration_since(Instant::now())),
        None => events.recv().map_err(|_| RecvTimeoutError::Disconnected),
    };
    match received {
        Ok(event) => Next::Event(event),
        Err(RecvTimeoutError::Timeout) => Next::TimedOut,
        Err(RecvTimeoutError::Disconnected) => Next::Disconnected,
    }
}

/// Append-only output of one invocation.
#[derive(Debug, Default)]
struct OutputBuffer {
    bytes: Vec<u8>,
}

impl OutputBuffer {
    fn push(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Owns the child process; kills and reaps it when dropped while still running.
struct ChildGuard {
    child: Child,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        Self { child }
    }

    /// Start one reader thread per output stream, both feeding one channel.
    fn pump_output(&mut self) -> Result<Receiver<StreamEvent>> {
        let stdout: ChildStdout = self
            .child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("stdout was not piped"))?;
        let stderr: ChildStderr = self
            .child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("stderr was not piped"))?;

        let (tx, rx) = mpsc::channel();
        let stderr_tx = tx.clone();
        thread::spawn(move || forward_stream(stdout, Stream::Stdout, tx));
        thread::spawn(move || forward_stream(stderr, Stream::Stderr, stderr_tx));
        Ok(rx)
    }

    fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait()
    }

    fn wait_timeout(&mut self, timeout: Duration) -> io::Result<Option<ExitStatus>> {
        self.child.wait_timeout(timeout)
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        match self.child.try_wait() {
            Ok(Some(_)) => {}
            Ok(None) => {
                debug!(pid = self.child.id(), "killing tool");
                if let Err(err) = self.child.kill() {
                    warn!(err = %err, "failed to kill tool");
                    return;
                }
                if let Err(err) = self.child.wait() {
                    warn!(err = %err, "failed to reap tool");
                }
            }
            Err(err) => warn!(err = %err, "failed to poll tool status"),
        }
    }
}

/// Forward chunks until EOF. Stops quietly once the driver has stopped listening.
fn forward_stream<R: Read>(mut reader: R, stream: Stream, tx: Sender<StreamEvent>) {
    let mut chunk = [0u8; READ_CHUNK_BYTES];
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(StreamEvent::Chunk(stream, chunk[..n].to_vec())).is_err() {
                    return;
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                warn!(err = %err, ?stream, "read tool output");
                break;
            }
        }
    }
    let _ = tx.send(StreamEvent::Closed(stream));
}

fn echo(stream: Stream, bytes: &[u8]) {
    let written = match stream {
        Stream::Stdout => {
            let mut out = io::stdout().lock();
            out.write_all(bytes).and_then(|()| out.flush())
        }
        Stream::Stderr => {
            let mut err = io::stderr().lock();
            err.write_all(bytes).and_then(|()| err.flush())
        }
    };
    if let Err(err) = written {
        warn!(err = %err, ?stream, "failed to echo tool output");
    }
}

fn timeout_failure(request: &InvocationRequest, output: &OutputBuffer) -> InvocationResult {
    let millis = request.timeout.map_or(0, |timeout| timeout.as_millis());
    warn!(timeout_ms = millis, "tool timed out, killing");
    InvocationResult::failure(
        format!("Timeout after {millis}ms"),
        ErrorCode::named(ErrorCode::TIMEOUT),
    )
    .with_output(output.text().trim())
}

fn os_failure(program: &str, err: &io::Error) -> InvocationResult {
    let message = if err.kind() == io::ErrorKind::NotFound {
        not_found_message(program)
    } else {
        err.to_string()
    };
    let code = os_error_code(err).unwrap_or(ErrorCode::UNKNOWN_ERROR);
    InvocationResult::failure(message, ErrorCode::named(code)).with_details(json!({
        "kind": format!("{:?}", err.kind()),
        "os_error": err.raw_os_error(),
        "message": err.to_string(),
    }))
}

/// Human-readable message for a tool that is not on `PATH`.
pub fn not_found_message(program: &str) -> String {
    let name = Path::new(program)
        .file_name()
        .map_or_else(|| program.to_string(), |name| name.to_string_lossy().into_owned());
    format!(
        "Could not find the '{name}' command. Please ensure it is installed and in your system PATH."
    )
}
