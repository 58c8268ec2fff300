//! Test-only helpers for scratch workdirs and scripted fake tools.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::core::types::InvocationRequest;
use crate::io::instructions::INSTRUCTIONS_FILE;

/// Temporary working directory for one test.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp workspace")?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Request rooted in this workspace with no timeout.
    pub fn request(&self, instructions: &str) -> InvocationRequest {
        InvocationRequest::new(instructions, self.path())
    }

    pub fn read_instructions(&self) -> Result<String> {
        let path = self.path().join(INSTRUCTIONS_FILE);
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }

    /// Write an executable `/bin/sh` script standing in for the real tool.
    #[cfg(unix)]
    pub fn write_tool(&self, name: &str, body: &str) -> Result<PathBuf> {
        use std::os::unix::fs::PermissionsExt;

        let path = self.path().join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n"))
            .with_context(|| format!("write fake tool {}", path.display()))?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .with_context(|| format!("chmod fake tool {}", path.display()))?;
        Ok(path)
    }
}

/// Quote `value` for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Shell command printing each line on stdout.
pub fn print_lines(lines: &[&str]) -> String {
    let quoted: Vec<String> = lines.iter().map(|line| shell_quote(line)).collect();
    format!("printf '%s\\n' {}", quoted.join(" "))
}
