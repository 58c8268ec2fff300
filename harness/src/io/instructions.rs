//! Instructions file handed to the external tool.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// File name the tool is told to read.
pub const INSTRUCTIONS_FILE: &str = "instructions.md";

/// Write `contents` to `<workdir>/instructions.md`, replacing any previous file.
///
/// The directory is not created: a missing workdir is a caller error.
pub fn write_instructions(workdir: &Path, contents: &str) -> Result<PathBuf> {
    let path = workdir.join(INSTRUCTIONS_FILE);
    fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}
