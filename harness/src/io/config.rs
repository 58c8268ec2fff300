//! Harness configuration stored in `harness.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Default location of the config file, relative to the current directory.
pub const DEFAULT_CONFIG_PATH: &str = "harness.toml";

/// Prompt used when an invocation does not supply one.
pub const DEFAULT_PROMPT: &str = "please follow the instructions specified in instructions.md";

/// Harness configuration (TOML).
///
/// Every field is optional in the file. Command-line flags take precedence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HarnessConfig {
    /// Executable of the interactive tool, resolved through `PATH`.
    pub program: String,

    /// Prompt passed as the tool's second argument when none is given.
    pub default_prompt: String,

    /// Invocation timeout in milliseconds. No timeout when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Echo raw child output to the terminal.
    pub debug: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            program: "codebuff".to_string(),
            default_prompt: DEFAULT_PROMPT.to_string(),
            timeout_ms: None,
            debug: false,
        }
    }
}

impl HarnessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.program.trim().is_empty() {
            return Err(anyhow!("program must be non-empty"));
        }
        if self.default_prompt.trim().is_empty() {
            return Err(anyhow!("default_prompt must be non-empty"));
        }
        if self.timeout_ms == Some(0) {
            return Err(anyhow!("timeout_ms must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `HarnessConfig::default()`.
pub fn load_config(path: &Path) -> Result<HarnessConfig> {
    if !path.exists() {
        let cfg = HarnessConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: HarnessConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &HarnessConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
