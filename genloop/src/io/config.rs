//! Project configuration stored in `<project>/genloop.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// File name of the project configuration, relative to the project root.
pub const CONFIG_FILE: &str = "genloop.toml";

/// Project configuration (TOML).
///
/// Meant to be edited by humans. Missing fields fall back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GenConfig {
    pub session: SessionConfig,
    pub execute: ExecuteConfig,
    pub clarify: ClarifyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    /// Chat command argv. Receives the conversation as JSON on stdin and
    /// prints the assistant reply on stdout.
    pub command: Vec<String>,

    /// Wall-clock budget for one exchange, in seconds.
    pub timeout_secs: u64,

    /// Replies longer than this many bytes are truncated.
    pub output_limit_bytes: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            timeout_secs: 10 * 60,
            output_limit_bytes: 2_000_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecuteConfig {
    /// Shell used to run the entrypoint script.
    pub shell: String,

    /// Workspace file holding the generated shell commands.
    pub entrypoint: String,
}

impl Default for ExecuteConfig {
    fn default() -> Self {
        Self {
            shell: "bash".to_string(),
            entrypoint: "run.sh".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClarifyConfig {
    /// Treat any clarification reply starting with "no" as the end of the dialogue.
    pub legacy_no_prefix: bool,
}

impl GenConfig {
    pub fn validate(&self) -> Result<()> {
        if self.session.timeout_secs == 0 {
            return Err(anyhow!("session.timeout_secs must be > 0"));
        }
        if self.session.output_limit_bytes == 0 {
            return Err(anyhow!("session.output_limit_bytes must be > 0"));
        }
        if self
            .session
            .command
            .first()
            .is_some_and(|program| program.trim().is_empty())
        {
            return Err(anyhow!("session.command must start with a program name"));
        }
        if self.execute.shell.trim().is_empty() {
            return Err(anyhow!("execute.shell must be non-empty"));
        }
        if self.execute.entrypoint.trim().is_empty() {
            return Err(anyhow!("execute.entrypoint must be non-empty"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `GenConfig::default()`.
pub fn load_config(path: &Path) -> Result<GenConfig> {
    if !path.exists() {
        let cfg = GenConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: GenConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &GenConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
