//! Build configuration stored in `provision.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::hardware::HardwareConfig;

pub const DEFAULT_CONFIG_PATH: &str = "provision.toml";

/// Build configuration (TOML).
///
/// Edited by humans. Missing fields default to values that make `apply` a no-op.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Inventory path or name of the target VM. The `--vm` flag overrides it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vm: Option<String>,

    /// Wall-clock budget for the whole pipeline in seconds. 0 disables the deadline.
    pub timeout_secs: u64,

    pub hardware: HardwareConfig,

    pub remote: RemoteConfig,
}

/// How to reach the management endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RemoteConfig {
    /// Command prefix for the govc CLI (e.g. `["govc"]`). Endpoint and credentials come
    /// from the `GOVC_*` environment.
    pub command: Vec<String>,

    /// Keep at most this many bytes of govc stdout/stderr.
    pub output_limit_bytes: usize,

    /// How often a pending task re-checks cancellation, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            command: vec!["govc".to_string()],
            output_limit_bytes: 100_000,
            poll_interval_ms: 200,
        }
    }
}

impl RemoteConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.command.is_empty() || self.command[0].trim().is_empty() {
            errors.push("remote.command must be a non-empty array".to_string());
        }
        if self.output_limit_bytes == 0 {
            errors.push("remote.output_limit_bytes must be > 0".to_string());
        }
        if self.poll_interval_ms == 0 {
            errors.push("remote.poll_interval_ms must be > 0".to_string());
        }
        errors
    }
}

impl ProvisionConfig {
    /// All violations across sections, hardware first.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = self.hardware.validate();
        errors.extend(self.remote.validate());
        if self.vm.as_deref().is_some_and(|vm| vm.trim().is_empty()) {
            errors.push("vm must not be empty when set".to_string());
        }
        errors
    }

    fn ensure_valid(&self, path: &Path) -> Result<()> {
        let errors = self.validate();
        if !errors.is_empty() {
            bail!("invalid config {}:\n- {}", path.display(), errors.join("\n- "));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ProvisionConfig::default()`.
pub fn load_config(path: &Path) -> Result<ProvisionConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config missing, using defaults");
        return Ok(ProvisionConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ProvisionConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.ensure_valid(path)?;
    debug!(path = %path.display(), hardware = ?cfg.hardware, "config loaded");
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &ProvisionConfig) -> Result<()> {
    cfg.ensure_valid(path)?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
