//! Configuration management for wmsync
//!
//! This module handles loading, parsing, and validating the harness
//! configuration from TOML files: how to start the virtual display, which
//! window manager to run against it, and the barrier timeouts.

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sync::SyncOptions;

/// Main configuration struct containing all harness settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct HarnessConfig {
    /// Virtual display (Xvfb) settings
    #[serde(default)]
    pub display: DisplayConfig,

    /// Window manager under test
    #[serde(default)]
    pub wm: WmConfig,

    /// Barrier timeouts
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Virtual display server settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    /// Path or name of the Xvfb binary
    pub xvfb_path: String,

    /// Extra arguments appended after the display name
    pub extra_args: Vec<String>,

    /// How long to wait for the X socket to appear (milliseconds)
    pub startup_timeout_ms: u64,
}

/// Window manager settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WmConfig {
    /// Path or name of the window manager binary
    pub command: String,

    /// Extra arguments
    pub args: Vec<String>,

    /// WM configuration file, passed as `-c <absolute path>`
    pub config_file: Option<PathBuf>,

    /// Explicit control socket; otherwise discovered from the environment
    /// or the root window
    pub socket_path: Option<PathBuf>,

    /// Variables added to the otherwise empty WM environment
    pub extra_env: BTreeMap<String, String>,

    /// How long to wait for the control socket (milliseconds)
    pub startup_timeout_ms: u64,
}

/// Barrier settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Bound on the completion wait (milliseconds)
    pub timeout_ms: u64,

    /// Bound on the acknowledgement (milliseconds)
    pub reply_timeout_ms: u64,

    /// Fixed token seed, for replaying a run
    pub token_seed: Option<u64>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            xvfb_path: "Xvfb".to_string(),
            extra_args: vec![
                "-screen".to_string(),
                "0".to_string(),
                "1280x800x24".to_string(),
            ],
            startup_timeout_ms: 5000,
        }
    }
}

impl Default for WmConfig {
    fn default() -> Self {
        Self {
            command: "i3".to_string(),
            args: Vec::new(),
            config_file: None,
            socket_path: None,
            extra_env: BTreeMap::new(),
            startup_timeout_ms: 10_000,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            reply_timeout_ms: 2000,
            token_seed: None,
        }
    }
}

impl DisplayConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }
}

impl WmConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }
}

impl SyncConfig {
    pub fn options(&self) -> SyncOptions {
        SyncOptions {
            timeout: Duration::from_millis(self.timeout_ms),
            reply_timeout: Duration::from_millis(self.reply_timeout_ms),
            token_seed: self.token_seed,
        }
    }
}

impl HarnessConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Expand ~ to home directory
        let expanded_path = if path.to_string_lossy().starts_with('~') {
            let home = std::env::var("HOME").context("Failed to get HOME environment variable")?;
            let rest = path.strip_prefix("~").unwrap_or(path);
            Path::new(&home).join(rest)
        } else {
            path.to_path_buf()
        };

        let contents = fs::read_to_string(&expanded_path)
            .with_context(|| format!("Failed to read config file: {}", expanded_path.display()))?;

        let mut config: HarnessConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", expanded_path.display()))?;

        // WM config files are relative to the harness config
        if let Some(base) = expanded_path.parent() {
            config.wm.config_file = config.wm.config_file.map(|p| {
                if p.is_relative() {
                    base.join(p)
                } else {
                    p
                }
            });
        }

        config.validate()?;

        Ok(config)
    }

    /// Load a file if it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(path) if path.as_ref().exists() => Self::load(path),
            Some(path) => {
                warn!("⚠️ Config file {} not found, using defaults", path.as_ref().display());
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.display.xvfb_path.trim().is_empty() {
            anyhow::bail!("Invalid display.xvfb_path: must not be empty");
        }
        if self.wm.command.trim().is_empty() {
            anyhow::bail!("Invalid wm.command: must not be empty");
        }
        if self.display.startup_timeout_ms == 0 {
            anyhow::bail!("Invalid display.startup_timeout_ms: must be positive");
        }
        if self.wm.startup_timeout_ms == 0 {
            anyhow::bail!("Invalid wm.startup_timeout_ms: must be positive");
        }
        if self.sync.timeout_ms == 0 {
            anyhow::bail!("Invalid sync.timeout_ms: a barrier wait must be bounded");
        }
        if self.sync.reply_timeout_ms == 0 {
            anyhow::bail!("Invalid sync.reply_timeout_ms: must be positive");
        }
        if self.wm.extra_env.contains_key("DISPLAY") {
            anyhow::bail!("Invalid wm.extra_env: DISPLAY is set by the harness");
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, contents).context("Failed to write configuration file")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests;
