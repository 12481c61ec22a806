//! Agent configuration management for `qtex.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── serve      # [serve]
//! │   ├── sync       # [sync]
//! │   └── watch      # [watch]
//! ├── error          # ConfigError
//! └── mod.rs         # AgentConfig (this file)
//! ```
//!
//! # Sections
//!
//! | Section   | Purpose                                            |
//! |-----------|----------------------------------------------------|
//! | `[sync]`  | Compile service URL, entry point, output, ignores  |
//! | `[serve]` | Preview server (interface, base port)              |
//! | `[watch]` | File watcher debounce                              |
//!
//! The file is optional: without it every section takes its defaults.
//! Command-line flags override file values.

mod error;
pub mod section;

pub use error::ConfigError;
pub use section::{DEFAULT_SERVER, ServeConfig, SyncConfig, WatchConfig};

use crate::{cli::Cli, log};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Default config file name, looked up in the project directory.
pub const CONFIG_FILE: &str = "qtex.toml";

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing qtex.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Absolute path to the config file, whether or not it exists (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Compile service settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Preview server settings
    #[serde(default)]
    pub serve: ServeConfig,

    /// File watcher settings
    #[serde(default)]
    pub watch: WatchConfig,
}

impl AgentConfig {
    /// Load configuration from CLI arguments.
    ///
    /// The project directory must exist. A config file given with
    /// `--config` must exist too; the default `qtex.toml` is optional.
    pub fn load(cli: &Cli) -> Result<Self> {
        let dir = cli.path.clone().unwrap_or_else(|| PathBuf::from("."));
        let root = dir
            .canonicalize()
            .with_context(|| format!("project directory `{}` not found", dir.display()))?;
        if !root.is_dir() {
            bail!("`{}` is not a directory", root.display());
        }

        let config_path = match &cli.config {
            Some(path) if !path.exists() => {
                bail!("config file `{}` not found", path.display());
            }
            Some(path) => path.clone(),
            None => root.join(CONFIG_FILE),
        };

        let mut config = if config_path.is_file() {
            Self::from_path(&config_path)?
        } else {
            Self::default()
        };

        config.config_path = config_path;
        config.set_root(&root);
        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    /// Parse config from a TOML string.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let (config, _ignored) = Self::parse_with_ignored(content)?;
        Ok(config)
    }

    /// Read and parse a config file, warning about unknown fields.
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring: {}", display_path, fields.join(", "));
    }

    /// Command-line flags win over file values.
    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(server) = &cli.server {
            self.sync.server = server.clone();
        }
        if let Some(output) = &cli.output {
            self.sync.output = output.clone();
        }
        if let Some(port) = cli.port {
            self.serve.port = port;
        }
    }

    /// Reject settings the agent cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let server = self.sync.server.trim();
        if server.is_empty() {
            return Err(ConfigError::Validation("[sync] server is empty".into()));
        }
        if !(server.starts_with("ws://") || server.starts_with("wss://")) {
            return Err(ConfigError::Validation(format!(
                "[sync] server `{server}` must be a ws:// or wss:// URL"
            )));
        }
        if self.sync.main.trim().is_empty() {
            return Err(ConfigError::Validation("[sync] main is empty".into()));
        }
        let output = self.sync.output.trim();
        if output.is_empty() {
            return Err(ConfigError::Validation("[sync] output is empty".into()));
        }
        if output.contains(['/', '\\']) {
            return Err(ConfigError::Validation(format!(
                "[sync] output `{output}` must be a plain file name"
            )));
        }
        if self.watch.debounce_ms == 0 {
            return Err(ConfigError::Validation(
                "[watch] debounce_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn get_root(&self) -> &Path {
        &self.root
    }

    pub fn set_root(&mut self, path: &Path) {
        self.root = path.to_path_buf();
    }

    /// Absolute path the compiled PDF is written to.
    pub fn output_path(&self) -> PathBuf {
        self.root.join(&self.sync.output)
    }
}

/// Parse a config snippet on top of defaults (tests only).
#[cfg(test)]
pub fn test_parse_config(extra: &str) -> AgentConfig {
    AgentConfig::from_str(extra).expect("test config must parse")
}
