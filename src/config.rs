//! Configuration file management for tlschk.
//!
//! Settings are layered, later layers winning:
//!
//! 1. Built-in defaults
//! 2. Configuration file (`tlschk.toml` in the working directory, or `--config`)
//! 3. Command-line arguments
//!
//! # Example Configuration File
//!
//! ```toml
//! targets = ["example.com:443", "expired.badssl.com:443"]
//! detail = false
//! fullchain = true
//! verify = true
//! timeout = 10
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::probe::DEFAULT_TIMEOUT;
use crate::session::Settings;

/// File looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "tlschk.toml";

/// One configuration layer.
///
/// All fields are optional so layers can be merged. `Config::default()` is
/// the empty layer; [`Config::builtin`] holds the real defaults.
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Targets processed as a batch instead of starting the prompt
    pub targets: Option<Vec<String>>,
    /// Start with structured output
    pub detail: Option<bool>,
    /// Start reporting every certificate of the chain
    pub fullchain: Option<bool>,
    /// Start with chain verification on
    pub verify: Option<bool>,
    /// Connect and handshake timeout in seconds
    pub timeout: Option<u64>,
}

impl Config {
    /// Loads one layer from a TOML file.
    ///
    /// ```no_run
    /// # use tlschk::config::Config;
    /// let config = Config::from_file("tlschk.toml")?;
    /// # Ok::<(), tlschk::config::ConfigError>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Built-in defaults: every flag off, ten second timeout, no batch.
    pub fn builtin() -> Self {
        Config {
            targets: None,
            detail: Some(false),
            fullchain: Some(false),
            verify: Some(false),
            timeout: Some(DEFAULT_TIMEOUT.as_secs()),
        }
    }

    /// Overlays `other` on top of this layer.
    pub fn merge_with(mut self, other: Config) -> Self {
        if other.targets.is_some() {
            self.targets = other.targets;
        }
        if other.detail.is_some() {
            self.detail = other.detail;
        }
        if other.fullchain.is_some() {
            self.fullchain = other.fullchain;
        }
        if other.verify.is_some() {
            self.verify = other.verify;
        }
        if other.timeout.is_some() {
            self.timeout = other.timeout;
        }
        self
    }

    /// Layer for command-line arguments.
    ///
    /// Switches that were not passed and an empty target list leave the
    /// lower layers untouched.
    pub fn from_cli_args(
        targets: Vec<String>,
        detail: bool,
        fullchain: bool,
        verify: bool,
        timeout: Option<u64>,
    ) -> Self {
        Config {
            targets: if targets.is_empty() { None } else { Some(targets) },
            detail: detail.then_some(true),
            fullchain: fullchain.then_some(true),
            verify: verify.then_some(true),
            timeout,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout == Some(0) {
            return Err(ConfigError::Validation(
                "timeout must be at least one second".to_string(),
            ));
        }
        if let Some(targets) = &self.targets {
            if targets.iter().any(|t| t.trim().is_empty()) {
                return Err(ConfigError::Validation(
                    "targets must not contain empty entries".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Initial session state, judged against `now` for the whole run.
    pub fn settings(&self, now: DateTime<Utc>) -> Settings {
        Settings {
            show_full_chain: self.fullchain.unwrap_or(false),
            verify_chain: self.verify.unwrap_or(false),
            show_detail: self.detail.unwrap_or(false),
            reference_time: now,
        }
    }

    /// Example configuration with every option set.
    pub fn example_toml() -> String {
        let example = Config {
            targets: Some(vec![
                "example.com:443".to_string(),
                "expired.badssl.com:443".to_string(),
                "[2606:4700::6810:84e5]:443".to_string(),
            ]),
            detail: Some(false),
            fullchain: Some(true),
            verify: Some(true),
            timeout: Some(DEFAULT_TIMEOUT.as_secs()),
        };

        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| "# Error generating example".to_string())
    }
}

/// Errors that can occur during configuration loading and parsing.
#[derive(Debug)]
pub enum ConfigError {
    /// I/O error (file not found, permission denied, etc.)
    Io(String),
    /// TOML parsing error (invalid syntax, type mismatch, etc.)
    Parse(String),
    /// Value out of range
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "IO Error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Parse Error: {}", msg),
            ConfigError::Validation(msg) => write!(f, "Validation Error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
