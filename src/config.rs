//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and field is optional; anything omitted takes its default.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{JoystickError, Result};
use crate::joystick::registry::MAX_CONTROLLERS;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub input: InputConfig,

    #[serde(default)]
    pub keyboard: KeyboardConfig,

    #[serde(default)]
    pub driver: DriverConfig,

    #[serde(default)]
    pub safety: SafetyConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Gamepad discovery configuration
#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    #[serde(default = "default_device_dir")]
    pub device_dir: String,

    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,
}

/// Keyboard virtual controller configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct KeyboardConfig {
    #[serde(default)]
    pub enabled: bool,

    /// evdev keyboard node; empty means keys come from the console only
    #[serde(default)]
    pub device_path: String,
}

/// Poll loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DriverConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_log_interval_ticks")]
    pub log_interval_ticks: u64,

    #[serde(default = "default_sink_capacity")]
    pub sink_capacity: usize,
}

/// Safety configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SafetyConfig {
    #[serde(default = "default_status_timeout_ms")]
    pub status_timeout_ms: u64,

    /// Controller ids blacklisted at startup
    #[serde(default)]
    pub blacklist: Vec<usize>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily log files; empty logs to stdout only
    #[serde(default)]
    pub directory: String,
}

// Default value functions
fn default_device_dir() -> String { "/dev/input".to_string() }
fn default_scan_interval_ms() -> u64 { 1000 }

fn default_poll_interval_ms() -> u64 { 20 }
fn default_log_interval_ticks() -> u64 { 250 }
fn default_sink_capacity() -> usize { 64 }

fn default_status_timeout_ms() -> u64 { 500 }

fn default_log_level() -> String { "info".to_string() }

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            device_dir: default_device_dir(),
            scan_interval_ms: default_scan_interval_ms(),
        }
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            log_interval_ticks: default_log_interval_ticks(),
            sink_capacity: default_sink_capacity(),
        }
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            status_timeout_ms: default_status_timeout_ms(),
            blacklist: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: String::new(),
        }
    }
}

fn invalid(msg: impl std::fmt::Display) -> JoystickError {
    JoystickError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use frc_ds_joystick::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a TOML string
    ///
    /// # Errors
    ///
    /// Returns `Config` if parsing or validation fails.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.input.device_dir.is_empty() {
            return Err(invalid("input device_dir cannot be empty"));
        }

        if self.input.scan_interval_ms == 0 || self.input.scan_interval_ms > 60000 {
            return Err(invalid("scan_interval_ms must be between 1 and 60000"));
        }

        if ![10, 20, 50, 100].contains(&self.driver.poll_interval_ms) {
            return Err(invalid("poll_interval_ms must be one of: 10, 20, 50, 100"));
        }

        if self.driver.log_interval_ticks == 0 {
            return Err(invalid("log_interval_ticks must be greater than 0"));
        }

        if self.driver.sink_capacity == 0 {
            return Err(invalid("sink_capacity must be greater than 0"));
        }

        if self.safety.status_timeout_ms == 0 || self.safety.status_timeout_ms > 60000 {
            return Err(invalid("status_timeout_ms must be between 1 and 60000"));
        }

        // The watchdog needs at least one poll tick to notice a heartbeat
        if self.safety.status_timeout_ms < self.driver.poll_interval_ms {
            return Err(invalid("status_timeout_ms must not be shorter than poll_interval_ms"));
        }

        for &id in &self.safety.blacklist {
            if id >= MAX_CONTROLLERS {
                return Err(invalid(format!(
                    "blacklist id {} is out of bounds (must be 0-{})",
                    id,
                    MAX_CONTROLLERS - 1
                )));
            }
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid(
                "logging level must be one of: trace, debug, info, warn, error",
            ));
        }

        Ok(())
    }
}
