//! # Error Types
//!
//! Custom error types for the joystick core using `thiserror`.
//!
//! Nothing on the read/gate/encode path returns these: that path degrades to
//! neutral input instead. They surface from configuration, device access and
//! the transport hand-off.

use thiserror::Error;

/// Main error type for the joystick core
#[derive(Debug, Error)]
pub enum JoystickError {
    /// Packet layout errors
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Input device errors (open failures, read failures)
    #[error("Controller error: {0}")]
    Controller(String),

    /// No input device matched
    #[error("No matching input device found")]
    ControllerNotFound,

    /// Packet hand-off errors
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Result type alias for the joystick core
pub type Result<T> = std::result::Result<T, JoystickError>;
