//! Errors raised while loading configuration.

use thiserror::Error;

/// Result type alias using `Hubwire` Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for `Hubwire` operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Firmware version could not be parsed
    #[error("Invalid firmware version '{value}': {reason}")]
    FirmwareVersion { value: String, reason: String },
}
