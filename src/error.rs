//! Custom error types for the application.
//!
//! This module defines the error types shared across the crate. Using the `thiserror`
//! crate, it provides a centralized and consistent way to handle the different kinds of
//! errors that can occur, from configuration problems to transport failures.
//!
//! ## Error Hierarchy
//!
//! - **`ConfigError`**: Everything that can go wrong while loading and validating the robot
//!   configuration. These errors are fatal at startup: no ingestion or frame output happens
//!   without a complete, valid configuration.
//! - **`TelemetryError`**: The application-level error. It wraps `ConfigError`, I/O and
//!   transport problems so that adapters and the binary can use `?` throughout.
//!
//! Line parse failures are deliberately *not* part of this hierarchy. They are local,
//! non-fatal, and counted by the ingestor; see [`crate::parser::ParseError`].

use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, TelemetryError>;

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Must have exactly 6 legs (0-5). Missing legs: {0:?}")]
    MissingLegs(Vec<u8>),

    #[error("Must have exactly 6 legs (0-5). Extra legs: {0:?}")]
    ExtraLegs(Vec<String>),

    #[error("Leg {leg}: link_lengths must have 2 or 3 entries, got {count}")]
    LinkLengthCount { leg: u8, count: usize },

    #[error("Leg {leg}: joint_angle_offsets must have exactly 3 entries, got {count}")]
    OffsetCount { leg: u8, count: usize },

    #[error("Leg {leg}: link length {value} must be non-negative")]
    NegativeLinkLength { leg: u8, value: f64 },

    #[error("{field} must be a finite number")]
    NonFinite { field: String },

    #[error("Configuration validation error: {field}: {reason}")]
    Invalid { field: String, reason: String },

    #[error("Failed to serialize configuration: {0}")]
    Serialize(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(value: figment::Error) -> Self {
        ConfigError::Load(Box::new(value))
    }
}

impl ConfigError {
    /// Shorthand for a semantic validation failure on a named field.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Application-level error.
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serial port not connected")]
    SerialPortNotConnected,

    #[error("Serial support not enabled. Rebuild with --features serial")]
    SerialFeatureDisabled,

    #[error("Ingestion task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_into_telemetry_error() {
        let err: TelemetryError = ConfigError::MissingLegs(vec![3, 5]).into();
        assert!(matches!(err, TelemetryError::Config(ConfigError::MissingLegs(_))));
        assert_eq!(
            err.to_string(),
            "Must have exactly 6 legs (0-5). Missing legs: [3, 5]"
        );
    }

    #[test]
    fn invalid_helper_formats_field_and_reason() {
        let err = ConfigError::invalid("serial.baudrate", "must be one of 9600, 115200");
        assert_eq!(
            err.to_string(),
            "Configuration validation error: serial.baudrate: must be one of 9600, 115200"
        );
    }
}
