//! Error types for the telemetry pipeline
//!
//! None of these are fatal: every variant leaves the pipeline usable for a
//! fresh connect attempt.

use thiserror::Error;

use crate::telemetry::state::ConnectionState;

/// Failure to turn a notification payload into a sample
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Payload is not UTF-8 text or not a JSON object
    #[error("Malformed payload ({len} bytes): {reason}", len = .raw.len())]
    Malformed { raw: Vec<u8>, reason: String },
}

/// Main error type for pipeline and link operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TelemetryError {
    /// Connection or subscription failure reported by the transport
    #[error("Transport error: {0}")]
    Transport(String),

    /// Unexpected disconnect while connected
    #[error("Link lost: {0}")]
    LinkLost(String),

    /// Control request not allowed from the current connection state
    #[error("Cannot {request} while {from}")]
    InvalidTransition {
        from: ConnectionState,
        request: &'static str,
    },

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, TelemetryError>;

impl From<bluer::Error> for TelemetryError {
    fn from(err: bluer::Error) -> Self {
        TelemetryError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_reason_is_verbatim() {
        let err = TelemetryError::Transport("GATT operation failed".to_string());
        assert_eq!(err.to_string(), "Transport error: GATT operation failed");
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = TelemetryError::InvalidTransition {
            from: ConnectionState::Connected,
            request: "connect",
        };
        assert_eq!(err.to_string(), "Cannot connect while Connected");
    }

    #[test]
    fn test_malformed_reports_length() {
        let err = DecodeError::Malformed {
            raw: b"{not".to_vec(),
            reason: "EOF".to_string(),
        };
        assert!(err.to_string().contains("4 bytes"));
    }
}
