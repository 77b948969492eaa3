//! Common error types used across the workspace.
//!
//! Each failure class has its own typed error; [`CubeLinkError`] gathers them
//! through `#[from]` conversions for callers that only need one type.

use std::time::Duration;

/// Top-level error for the cubelink workspace.
#[derive(Debug, thiserror::Error)]
pub enum CubeLinkError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("protocol decode error")]
    Decode(#[from] DecodeError),

    #[error("gateway transport error")]
    Transport(#[from] TransportError),

    #[error("command outbox is full")]
    QueueFull(#[from] QueueFullError),
}

/// Invalid configuration values, reported before anything is started.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("gateway host must not be empty")]
    EmptyHost,

    #[error("gateway port must be non-zero")]
    ZeroPort,

    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),
}

/// A line with a recognised prefix whose payload does not follow the grammar
/// of its record kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("{record} record is missing its {field} field")]
    MissingField {
        record: &'static str,
        field: &'static str,
    },

    #[error("invalid serial number {0:?}")]
    InvalidSerial(String),

    #[error("invalid {field} value {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("unknown operating mode {0:?}")]
    UnknownMode(String),

    #[error("malformed {record} entry {entry:?}")]
    MalformedEntry {
        record: &'static str,
        entry: String,
    },
}

/// Failures talking to the gateway over its socket.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to connect to gateway at {addr}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out connecting to gateway at {addr}")]
    ConnectTimeout { addr: String },

    #[error("gateway socket error")]
    Io(#[from] std::io::Error),

    #[error("gateway did not answer within {0:?}")]
    ReadTimeout(Duration),

    #[error("gateway closed the connection")]
    UnexpectedEof,

    #[error("gateway sent a line longer than {limit} bytes")]
    LineTooLong { limit: usize },

    #[error("gateway rejected the command")]
    WriteRejected,
}

impl TransportError {
    /// Whether the failure happened before a socket was established.
    #[must_use]
    pub fn is_connect(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::ConnectTimeout { .. })
    }
}

/// The command outbox is at capacity; the command was dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("command outbox is full ({capacity} pending)")]
pub struct QueueFullError {
    pub capacity: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_missing_field_error() {
        let err = DecodeError::MissingField {
            record: "H",
            field: "serial",
        };
        assert_eq!(err.to_string(), "H record is missing its serial field");
    }

    #[test]
    fn should_display_line_too_long_error() {
        let err = TransportError::LineTooLong { limit: 4096 };
        assert!(!err.is_connect());
        assert_eq!(err.to_string(), "gateway sent a line longer than 4096 bytes");
    }

    #[test]
    fn should_display_queue_full_error() {
        let err = QueueFullError { capacity: 50 };
        assert_eq!(err.to_string(), "command outbox is full (50 pending)");
    }

    #[test]
    fn should_convert_decode_error_into_umbrella() {
        let err: CubeLinkError = DecodeError::UnknownMode("eco".to_string()).into();
        assert!(matches!(err, CubeLinkError::Decode(_)));
    }

    #[test]
    fn should_keep_io_error_as_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = TransportError::Connect {
            addr: "10.0.0.2:62910".to_string(),
            source: io,
        };
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "refused");
        assert!(err.is_connect());
    }

    #[test]
    fn should_not_flag_read_timeout_as_connect_failure() {
        let err = TransportError::ReadTimeout(Duration::from_secs(3));
        assert!(!err.is_connect());
        assert_eq!(err.to_string(), "gateway did not answer within 3s");
    }
}
