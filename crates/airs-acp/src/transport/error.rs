//! Transport Error Types
//!
//! This module defines common error types used across all transport
//! implementations.

/// Common transport error types.
///
/// Provides a standardized set of error variants shared by the stdio and
/// HTTP transports, while allowing transport-specific detail through the
/// `Other` variant.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport connection is closed
    #[error("Transport connection is closed")]
    Closed,

    /// Failed to establish or maintain the connection
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// Message formatting or framing error
    #[error("Message format error: {message}")]
    Format { message: String },

    /// Request or connection timeout
    #[error("Timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Message size exceeds the maximum allowed
    #[error("Message too large: {size} bytes (max: {max_size} bytes)")]
    MessageTooLarge { size: usize, max_size: usize },

    /// JSON parsing error on an inbound frame
    #[error("Parse error: {0}")]
    ParseError(String),

    /// JSON serialization error on an outbound message
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Transport-specific error
    #[error("Transport error: {details}")]
    Other { details: String },
}

impl TransportError {
    /// Create a format error with a message
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a timeout error with duration
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a message too large error
    pub fn message_too_large(size: usize, max_size: usize) -> Self {
        Self::MessageTooLarge { size, max_size }
    }

    /// Create a parse error
    pub fn parse_error(error: impl Into<String>) -> Self {
        Self::ParseError(error.into())
    }

    /// Create a serialization error
    pub fn serialization_error(error: impl Into<String>) -> Self {
        Self::SerializationError(error.into())
    }

    /// Create a transport-specific error with details
    pub fn other(details: impl Into<String>) -> Self {
        Self::Other {
            details: details.into(),
        }
    }

    /// Create a connection closed error
    pub fn closed() -> Self {
        Self::Closed
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(error: serde_json::Error) -> Self {
        Self::SerializationError(error.to_string())
    }
}

impl From<crate::protocol::ProtocolError> for TransportError {
    fn from(error: crate::protocol::ProtocolError) -> Self {
        Self::ParseError(error.to_string())
    }
}
