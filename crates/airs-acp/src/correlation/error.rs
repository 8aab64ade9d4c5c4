//! Error types for the correlation system
//!
//! This module defines all error types related to request/response
//! correlation, providing structured error information for debugging and
//! monitoring.

use chrono::TimeDelta;
use thiserror::Error;

use crate::protocol::{codes, AcpError};

/// Request ID type alias for consistency with the JSON-RPC base types
pub type RequestId = crate::protocol::RequestId;

/// Correlation error types
///
/// These errors represent the ways a pending request can fail to be
/// correlated with a response.
#[derive(Debug, Clone, Error)]
pub enum CorrelationError {
    /// Request timed out waiting for a response
    #[error("Request {id} timed out after {duration}")]
    Timeout {
        /// The request ID that timed out
        id: RequestId,
        /// The timeout duration that was exceeded
        duration: TimeDelta,
    },

    /// Request was not found in the correlation table
    #[error("Request {id} not found (may have completed or been cancelled)")]
    RequestNotFound {
        /// The request ID that was not found
        id: RequestId,
    },

    /// Communication channel was closed unexpectedly
    #[error("Channel error for request {id}: {details}")]
    ChannelClosed {
        /// The request ID associated with the channel
        id: RequestId,
        /// Additional error details
        details: String,
    },

    /// The transport closed while the request was pending
    #[error("Transport closed while request {id} was pending")]
    TransportClosed {
        /// The request ID that was pending at close
        id: RequestId,
    },

    /// The pending-request table is at capacity
    #[error("Pending-request table is full ({capacity} entries)")]
    CapacityExceeded {
        /// The configured capacity that was reached
        capacity: usize,
    },

    /// Request was explicitly cancelled
    #[error("Request {id} was cancelled")]
    Cancelled {
        /// The request ID that was cancelled
        id: RequestId,
    },

    /// Internal correlation system error
    #[error("Internal correlation error: {message}")]
    Internal {
        /// Error message describing the internal issue
        message: String,
    },
}

impl From<CorrelationError> for AcpError {
    fn from(err: CorrelationError) -> Self {
        match &err {
            CorrelationError::Timeout { .. } => AcpError::new(codes::TIMEOUT, err.to_string()),
            CorrelationError::CapacityExceeded { .. } => {
                AcpError::new(codes::RATE_LIMITED, err.to_string())
            }
            CorrelationError::Cancelled { .. } => {
                AcpError::new(codes::OPERATION_CANCELLED, err.to_string())
            }
            _ => AcpError::internal_error(err.to_string()),
        }
    }
}

/// Single result type for all correlation operations
pub type CorrelationResult<T> = std::result::Result<T, CorrelationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let timeout_error = CorrelationError::Timeout {
            id: RequestId::new_string("test-123"),
            duration: TimeDelta::seconds(30),
        };

        let display = format!("{timeout_error}");
        assert!(display.contains("test-123"));
        assert!(display.contains("timed out"));
    }

    #[test]
    fn test_acp_error_mapping() {
        let timeout = CorrelationError::Timeout {
            id: RequestId::new_number(1),
            duration: TimeDelta::milliseconds(100),
        };
        assert_eq!(AcpError::from(timeout).code, codes::TIMEOUT);

        let capacity = CorrelationError::CapacityExceeded { capacity: 8 };
        assert_eq!(AcpError::from(capacity).code, codes::RATE_LIMITED);

        let closed = CorrelationError::TransportClosed {
            id: RequestId::new_number(2),
        };
        assert_eq!(AcpError::from(closed).code, codes::INTERNAL_ERROR);
    }
}
