//! Type definitions for the correlation system
//!
//! Core types used throughout the correlation system for request tracking,
//! ID generation, and result handling.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::oneshot;

use crate::correlation::error::RequestId;
use crate::protocol::JsonRpcResponse;
pub use crate::correlation::error::CorrelationResult;

/// A pending request awaiting correlation with its response
///
/// Holds the completion channel and the deadline bookkeeping for a request
/// that has been written to the transport but not yet answered. The channel
/// carries the whole response so method-level errors survive correlation.
#[derive(Debug)]
pub struct PendingRequest {
    /// Channel sender for delivering the correlated response or error
    pub sender: oneshot::Sender<CorrelationResult<JsonRpcResponse>>,

    /// Timestamp when the request was created (UTC)
    pub created_at: DateTime<Utc>,

    /// Maximum time to wait for a response
    pub timeout: TimeDelta,

    /// Method name of the outbound request, kept for diagnostics
    pub method: String,
}

impl PendingRequest {
    /// Create a new pending request
    pub fn new(
        sender: oneshot::Sender<CorrelationResult<JsonRpcResponse>>,
        timeout: TimeDelta,
        method: impl Into<String>,
    ) -> Self {
        Self {
            sender,
            created_at: Utc::now(),
            timeout,
            method: method.into(),
        }
    }

    /// Check if this request has expired based on current time
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(&Utc::now())
    }

    /// Check if this request has expired at a specific timestamp
    ///
    /// More efficient than `is_expired()` when sweeping many requests, as it
    /// avoids repeated system calls for the current time.
    pub fn is_expired_at(&self, now: &DateTime<Utc>) -> bool {
        now.signed_duration_since(self.created_at) > self.timeout
    }
}

/// Thread-safe request ID generator
///
/// Generates unique request IDs using an atomic counter, ensuring no
/// collisions in concurrent environments. IDs are monotonic non-negative
/// integers, assigned per peer.
#[derive(Debug)]
pub struct RequestIdGenerator {
    /// Atomic counter for generating unique IDs
    counter: AtomicU64,
}

impl RequestIdGenerator {
    /// Create a new request ID generator starting at 1
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(1),
        }
    }

    /// Generate the next unique request ID
    pub fn next_id(&self) -> RequestId {
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        RequestId::new_number(id as i64)
    }
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
