//! Correlation Manager implementation
//!
//! This module provides the main CorrelationManager that handles
//! bidirectional JSON-RPC request/response correlation with timeout
//! management and background cleanup.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use chrono::TimeDelta;
use dashmap::DashMap;
use tokio::{
    sync::{oneshot, RwLock},
    task::JoinHandle,
    time::{interval, Duration},
};
use tracing::{debug, trace};

use crate::correlation::{
    error::{CorrelationError, CorrelationResult, RequestId},
    types::{PendingRequest, RequestIdGenerator},
};
use crate::protocol::JsonRpcResponse;

/// Configuration for the correlation manager
///
/// Controls behavior like cleanup intervals, default timeouts, and capacity
/// limits.
#[derive(Debug, Clone)]
pub struct CorrelationConfig {
    /// Default timeout for requests if not specified
    pub default_timeout: TimeDelta,

    /// How often to run cleanup of expired requests
    pub cleanup_interval: Duration,

    /// Maximum number of pending requests (0 = unlimited)
    pub max_pending_requests: usize,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            default_timeout: TimeDelta::seconds(30),
            cleanup_interval: Duration::from_millis(250),
            max_pending_requests: 1000,
        }
    }
}

/// Main correlation manager for JSON-RPC request/response correlation
///
/// Provides thread-safe management of pending requests with automatic
/// timeout handling and background cleanup. Responses may arrive in any
/// order; correlation is solely by request id.
///
/// # Examples
///
/// ```rust
/// use airs_acp::correlation::{CorrelationManager, CorrelationConfig};
/// use chrono::TimeDelta;
/// use serde_json::json;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let manager = CorrelationManager::new(CorrelationConfig::default());
///
/// let (id, receiver) = manager.register_request(
///     Some(TimeDelta::seconds(30)),
///     "session/prompt",
/// )?;
///
/// // Later, when the matching response arrives:
/// # use airs_acp::protocol::JsonRpcResponse;
/// let response = JsonRpcResponse::success(json!({"stopReason": "end_turn"}), id.clone());
/// manager.correlate_response(&id, Ok(response))?;
/// let result = receiver.await??;
///
/// manager.shutdown().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CorrelationManager {
    /// Stores pending requests by their ID
    requests: Arc<DashMap<RequestId, PendingRequest>>,

    /// Generates unique request IDs
    id_generator: Arc<RequestIdGenerator>,

    /// Configuration settings
    config: CorrelationConfig,

    /// Background cleanup task handle
    cleanup_task: Arc<RwLock<Option<JoinHandle<()>>>>,

    /// Shutdown signal for background tasks
    shutdown_signal: Arc<AtomicBool>,
}

impl CorrelationManager {
    /// Create a new correlation manager with the given configuration
    ///
    /// This starts the background cleanup task immediately.
    pub fn new(config: CorrelationConfig) -> Self {
        let requests: Arc<DashMap<RequestId, PendingRequest>> = Arc::new(DashMap::new());
        let shutdown_signal = Arc::new(AtomicBool::new(false));

        let cleanup_handle = Self::spawn_cleanup_task(
            Arc::clone(&requests),
            config.cleanup_interval,
            Arc::clone(&shutdown_signal),
        );

        debug!(?config, "CorrelationManager initialized");

        Self {
            requests,
            id_generator: Arc::new(RequestIdGenerator::new()),
            config,
            cleanup_task: Arc::new(RwLock::new(Some(cleanup_handle))),
            shutdown_signal,
        }
    }

    /// Register a new request for correlation
    ///
    /// Assigns the next monotonic request ID, stores the pending entry, and
    /// returns both the ID and a receiver channel for the correlated
    /// response.
    ///
    /// # Errors
    ///
    /// Returns `CorrelationError::CapacityExceeded` when the pending table is
    /// at its configured capacity; callers surface this as `RateLimited`.
    pub fn register_request(
        &self,
        timeout: Option<TimeDelta>,
        method: impl Into<String>,
    ) -> CorrelationResult<(RequestId, oneshot::Receiver<CorrelationResult<JsonRpcResponse>>)> {
        if self.config.max_pending_requests > 0
            && self.requests.len() >= self.config.max_pending_requests
        {
            return Err(CorrelationError::CapacityExceeded {
                capacity: self.config.max_pending_requests,
            });
        }

        let (sender, receiver) = oneshot::channel();
        let request_id = self.id_generator.next_id();
        let timeout = timeout.unwrap_or(self.config.default_timeout);
        let method = method.into();

        debug!(%request_id, %method, ?timeout, "registering request");

        self.requests
            .insert(request_id.clone(), PendingRequest::new(sender, timeout, method));

        Ok((request_id, receiver))
    }

    /// Correlate a response with a pending request
    ///
    /// Finds the pending request by ID, sends the response through its
    /// channel, and removes the entry.
    ///
    /// # Errors
    ///
    /// * `CorrelationError::RequestNotFound` - no pending request with this
    ///   ID (e.g. a late response after timeout; callers log and drop it)
    /// * `CorrelationError::ChannelClosed` - the waiter went away
    pub fn correlate_response(
        &self,
        request_id: &RequestId,
        response: CorrelationResult<JsonRpcResponse>,
    ) -> CorrelationResult<()> {
        let (_, pending_request) =
            self.requests
                .remove(request_id)
                .ok_or_else(|| CorrelationError::RequestNotFound {
                    id: request_id.clone(),
                })?;

        debug!(%request_id, method = %pending_request.method, "correlating response");

        pending_request
            .sender
            .send(response)
            .map_err(|_| CorrelationError::ChannelClosed {
                id: request_id.clone(),
                details: "response channel was closed".to_string(),
            })?;

        Ok(())
    }

    /// Get the current number of pending requests
    pub fn pending_count(&self) -> usize {
        self.requests.len()
    }

    /// Check if a request is currently pending
    pub fn is_pending(&self, request_id: &RequestId) -> bool {
        self.requests.contains_key(request_id)
    }

    /// Cancel a pending request
    ///
    /// Removes the request and sends a cancellation error through its
    /// channel.
    pub fn cancel_request(&self, request_id: &RequestId) -> CorrelationResult<()> {
        let (_, pending_request) =
            self.requests
                .remove(request_id)
                .ok_or_else(|| CorrelationError::RequestNotFound {
                    id: request_id.clone(),
                })?;

        debug!(%request_id, "cancelling request");

        let _ = pending_request
            .sender
            .send(Err(CorrelationError::Cancelled {
                id: request_id.clone(),
            }));

        Ok(())
    }

    /// Fail every pending request with `TransportClosed`
    ///
    /// Called when the transport closes; every in-flight waiter fails
    /// immediately and the table ends up empty.
    pub fn fail_all_closed(&self) {
        let pending_ids: Vec<_> = self
            .requests
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        if !pending_ids.is_empty() {
            debug!(
                count = pending_ids.len(),
                "failing pending requests: transport closed"
            );
        }

        for request_id in pending_ids {
            if let Some((_, pending_request)) = self.requests.remove(&request_id) {
                let _ = pending_request
                    .sender
                    .send(Err(CorrelationError::TransportClosed { id: request_id }));
            }
        }
    }

    /// Manually trigger cleanup of expired requests
    ///
    /// Called automatically by the background cleanup task; exposed for
    /// immediate cleanup in tests.
    pub fn cleanup_expired_requests(&self) -> usize {
        let now = chrono::Utc::now();

        let expired_ids: Vec<RequestId> = self
            .requests
            .iter()
            .filter_map(|entry| {
                if entry.value().is_expired_at(&now) {
                    Some(entry.key().clone())
                } else {
                    None
                }
            })
            .collect();

        let cleaned_count = expired_ids.len();

        for request_id in expired_ids {
            if let Some((_, pending_request)) = self.requests.remove(&request_id) {
                let _ = pending_request.sender.send(Err(CorrelationError::Timeout {
                    id: request_id.clone(),
                    duration: pending_request.timeout,
                }));
                trace!(%request_id, "request timed out");
            }
        }

        cleaned_count
    }

    fn spawn_cleanup_task(
        requests: Arc<DashMap<RequestId, PendingRequest>>,
        cleanup_interval: Duration,
        shutdown_signal: Arc<AtomicBool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = interval(cleanup_interval);

            while !shutdown_signal.load(Ordering::Relaxed) {
                interval.tick().await;

                let now = chrono::Utc::now();
                let expired: Vec<RequestId> = requests
                    .iter()
                    .filter_map(|entry| {
                        entry
                            .value()
                            .is_expired_at(&now)
                            .then(|| entry.key().clone())
                    })
                    .collect();

                for request_id in expired {
                    if let Some((_, pending_request)) = requests.remove(&request_id) {
                        let _ = pending_request.sender.send(Err(CorrelationError::Timeout {
                            id: request_id.clone(),
                            duration: pending_request.timeout,
                        }));
                        trace!(%request_id, "background cleanup: request timed out");
                    }
                }
            }

            debug!("background cleanup task shutting down");
        })
    }

    /// Shutdown the correlation manager
    ///
    /// Stops the background cleanup task and cancels all pending requests.
    pub async fn shutdown(&self) {
        debug!("shutting down CorrelationManager");

        self.shutdown_signal.store(true, Ordering::Relaxed);

        if let Some(cleanup_handle) = self.cleanup_task.write().await.take() {
            cleanup_handle.abort();
        }

        let pending_ids: Vec<_> = self
            .requests
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        for request_id in pending_ids {
            if let Some((_, pending_request)) = self.requests.remove(&request_id) {
                let _ = pending_request
                    .sender
                    .send(Err(CorrelationError::Cancelled { id: request_id }));
            }
        }
    }
}
