//! Transport Layer - Message Delivery Abstractions
//!
//! This module provides the event-driven transport abstraction for the ACP
//! runtime, plus the two concrete backings (subprocess/current-process stdio
//! and HTTP).
//!
//! # Design
//!
//! - **Event-Driven**: transports deliver inbound traffic through a
//!   [`MessageHandler`] with exactly three events (`message`, `error`,
//!   `close`) instead of a blocking receive loop
//! - **Pre-configured handlers**: transports are constructed with their
//!   handler already set via their builders, so no message can arrive before
//!   a handler exists
//! - **Whole messages only**: each frame is parsed and validated before the
//!   handler sees it; a malformed frame either produces a `-32700` error
//!   response (when the request id is recoverable) or an `error` event

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use serde_json::Value;

// Layer 3: Internal module imports
use crate::protocol::{AcpError, JsonRpcMessage, JsonRpcResponse, ProtocolError, RequestId};

pub mod error;
pub mod http;
pub mod stdio;

pub use error::TransportError;
pub use http::{
    HttpClientTransport, HttpClientTransportBuilder, HttpServerTransport,
    HttpServerTransportBuilder, HttpTransportConfig,
};
pub use stdio::{
    StdioTransport, StdioTransportBuilder, SubprocessConfig, SubprocessTransport,
    SubprocessTransportBuilder,
};

/// Event-driven message handler trait
///
/// Defines the closed set of events a transport can deliver. The dispatcher
/// implements this trait; registering it via a transport builder is the only
/// way inbound traffic reaches protocol logic.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle an incoming, validated JSON-RPC message
    async fn handle_message(&self, message: JsonRpcMessage);

    /// Handle a transport-level error that did not produce a valid message
    async fn handle_error(&self, error: TransportError);

    /// Handle transport closure; delivered exactly once per transport
    async fn handle_close(&self);
}

/// ACP transport trait
///
/// Transports deliver framed messages to and from the remote peer and emit
/// `message | error | close` events through their pre-configured
/// [`MessageHandler`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start the transport and begin delivering inbound messages
    async fn start(&mut self) -> Result<(), TransportError>;

    /// Close the transport and release its resources
    ///
    /// Idempotent; the handler's `handle_close` fires exactly once no matter
    /// how often this is called or whether the peer closed first.
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Send a JSON-RPC message to the remote peer
    async fn send(&self, message: &JsonRpcMessage) -> Result<(), TransportError>;

    /// Whether the transport is currently connected
    fn is_connected(&self) -> bool;

    /// Static identifier for logging ("stdio", "subprocess", "http")
    fn transport_type(&self) -> &'static str;
}

/// Builder trait for creating pre-configured transports
///
/// The handler must be installed before the transport is built, eliminating
/// the window where messages could arrive with no handler registered.
pub trait TransportBuilder: Send + Sync {
    /// The transport type this builder creates
    type Transport: Transport + 'static;

    /// Install the message handler
    fn with_message_handler(self, handler: Arc<dyn MessageHandler>) -> Self;

    /// Build the transport with the configured handler
    fn build(
        self,
    ) -> impl std::future::Future<Output = Result<Self::Transport, TransportError>> + Send;
}

/// One-shot guard ensuring `handle_close` fires exactly once
///
/// Shared between a transport's `close()` method and its reader task, either
/// of which may observe closure first.
#[derive(Clone)]
pub(crate) struct CloseGuard {
    fired: Arc<AtomicBool>,
    connected: Arc<AtomicBool>,
    handler: Arc<dyn MessageHandler>,
}

impl CloseGuard {
    pub(crate) fn new(handler: Arc<dyn MessageHandler>) -> Self {
        Self {
            fired: Arc::new(AtomicBool::new(false)),
            connected: Arc::new(AtomicBool::new(false)),
            handler,
        }
    }

    pub(crate) fn mark_connected(&self) {
        self.connected.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && !self.fired.load(Ordering::SeqCst)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Fire the close event; only the first caller reaches the handler.
    pub(crate) async fn fire(&self) {
        if !self.fired.swap(true, Ordering::SeqCst) {
            self.connected.store(false, Ordering::SeqCst);
            self.handler.handle_close().await;
        }
    }
}

/// Decode one inbound frame, recovering a `-32700` error response when the
/// offending frame still carried a usable request id.
///
/// Returns:
/// - `Ok(message)` for a valid envelope
/// - `Err((Some(response), err))` when an error response can be sent back
/// - `Err((None, err))` when the failure can only surface as an `error` event
pub(crate) fn decode_frame(
    raw: &str,
) -> Result<JsonRpcMessage, (Option<JsonRpcResponse>, ProtocolError)> {
    match JsonRpcMessage::parse(raw) {
        Ok(message) => Ok(message),
        Err(err) => {
            let recovered_id = serde_json::from_str::<Value>(raw)
                .ok()
                .and_then(|value| value.get("id").cloned())
                .and_then(|id| serde_json::from_value::<RequestId>(id).ok());

            let response = recovered_id.map(|id| {
                JsonRpcResponse::error(
                    AcpError::parse_error(err.to_string()).to_error_object(),
                    Some(id),
                )
            });

            Err((response, err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingHandler {
        closes: AtomicUsize,
    }

    #[async_trait]
    impl MessageHandler for CountingHandler {
        async fn handle_message(&self, _message: JsonRpcMessage) {}
        async fn handle_error(&self, _error: TransportError) {}
        async fn handle_close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_close_guard_fires_once() {
        let handler = Arc::new(CountingHandler {
            closes: AtomicUsize::new(0),
        });
        let guard = CloseGuard::new(handler.clone());
        guard.mark_connected();
        assert!(guard.is_connected());

        guard.fire().await;
        guard.fire().await;
        guard.fire().await;

        assert!(!guard.is_connected());
        assert!(guard.is_closed());
        assert_eq!(handler.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_decode_frame_valid() {
        let msg = decode_frame(r#"{"jsonrpc":"2.0","method":"initialize","id":1}"#).unwrap();
        assert!(matches!(msg, JsonRpcMessage::Request(_)));
    }

    #[test]
    fn test_decode_frame_recoverable_id() {
        // Invalid envelope (bad version) but the id survives for an error response
        let (response, _err) =
            decode_frame(r#"{"jsonrpc":"1.0","method":"x","id":7}"#).unwrap_err();
        let response = response.unwrap();
        assert_eq!(response.id, Some(RequestId::new_number(7)));
        let error = response.error.unwrap();
        assert_eq!(error["code"], -32700);
    }

    #[test]
    fn test_decode_frame_unrecoverable() {
        let (response, _err) = decode_frame("not json at all").unwrap_err();
        assert!(response.is_none());
    }
}
