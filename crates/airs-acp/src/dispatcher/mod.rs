//! Protocol Dispatcher
//!
//! The dispatcher is the hinge between the transport and the protocol
//! logic. Each peer is both client and server to the other, so a single
//! dispatcher carries two handler maps (`request_handlers`,
//! `notification_handlers`) and a pending-request table for its own
//! outbound requests.
//!
//! Inbound routing:
//! - a `Response` with a known id resolves the pending waiter; unknown or
//!   null ids are logged and dropped
//! - a `Request` is served by its registered handler (spawned, so slow
//!   handlers never stall the transport reader); missing handler produces a
//!   `MethodNotFound` error response
//! - a `Notification` is dispatched inline, preserving transport-receive
//!   order for the session update stream; missing handler drops it silently
//!
//! Transport close fails every pending waiter with `TransportClosed` and
//! runs the registered close listeners exactly once.

// Layer 1: Standard library imports
use std::future::Future;
use std::sync::{Arc, Weak};

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use chrono::TimeDelta;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, trace, warn};

// Layer 3: Internal module imports
use crate::correlation::{CorrelationConfig, CorrelationError, CorrelationManager};
use crate::protocol::constants::defaults;
use crate::protocol::{
    AcpError, AcpResult, JsonRpcMessage, JsonRpcRequest, JsonRpcResponse,
};
use crate::transport::{MessageHandler, Transport, TransportError};

/// Handler for an inbound request method
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Serve one request; the returned value becomes the response `result`,
    /// the error becomes the response error object.
    async fn handle(&self, params: Option<Value>) -> AcpResult<Value>;
}

/// Handler for an inbound notification method
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    /// Consume one notification. Failures are logged and discarded; no
    /// response is ever generated for a notification.
    async fn handle(&self, params: Option<Value>) -> AcpResult<()>;
}

/// Listener invoked exactly once when the transport closes
#[async_trait]
pub trait CloseListener: Send + Sync {
    /// React to transport closure (deactivate sessions, release terminals).
    async fn on_transport_close(&self);
}

struct FnRequestHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> RequestHandler for FnRequestHandler<F>
where
    F: Fn(Option<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = AcpResult<Value>> + Send,
{
    async fn handle(&self, params: Option<Value>) -> AcpResult<Value> {
        (self.f)(params).await
    }
}

struct FnNotificationHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> NotificationHandler for FnNotificationHandler<F>
where
    F: Fn(Option<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = AcpResult<()>> + Send,
{
    async fn handle(&self, params: Option<Value>) -> AcpResult<()> {
        (self.f)(params).await
    }
}

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Default deadline for outbound requests, in milliseconds
    pub request_timeout_ms: u64,

    /// Cap on the pending-request table; exceeding it yields `RateLimited`
    pub max_pending_requests: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: defaults::REQUEST_TIMEOUT_MS,
            max_pending_requests: defaults::MAX_PENDING_REQUESTS,
        }
    }
}

/// Protocol dispatcher: pending-request table plus bidirectional handler
/// registry, bound to one transport.
pub struct ProtocolDispatcher {
    transport: RwLock<Option<Box<dyn Transport>>>,
    correlation: CorrelationManager,
    request_handlers: DashMap<String, Arc<dyn RequestHandler>>,
    notification_handlers: DashMap<String, Arc<dyn NotificationHandler>>,
    close_listeners: std::sync::RwLock<Vec<Arc<dyn CloseListener>>>,
    default_timeout: TimeDelta,
}

impl ProtocolDispatcher {
    /// Create a dispatcher; returns an `Arc` so the transport-facing
    /// [`MessageHandler`] can hold a weak reference back to it.
    pub fn new(config: DispatcherConfig) -> Arc<Self> {
        let correlation = CorrelationManager::new(CorrelationConfig {
            default_timeout: TimeDelta::milliseconds(config.request_timeout_ms as i64),
            max_pending_requests: config.max_pending_requests,
            ..Default::default()
        });

        Arc::new(Self {
            transport: RwLock::new(None),
            correlation,
            request_handlers: DashMap::new(),
            notification_handlers: DashMap::new(),
            close_listeners: std::sync::RwLock::new(Vec::new()),
            default_timeout: TimeDelta::milliseconds(config.request_timeout_ms as i64),
        })
    }

    /// The handler to install on a transport builder
    ///
    /// Holds only a weak reference, so dropping the dispatcher tears the
    /// whole peer down even while the transport still owns its handler.
    pub fn message_handler(self: &Arc<Self>) -> Arc<dyn MessageHandler> {
        Arc::new(DispatcherHandler {
            dispatcher: Arc::downgrade(self),
        })
    }

    /// Attach the transport this dispatcher writes to
    pub async fn attach_transport(&self, transport: Box<dyn Transport>) {
        *self.transport.write().await = Some(transport);
    }

    /// Start the attached transport
    pub async fn start(&self) -> AcpResult<()> {
        let mut guard = self.transport.write().await;
        match guard.as_mut() {
            Some(transport) => transport
                .start()
                .await
                .map_err(|e| AcpError::internal_error(format!("transport start failed: {e}"))),
            None => Err(AcpError::internal_error("no transport attached")),
        }
    }

    /// Close the transport and shut the dispatcher down
    pub async fn close(&self) {
        let mut guard = self.transport.write().await;
        if let Some(transport) = guard.as_mut() {
            if let Err(e) = transport.close().await {
                warn!(%e, "error closing transport");
            }
        }
        drop(guard);
        self.correlation.shutdown().await;
    }

    /// Whether the attached transport is connected
    pub async fn is_connected(&self) -> bool {
        match self.transport.read().await.as_ref() {
            Some(transport) => transport.is_connected(),
            None => false,
        }
    }

    /// Register a handler for an inbound request method
    ///
    /// Registering a handler is the only way to receive a method; the last
    /// registration for a method wins.
    pub fn register_request_handler(
        &self,
        method: impl Into<String>,
        handler: Arc<dyn RequestHandler>,
    ) {
        self.request_handlers.insert(method.into(), handler);
    }

    /// Register a handler for an inbound notification method
    pub fn register_notification_handler(
        &self,
        method: impl Into<String>,
        handler: Arc<dyn NotificationHandler>,
    ) {
        self.notification_handlers.insert(method.into(), handler);
    }

    /// Register an async closure as a request handler
    pub fn register_request_fn<F, Fut>(&self, method: impl Into<String>, f: F)
    where
        F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AcpResult<Value>> + Send + 'static,
    {
        self.register_request_handler(method, Arc::new(FnRequestHandler { f }));
    }

    /// Register an async closure as a notification handler
    pub fn register_notification_fn<F, Fut>(&self, method: impl Into<String>, f: F)
    where
        F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AcpResult<()>> + Send + 'static,
    {
        self.register_notification_handler(method, Arc::new(FnNotificationHandler { f }));
    }

    /// Subscribe to transport closure
    pub fn add_close_listener(&self, listener: Arc<dyn CloseListener>) {
        if let Ok(mut listeners) = self.close_listeners.write() {
            listeners.push(listener);
        }
    }

    /// Send a request with the default timeout and await its result
    pub async fn send_request(&self, method: &str, params: Option<Value>) -> AcpResult<Value> {
        self.send_request_with_timeout(method, params, None).await
    }

    /// Send a request with an explicit timeout and await its result
    ///
    /// Exactly one of three things resolves the returned future: the
    /// matching response, the deadline (`Timeout`, -32010), or transport
    /// closure.
    pub async fn send_request_with_timeout(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Option<TimeDelta>,
    ) -> AcpResult<Value> {
        let timeout = timeout.or(Some(self.default_timeout));
        let (request_id, receiver) = self
            .correlation
            .register_request(timeout, method)
            .map_err(AcpError::from)?;

        let request = JsonRpcMessage::Request(JsonRpcRequest::new(
            method,
            params,
            request_id.clone(),
        ));

        if let Err(e) = self.write_message(&request).await {
            // Never leave an orphaned entry behind a failed write
            let _ = self.correlation.cancel_request(&request_id);
            return Err(transport_write_error(e));
        }

        let outcome = receiver.await.map_err(|_| {
            AcpError::internal_error("correlation channel dropped before resolution")
        })?;

        let response = outcome.map_err(AcpError::from)?;
        match response.error {
            Some(error) => Err(AcpError::from_error_object(&error)),
            None => Ok(response.result.unwrap_or(Value::Null)),
        }
    }

    /// Send a notification; fire-and-forget
    pub async fn send_notification(&self, method: &str, params: Option<Value>) -> AcpResult<()> {
        let notification = JsonRpcMessage::from_notification(method, params);
        self.write_message(&notification)
            .await
            .map_err(transport_write_error)?;
        Ok(())
    }

    /// Send a response to an inbound request
    pub async fn send_response(&self, response: JsonRpcResponse) {
        let message = JsonRpcMessage::Response(response);
        if let Err(e) = self.write_message(&message).await {
            warn!(%e, "failed to write response");
        }
    }

    async fn write_message(&self, message: &JsonRpcMessage) -> Result<(), TransportError> {
        let guard = self.transport.read().await;
        match guard.as_ref() {
            Some(transport) => transport.send(message).await,
            None => Err(TransportError::closed()),
        }
    }

    async fn dispatch_request(self: Arc<Self>, request: JsonRpcRequest) {
        let handler = self.request_handlers.get(&request.method).map(|h| Arc::clone(h.value()));

        let response = match handler {
            Some(handler) => match handler.handle(request.params).await {
                Ok(result) => JsonRpcResponse::success(result, request.id),
                Err(error) => {
                    debug!(method = %request.method, code = error.code, "handler returned error");
                    JsonRpcResponse::error(error.to_error_object(), Some(request.id))
                }
            },
            None => {
                debug!(method = %request.method, "no handler registered");
                JsonRpcResponse::error(
                    AcpError::method_not_found(&request.method).to_error_object(),
                    Some(request.id),
                )
            }
        };

        self.send_response(response).await;
    }

    async fn dispatch_notification(&self, method: &str, params: Option<Value>) {
        let handler = self
            .notification_handlers
            .get(method)
            .map(|h| Arc::clone(h.value()));

        match handler {
            Some(handler) => {
                if let Err(error) = handler.handle(params).await {
                    // Logged and discarded; notifications never get a response
                    warn!(%method, %error, "notification handler failed");
                }
            }
            None => trace!(%method, "dropping notification with no handler"),
        }
    }

    async fn on_close(&self) {
        self.correlation.fail_all_closed();
        let listeners = match self.close_listeners.read() {
            Ok(listeners) => listeners.clone(),
            Err(_) => Vec::new(),
        };
        for listener in listeners {
            listener.on_transport_close().await;
        }
    }
}

/// Transport-facing adapter routing the three transport events into the
/// dispatcher.
struct DispatcherHandler {
    dispatcher: Weak<ProtocolDispatcher>,
}

#[async_trait]
impl MessageHandler for DispatcherHandler {
    async fn handle_message(&self, message: JsonRpcMessage) {
        let Some(dispatcher) = self.dispatcher.upgrade() else {
            return;
        };

        match message {
            JsonRpcMessage::Response(response) => match response.id.clone() {
                Some(id) => {
                    if let Err(CorrelationError::RequestNotFound { .. }) =
                        dispatcher.correlation.correlate_response(&id, Ok(response))
                    {
                        trace!(%id, "dropping response for unknown or expired request");
                    }
                }
                None => trace!("dropping response with null id"),
            },
            JsonRpcMessage::Request(request) => {
                // Served concurrently; responses may leave in any order
                tokio::spawn(Arc::clone(&dispatcher).dispatch_request(request));
            }
            JsonRpcMessage::Notification(notification) => {
                // Inline, to preserve transport-receive order for updates
                dispatcher
                    .dispatch_notification(&notification.method, notification.params)
                    .await;
            }
        }
    }

    async fn handle_error(&self, error: TransportError) {
        // Protocol violations never terminate the peer
        warn!(%error, "transport error");
    }

    async fn handle_close(&self) {
        if let Some(dispatcher) = self.dispatcher.upgrade() {
            dispatcher.on_close().await;
        }
    }
}

fn transport_write_error(error: TransportError) -> AcpError {
    match error {
        TransportError::Closed => AcpError::internal_error("transport closed"),
        TransportError::Timeout { duration_ms } => {
            AcpError::timeout(format!("transport timeout after {duration_ms}ms"))
        }
        other => AcpError::internal_error(format!("transport failure: {other}")),
    }
}
