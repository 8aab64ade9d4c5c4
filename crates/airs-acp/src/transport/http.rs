//! HTTP Transport Implementations
//!
//! JSON-RPC over HTTP in both peer roles:
//!
//! - [`HttpClientTransport`] (client mode) POSTs each message to the
//!   configured URL + path; the response body is the JSON-RPC response.
//!   Transport-level failures are retried with exponential backoff
//!   (100 ms × 2^attempt, capped at 5 s); timeouts and method-level errors
//!   are never retried.
//! - [`HttpServerTransport`] (agent mode) runs an HTTP server on the
//!   configured host/port. Each inbound request is routed to the handler and
//!   the application's actual reply is correlated back to the inbound
//!   request id and returned as the HTTP response body. Notifications are
//!   acknowledged with `202 Accepted`.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use dashmap::DashMap;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, trace, warn};
use url::Url;

// Layer 3: Internal module imports
use crate::protocol::constants::defaults;
use crate::protocol::{AcpError, JsonRpcMessage, JsonRpcMessageTrait, JsonRpcResponse, RequestId};
use crate::transport::error::TransportError;
use crate::transport::{decode_frame, CloseGuard, MessageHandler, Transport, TransportBuilder};

/// Configuration shared by the HTTP transports
///
/// Recognized options: `url` (client), `host`/`port`/`https` (agent),
/// `path`, `headers`, `timeout`, `maxRetries`.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Full endpoint URL (client mode); overrides host/port/https
    pub url: Option<Url>,

    /// Host to bind (agent mode) or connect to when `url` is unset
    pub host: String,

    /// Port to bind (agent mode) or connect to when `url` is unset
    pub port: u16,

    /// Whether to use https when building the endpoint from host/port
    pub https: bool,

    /// Endpoint path
    pub path: String,

    /// Static headers passed through opaquely on every request
    pub headers: HashMap<String, String>,

    /// Per-request timeout
    pub timeout: Duration,

    /// Maximum retry attempts for transport-level failures
    pub max_retries: u32,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: defaults::HTTP_HOST.to_string(),
            port: defaults::HTTP_PORT,
            https: false,
            path: defaults::HTTP_PATH.to_string(),
            headers: HashMap::new(),
            timeout: Duration::from_millis(defaults::REQUEST_TIMEOUT_MS),
            max_retries: defaults::HTTP_MAX_RETRIES,
        }
    }
}

impl HttpTransportConfig {
    /// Resolve the endpoint URL for client mode
    pub fn endpoint(&self) -> Result<Url, TransportError> {
        let base = match &self.url {
            Some(url) => url.clone(),
            None => {
                let scheme = if self.https { "https" } else { "http" };
                let raw = format!("{scheme}://{host}:{port}", host = self.host, port = self.port);
                Url::parse(&raw)
                    .map_err(|e| TransportError::connection(format!("invalid endpoint: {e}")))?
            }
        };
        base.join(&self.path)
            .map_err(|e| TransportError::connection(format!("invalid endpoint path: {e}")))
    }

    fn header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (key, value) in &self.headers {
            match (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    map.insert(name, value);
                }
                _ => warn!(%key, "skipping invalid header"),
            }
        }
        map
    }
}

/// Exponential backoff for retry attempt `n`: 100 ms × 2^n, capped at 5 s.
fn backoff_delay(attempt: u32) -> Duration {
    let base = defaults::HTTP_RETRY_BASE_MS.saturating_mul(1u64 << attempt.min(16));
    Duration::from_millis(base.min(defaults::HTTP_RETRY_CAP_MS))
}

/// HTTP transport in client mode.
///
/// Each outbound message becomes one POST; the response body (when present)
/// is decoded and delivered to the handler like any inbound message.
pub struct HttpClientTransport {
    client: reqwest::Client,
    endpoint: Url,
    config: HttpTransportConfig,
    handler: Arc<dyn MessageHandler>,
    guard: CloseGuard,
}

impl HttpClientTransport {
    /// The configuration this transport was built from
    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }

    async fn post_with_retries(&self, body: String) -> Result<Option<String>, TransportError> {
        let mut attempt: u32 = 0;
        loop {
            let result = self
                .client
                .post(self.endpoint.clone())
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.clone())
                .send()
                .await;

            let retryable_error = match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let text = response.text().await.map_err(|e| {
                            TransportError::other(format!("failed to read response body: {e}"))
                        })?;
                        let trimmed = text.trim();
                        return Ok(if trimmed.is_empty() {
                            None
                        } else {
                            Some(trimmed.to_string())
                        });
                    }
                    if status.is_server_error() {
                        TransportError::other(format!("server error status: {status}"))
                    } else {
                        // 4xx responses are not transport failures; never retried
                        return Err(TransportError::other(format!(
                            "request rejected with status: {status}"
                        )));
                    }
                }
                Err(e) if e.is_timeout() => {
                    // Timeouts are never retried
                    return Err(TransportError::timeout(self.config.timeout.as_millis() as u64));
                }
                Err(e) => TransportError::connection(format!("HTTP request failed: {e}")),
            };

            if attempt >= self.config.max_retries {
                return Err(retryable_error);
            }

            let delay = backoff_delay(attempt);
            debug!(attempt, ?delay, "retrying HTTP request after transport failure");
            sleep(delay).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl Transport for HttpClientTransport {
    async fn start(&mut self) -> Result<(), TransportError> {
        self.guard.mark_connected();
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.guard.fire().await;
        Ok(())
    }

    async fn send(&self, message: &JsonRpcMessage) -> Result<(), TransportError> {
        if !self.guard.is_connected() {
            return Err(TransportError::closed());
        }

        let body = message.to_json()?;
        let reply = self.post_with_retries(body).await?;

        if let Some(reply) = reply {
            match decode_frame(&reply) {
                Ok(message) => self.handler.handle_message(message).await,
                Err((_, err)) => {
                    self.handler
                        .handle_error(TransportError::parse_error(err.to_string()))
                        .await;
                }
            }
        }

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.guard.is_connected()
    }

    fn transport_type(&self) -> &'static str {
        "http"
    }
}

/// Builder for [`HttpClientTransport`]
pub struct HttpClientTransportBuilder {
    config: HttpTransportConfig,
    handler: Option<Arc<dyn MessageHandler>>,
}

impl HttpClientTransportBuilder {
    /// Create a builder from a configuration
    pub fn new(config: HttpTransportConfig) -> Self {
        Self {
            config,
            handler: None,
        }
    }
}

impl TransportBuilder for HttpClientTransportBuilder {
    type Transport = HttpClientTransport;

    fn with_message_handler(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    fn build(
        self,
    ) -> impl std::future::Future<Output = Result<HttpClientTransport, TransportError>> + Send
    {
        async move {
            let handler = self.handler.ok_or_else(|| {
                TransportError::other("no message handler configured for HTTP transport")
            })?;
            let endpoint = self.config.endpoint()?;

            let client = reqwest::Client::builder()
                .timeout(self.config.timeout)
                .default_headers(self.config.header_map())
                .build()
                .map_err(|e| {
                    TransportError::connection(format!("failed to build HTTP client: {e}"))
                })?;

            let guard = CloseGuard::new(Arc::clone(&handler));

            Ok(HttpClientTransport {
                client,
                endpoint,
                config: self.config,
                handler,
                guard,
            })
        }
    }
}

/// Shared state of the agent-mode HTTP server
#[derive(Clone)]
struct ServerState {
    handler: Arc<dyn MessageHandler>,
    /// Inbound request ids awaiting the application's reply
    pending: Arc<DashMap<RequestId, oneshot::Sender<JsonRpcResponse>>>,
    reply_timeout: Duration,
}

/// HTTP transport in agent mode.
///
/// Serves the configured path; the application's reply to each inbound
/// request is returned as that request's HTTP response body, correlated by
/// the JSON-RPC id. Plain HTTP has no push channel, so agent-initiated
/// notifications are dropped with a warning and agent-initiated requests
/// are rejected from `send`.
pub struct HttpServerTransport {
    state: ServerState,
    config: HttpTransportConfig,
    guard: CloseGuard,
    server_task: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl HttpServerTransport {
    /// The socket address the server is bound to (after `start`)
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// The configuration this transport was built from
    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }
}

async fn serve_jsonrpc(State(state): State<ServerState>, body: String) -> impl IntoResponse {
    const JSON: [(HeaderName, &str); 1] = [(header::CONTENT_TYPE, "application/json")];

    let message = match decode_frame(&body) {
        Ok(message) => message,
        Err((Some(response), err)) => {
            warn!(%err, "malformed HTTP frame with recoverable id");
            let body = response.to_json().unwrap_or_default();
            return (StatusCode::OK, JSON, body);
        }
        Err((None, err)) => {
            warn!(%err, "unrecoverable malformed HTTP frame");
            let error = AcpError::parse_error(err.to_string()).to_error_object();
            let body = JsonRpcResponse::error(error, None).to_json().unwrap_or_default();
            return (StatusCode::BAD_REQUEST, JSON, body);
        }
    };

    match message {
        JsonRpcMessage::Request(request) => {
            let id = request.id.clone();
            let (tx, rx) = oneshot::channel();
            state.pending.insert(id.clone(), tx);

            state
                .handler
                .handle_message(JsonRpcMessage::Request(request))
                .await;

            match timeout(state.reply_timeout, rx).await {
                Ok(Ok(response)) => {
                    let body = response.to_json().unwrap_or_default();
                    (StatusCode::OK, JSON, body)
                }
                _ => {
                    state.pending.remove(&id);
                    let error = AcpError::timeout("no reply produced for inbound request")
                        .to_error_object();
                    let body = JsonRpcResponse::error(error, Some(id))
                        .to_json()
                        .unwrap_or_default();
                    (StatusCode::OK, JSON, body)
                }
            }
        }
        other => {
            // Notifications (and stray responses) produce no reply body
            state.handler.handle_message(other).await;
            (StatusCode::ACCEPTED, JSON, String::new())
        }
    }
}

#[async_trait]
impl Transport for HttpServerTransport {
    async fn start(&mut self) -> Result<(), TransportError> {
        if self.server_task.is_some() {
            return Ok(());
        }

        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port))
            .await
            .map_err(|e| {
                TransportError::connection(format!(
                    "failed to bind {}:{}: {e}",
                    self.config.host, self.config.port
                ))
            })?;
        self.local_addr = listener.local_addr().ok();

        let router = Router::new()
            .route(&self.config.path, post(serve_jsonrpc))
            .with_state(self.state.clone());

        debug!(addr = ?self.local_addr, path = %self.config.path, "HTTP server transport listening");

        self.server_task = Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                warn!(%e, "HTTP server terminated");
            }
        }));

        self.guard.mark_connected();
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(task) = self.server_task.take() {
            task.abort();
        }
        self.state.pending.clear();
        self.guard.fire().await;
        Ok(())
    }

    async fn send(&self, message: &JsonRpcMessage) -> Result<(), TransportError> {
        if !self.guard.is_connected() {
            return Err(TransportError::closed());
        }

        match message {
            JsonRpcMessage::Response(response) => {
                let Some(id) = response.id.clone() else {
                    trace!("dropping response without id");
                    return Ok(());
                };
                match self.state.pending.remove(&id) {
                    Some((_, tx)) => {
                        let _ = tx.send(response.clone());
                        Ok(())
                    }
                    None => {
                        trace!(%id, "dropping response for unknown inbound request");
                        Ok(())
                    }
                }
            }
            JsonRpcMessage::Notification(notification) => {
                // Plain HTTP has no push channel; fire-and-forget traffic is
                // dropped rather than failing the caller
                warn!(method = %notification.method, "dropping notification: HTTP server transport cannot push");
                Ok(())
            }
            JsonRpcMessage::Request(_) => Err(TransportError::other(
                "HTTP server transport can only reply to inbound requests",
            )),
        }
    }

    fn is_connected(&self) -> bool {
        self.guard.is_connected()
    }

    fn transport_type(&self) -> &'static str {
        "http"
    }
}

/// Builder for [`HttpServerTransport`]
pub struct HttpServerTransportBuilder {
    config: HttpTransportConfig,
    handler: Option<Arc<dyn MessageHandler>>,
}

impl HttpServerTransportBuilder {
    /// Create a builder from a configuration
    pub fn new(config: HttpTransportConfig) -> Self {
        Self {
            config,
            handler: None,
        }
    }
}

impl TransportBuilder for HttpServerTransportBuilder {
    type Transport = HttpServerTransport;

    fn with_message_handler(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    fn build(
        self,
    ) -> impl std::future::Future<Output = Result<HttpServerTransport, TransportError>> + Send
    {
        async move {
            let handler = self.handler.ok_or_else(|| {
                TransportError::other("no message handler configured for HTTP transport")
            })?;

            let guard = CloseGuard::new(Arc::clone(&handler));
            let state = ServerState {
                handler,
                pending: Arc::new(DashMap::new()),
                reply_timeout: self.config.timeout,
            };

            Ok(HttpServerTransport {
                state,
                config: self.config,
                guard,
                server_task: None,
                local_addr: None,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::JsonRpcRequest;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct RecordingHandler {
        messages: tokio::sync::mpsc::UnboundedSender<JsonRpcMessage>,
        errors: AtomicUsize,
    }

    #[async_trait]
    impl MessageHandler for RecordingHandler {
        async fn handle_message(&self, message: JsonRpcMessage) {
            let _ = self.messages.send(message);
        }
        async fn handle_error(&self, _error: TransportError) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
        async fn handle_close(&self) {}
    }

    fn recording_handler() -> (
        Arc<RecordingHandler>,
        tokio::sync::mpsc::UnboundedReceiver<JsonRpcMessage>,
    ) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (
            Arc::new(RecordingHandler {
                messages: tx,
                errors: AtomicUsize::new(0),
            }),
            rx,
        )
    }

    fn client_config(mock_uri: &str) -> HttpTransportConfig {
        HttpTransportConfig {
            url: Some(Url::parse(mock_uri).unwrap()),
            ..Default::default()
        }
    }

    #[test]
    fn test_backoff_schedule() {
        assert_eq!(backoff_delay(0), Duration::from_millis(100));
        assert_eq!(backoff_delay(1), Duration::from_millis(200));
        assert_eq!(backoff_delay(3), Duration::from_millis(800));
        // Capped at 5 s
        assert_eq!(backoff_delay(10), Duration::from_millis(5_000));
        assert_eq!(backoff_delay(30), Duration::from_millis(5_000));
    }

    #[test]
    fn test_endpoint_from_host_port() {
        let config = HttpTransportConfig::default();
        let endpoint = config.endpoint().unwrap();
        assert_eq!(endpoint.as_str(), "http://localhost:3000/jsonrpc");

        let https = HttpTransportConfig {
            https: true,
            port: 8443,
            ..Default::default()
        };
        assert_eq!(
            https.endpoint().unwrap().as_str(),
            "https://localhost:8443/jsonrpc"
        );
    }

    #[tokio::test]
    async fn test_client_delivers_response_body() {
        let mock_server = MockServer::start().await;
        let response = JsonRpcResponse::success(json!({"sessionId": "s1"}), RequestId::new_number(1));
        Mock::given(method("POST"))
            .and(path("/jsonrpc"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(response.to_json().unwrap()),
            )
            .mount(&mock_server)
            .await;

        let (handler, mut rx) = recording_handler();
        let mut transport = HttpClientTransportBuilder::new(client_config(&mock_server.uri()))
            .with_message_handler(Arc::clone(&handler) as Arc<dyn MessageHandler>)
            .build()
            .await
            .unwrap();
        transport.start().await.unwrap();

        let request = JsonRpcMessage::Request(JsonRpcRequest::new(
            "session/new",
            Some(json!({"workingDirectory": "/p"})),
            RequestId::new_number(1),
        ));
        transport.send(&request).await.unwrap();

        match rx.recv().await.unwrap() {
            JsonRpcMessage::Response(resp) => {
                assert_eq!(resp.id, Some(RequestId::new_number(1)));
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_client_retries_server_errors() {
        let mock_server = MockServer::start().await;
        // Two failures, then success
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&mock_server)
            .await;

        let (handler, _rx) = recording_handler();
        let mut transport = HttpClientTransportBuilder::new(client_config(&mock_server.uri()))
            .with_message_handler(handler)
            .build()
            .await
            .unwrap();
        transport.start().await.unwrap();

        let notification = JsonRpcMessage::from_notification(
            "session/cancel",
            Some(json!({"sessionId": "s1"})),
        );
        transport.send(&notification).await.unwrap();
    }

    #[tokio::test]
    async fn test_client_does_not_retry_client_errors() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&mock_server)
            .await;

        let (handler, _rx) = recording_handler();
        let mut transport = HttpClientTransportBuilder::new(client_config(&mock_server.uri()))
            .with_message_handler(handler)
            .build()
            .await
            .unwrap();
        transport.start().await.unwrap();

        let notification = JsonRpcMessage::from_notification("session/cancel", None);
        let result = transport.send(&notification).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_server_correlates_application_reply() {
        // The handler plays dispatcher: it replies through the transport's
        // pending map, which the HTTP response body must carry back.
        struct ReplyingHandler {
            pending: Arc<DashMap<RequestId, oneshot::Sender<JsonRpcResponse>>>,
        }

        #[async_trait]
        impl MessageHandler for ReplyingHandler {
            async fn handle_message(&self, message: JsonRpcMessage) {
                if let JsonRpcMessage::Request(request) = message {
                    let response =
                        JsonRpcResponse::success(json!({"protocolVersion": "1"}), request.id.clone());
                    if let Some((_, tx)) = self.pending.remove(&request.id) {
                        let _ = tx.send(response);
                    }
                }
            }
            async fn handle_error(&self, _error: TransportError) {}
            async fn handle_close(&self) {}
        }

        let pending: Arc<DashMap<RequestId, oneshot::Sender<JsonRpcResponse>>> =
            Arc::new(DashMap::new());
        let handler = Arc::new(ReplyingHandler {
            pending: Arc::clone(&pending),
        });

        let config = HttpTransportConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..Default::default()
        };
        let mut server = HttpServerTransportBuilder::new(config)
            .with_message_handler(handler)
            .build()
            .await
            .unwrap();
        // Share the transport's own pending map with the test handler
        server.state.pending = Arc::clone(&pending);
        server.start().await.unwrap();

        let addr = server.local_addr().unwrap();
        let body = JsonRpcRequest::new("initialize", Some(json!({})), RequestId::new_number(1))
            .to_json()
            .unwrap();

        let client = reqwest::Client::new();
        let response = client
            .post(format!("http://{addr}/jsonrpc"))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let reply: JsonRpcResponse =
            serde_json::from_str(&response.text().await.unwrap()).unwrap();
        assert_eq!(reply.id, Some(RequestId::new_number(1)));
        assert_eq!(reply.result.unwrap()["protocolVersion"], "1");

        server.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_server_accepts_notifications_with_202() {
        let (handler, mut rx) = recording_handler();
        let config = HttpTransportConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..Default::default()
        };
        let mut server = HttpServerTransportBuilder::new(config)
            .with_message_handler(Arc::clone(&handler) as Arc<dyn MessageHandler>)
            .build()
            .await
            .unwrap();
        server.start().await.unwrap();

        let addr = server.local_addr().unwrap();
        let body = JsonRpcMessage::from_notification(
            "session/cancel",
            Some(json!({"sessionId": "s1"})),
        )
        .to_json()
        .unwrap();

        let response = reqwest::Client::new()
            .post(format!("http://{addr}/jsonrpc"))
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 202);

        assert!(matches!(
            rx.recv().await.unwrap(),
            JsonRpcMessage::Notification(_)
        ));

        server.close().await.unwrap();
    }
}
