//! STDIO Transport Implementations
//!
//! Newline-delimited JSON over standard streams, in both peer roles:
//!
//! - [`StdioTransport`] (agent mode) speaks over the current process's
//!   stdin/stdout; the editor that spawned us owns the other end.
//! - [`SubprocessTransport`] (client mode) spawns the agent as a child
//!   process with piped stdio and drains its stderr to the log sink.
//!
//! # Message Framing
//!
//! - Each message is a single line terminated by `\n`
//! - Messages are parsed and validated before reaching the handler
//! - A malformed frame with a recoverable id is answered with a `-32700`
//!   error response; otherwise it surfaces as an `error` event

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

// Layer 3: Internal module imports
use crate::protocol::constants::defaults;
use crate::protocol::{JsonRpcMessage, JsonRpcMessageTrait};
use crate::transport::{decode_frame, CloseGuard, MessageHandler, Transport, TransportBuilder};
use crate::transport::error::TransportError;

/// Default maximum message size (1MB)
const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Shared writer half of a stdio-style transport
type SharedWriter = Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>;

/// Write one framed message (JSON + `\n`) to the shared writer.
async fn write_frame(
    writer: &SharedWriter,
    message: &JsonRpcMessage,
    max_message_size: usize,
) -> Result<(), TransportError> {
    let json = message.to_json()?;

    if json.len() > max_message_size {
        return Err(TransportError::message_too_large(
            json.len(),
            max_message_size,
        ));
    }
    if json.contains('\n') {
        return Err(TransportError::format(
            "message contains embedded newlines, which violates newline-delimited framing",
        ));
    }

    let mut writer = writer.lock().await;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Reader loop shared by both stdio transports.
///
/// Reads newline-delimited frames until EOF or an I/O error, delivering each
/// validated message to the handler. Parse failures with a recoverable id
/// are answered through `writer`; everything else becomes an `error` event.
async fn read_loop<R>(
    reader: R,
    writer: SharedWriter,
    handler: Arc<dyn MessageHandler>,
    guard: CloseGuard,
    max_message_size: usize,
) where
    R: AsyncRead + Unpin + Send,
{
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("stdio reader reached EOF");
                break;
            }
            Ok(_) => {
                if line.len() > max_message_size {
                    handler
                        .handle_error(TransportError::message_too_large(
                            line.len(),
                            max_message_size,
                        ))
                        .await;
                    continue;
                }

                let frame = line.trim();
                if frame.is_empty() {
                    continue;
                }

                match decode_frame(frame) {
                    Ok(message) => handler.handle_message(message).await,
                    Err((Some(response), err)) => {
                        warn!(%err, "malformed frame with recoverable id, answering -32700");
                        let reply = JsonRpcMessage::Response(response);
                        if let Err(write_err) =
                            write_frame(&writer, &reply, max_message_size).await
                        {
                            handler.handle_error(write_err).await;
                        }
                    }
                    Err((None, err)) => {
                        warn!(%err, "unrecoverable malformed frame");
                        handler
                            .handle_error(TransportError::parse_error(err.to_string()))
                            .await;
                    }
                }
            }
            Err(e) => {
                handler.handle_error(TransportError::from(e)).await;
                break;
            }
        }
    }

    guard.fire().await;
}

/// STDIO transport in agent mode.
///
/// Reads frames from the current process's stdin and writes to its stdout.
/// This is the standard transport for an agent launched by an editor.
pub struct StdioTransport {
    writer: SharedWriter,
    handler: Arc<dyn MessageHandler>,
    guard: CloseGuard,
    reader_task: Option<JoinHandle<()>>,
    max_message_size: usize,
}

impl StdioTransport {
    fn new(handler: Arc<dyn MessageHandler>, max_message_size: usize) -> Self {
        let guard = CloseGuard::new(Arc::clone(&handler));
        Self {
            writer: Arc::new(Mutex::new(Box::new(tokio::io::stdout()))),
            handler,
            guard,
            reader_task: None,
            max_message_size,
        }
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn start(&mut self) -> Result<(), TransportError> {
        if self.reader_task.is_some() {
            return Ok(());
        }

        self.guard.mark_connected();

        let writer = Arc::clone(&self.writer);
        let handler = Arc::clone(&self.handler);
        let guard = self.guard.clone();
        let max_message_size = self.max_message_size;

        self.reader_task = Some(tokio::spawn(async move {
            read_loop(
                tokio::io::stdin(),
                writer,
                handler,
                guard,
                max_message_size,
            )
            .await;
        }));

        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }

        // Flush pending output; stdin/stdout are owned by the process, so
        // there is nothing further to tear down.
        {
            let mut writer = self.writer.lock().await;
            let _ = writer.flush().await;
        }

        self.guard.fire().await;
        Ok(())
    }

    async fn send(&self, message: &JsonRpcMessage) -> Result<(), TransportError> {
        if !self.guard.is_connected() {
            return Err(TransportError::closed());
        }
        write_frame(&self.writer, message, self.max_message_size).await
    }

    fn is_connected(&self) -> bool {
        self.guard.is_connected()
    }

    fn transport_type(&self) -> &'static str {
        "stdio"
    }
}

/// Builder for [`StdioTransport`]
pub struct StdioTransportBuilder {
    handler: Option<Arc<dyn MessageHandler>>,
    max_message_size: usize,
}

impl StdioTransportBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            handler: None,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    /// Override the maximum message size
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }
}

impl Default for StdioTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportBuilder for StdioTransportBuilder {
    type Transport = StdioTransport;

    fn with_message_handler(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    fn build(
        self,
    ) -> impl std::future::Future<Output = Result<StdioTransport, TransportError>> + Send {
        async move {
            let handler = self.handler.ok_or_else(|| {
                TransportError::other("no message handler configured for stdio transport")
            })?;
            Ok(StdioTransport::new(handler, self.max_message_size))
        }
    }
}

/// Configuration for [`SubprocessTransport`]
///
/// Mirrors the recognized stdio transport options: `command`, `args`, `env`,
/// `cwd`, and the request `timeout` consumed by the dispatcher layer.
#[derive(Debug, Clone)]
pub struct SubprocessConfig {
    /// Command to execute for the agent process
    pub command: String,

    /// Arguments to pass to the command
    pub args: Vec<String>,

    /// Environment variables overlaid on the parent environment
    pub env: HashMap<String, String>,

    /// Working directory for the child process
    pub cwd: Option<PathBuf>,

    /// Default request timeout handed to the dispatcher (milliseconds)
    pub timeout_ms: u64,

    /// Maximum size of a single framed message
    pub max_message_size: usize,
}

impl Default for SubprocessConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
            timeout_ms: defaults::REQUEST_TIMEOUT_MS,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

/// STDIO transport in client mode.
///
/// Spawns the agent as a child process, frames messages over its piped
/// stdin/stdout, and drains stderr to the log sink. On close the child gets
/// SIGTERM, then SIGKILL after a 5-second grace period.
pub struct SubprocessTransport {
    child: Option<Child>,
    writer: SharedWriter,
    guard: CloseGuard,
    reader_task: Option<JoinHandle<()>>,
    stderr_task: Option<JoinHandle<()>>,
    config: SubprocessConfig,
}

impl SubprocessTransport {
    /// OS process id of the spawned agent, if it is still running
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// The configuration this transport was built from
    pub fn config(&self) -> &SubprocessConfig {
        &self.config
    }
}

#[async_trait]
impl Transport for SubprocessTransport {
    async fn start(&mut self) -> Result<(), TransportError> {
        // Spawning happens in the builder; start only wires the reader.
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }

        if let Some(mut child) = self.child.take() {
            // Graceful termination first, force-kill after the grace period.
            if let Some(pid) = child.id() {
                if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                    debug!(%e, "SIGTERM delivery failed (process may have exited)");
                }
            }

            let grace = Duration::from_millis(defaults::SUBPROCESS_KILL_GRACE_MS);
            match timeout(grace, child.wait()).await {
                Ok(Ok(status)) => debug!(?status, "agent process exited"),
                Ok(Err(e)) => warn!(%e, "error waiting for agent process"),
                Err(_) => {
                    warn!("agent process ignored SIGTERM, force-killing");
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                }
            }
        }

        if let Some(task) = self.stderr_task.take() {
            // Let the stderr drain finish naturally once the pipe closes.
            let _ = timeout(Duration::from_millis(100), task).await;
        }

        self.guard.fire().await;
        Ok(())
    }

    async fn send(&self, message: &JsonRpcMessage) -> Result<(), TransportError> {
        if !self.guard.is_connected() {
            return Err(TransportError::closed());
        }
        write_frame(&self.writer, message, self.config.max_message_size).await
    }

    fn is_connected(&self) -> bool {
        self.guard.is_connected()
    }

    fn transport_type(&self) -> &'static str {
        "subprocess"
    }
}

/// Builder for [`SubprocessTransport`]
///
/// # Examples
///
/// ```rust,no_run
/// use airs_acp::transport::{SubprocessTransportBuilder, TransportBuilder, Transport};
/// # use airs_acp::transport::{MessageHandler, TransportError};
/// # use airs_acp::protocol::JsonRpcMessage;
/// # use async_trait::async_trait;
/// # use std::sync::Arc;
/// # struct NullHandler;
/// # #[async_trait]
/// # impl MessageHandler for NullHandler {
/// #     async fn handle_message(&self, _m: JsonRpcMessage) {}
/// #     async fn handle_error(&self, _e: TransportError) {}
/// #     async fn handle_close(&self) {}
/// # }
///
/// # async fn example() -> Result<(), TransportError> {
/// let mut transport = SubprocessTransportBuilder::new()
///     .command("my-agent")
///     .arg("--acp")
///     .env_var("RUST_LOG", "info")
///     .with_message_handler(Arc::new(NullHandler))
///     .build()
///     .await?;
///
/// transport.start().await?;
/// # Ok(())
/// # }
/// ```
pub struct SubprocessTransportBuilder {
    config: SubprocessConfig,
    handler: Option<Arc<dyn MessageHandler>>,
}

impl SubprocessTransportBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: SubprocessConfig::default(),
            handler: None,
        }
    }

    /// Set the command to execute for the agent process
    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.config.command = command.into();
        self
    }

    /// Set the arguments to pass to the command
    pub fn args(mut self, args: Vec<String>) -> Self {
        self.config.args = args;
        self
    }

    /// Add a single argument to the command
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.config.args.push(arg.into());
        self
    }

    /// Set an environment variable for the child process
    pub fn env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.env.insert(key.into(), value.into());
        self
    }

    /// Set the working directory for the child process
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.cwd = Some(dir.into());
        self
    }

    /// Set the default request timeout in milliseconds
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.timeout_ms = timeout_ms;
        self
    }

    /// Build from an existing configuration
    pub fn from_config(config: SubprocessConfig) -> Self {
        Self {
            config,
            handler: None,
        }
    }
}

impl Default for SubprocessTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportBuilder for SubprocessTransportBuilder {
    type Transport = SubprocessTransport;

    fn with_message_handler(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    fn build(
        self,
    ) -> impl std::future::Future<Output = Result<SubprocessTransport, TransportError>> + Send
    {
        async move {
            let handler = self.handler.ok_or_else(|| {
                TransportError::other("no message handler configured for subprocess transport")
            })?;

            if self.config.command.is_empty() {
                return Err(TransportError::other(
                    "no command specified for subprocess transport",
                ));
            }

            let mut command = Command::new(&self.config.command);
            command
                .args(&self.config.args)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);

            for (key, value) in &self.config.env {
                command.env(key, value);
            }
            if let Some(dir) = &self.config.cwd {
                command.current_dir(dir);
            }

            let mut child = command.spawn().map_err(|e| {
                TransportError::connection(format!(
                    "failed to spawn agent process '{}': {e}",
                    self.config.command
                ))
            })?;

            let stdin = child.stdin.take().ok_or_else(|| {
                TransportError::connection("failed to get stdin handle from agent process")
            })?;
            let stdout = child.stdout.take().ok_or_else(|| {
                TransportError::connection("failed to get stdout handle from agent process")
            })?;
            let stderr = child.stderr.take().ok_or_else(|| {
                TransportError::connection("failed to get stderr handle from agent process")
            })?;

            let writer: SharedWriter = Arc::new(Mutex::new(Box::new(stdin)));
            let guard = CloseGuard::new(Arc::clone(&handler));
            guard.mark_connected();

            let reader_task = {
                let writer = Arc::clone(&writer);
                let handler = Arc::clone(&handler);
                let guard = guard.clone();
                let max_message_size = self.config.max_message_size;
                tokio::spawn(async move {
                    read_loop(stdout, writer, handler, guard, max_message_size).await;
                })
            };

            // Drain stderr line by line into the log sink.
            let stderr_task = tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!(target: "airs_acp::agent_stderr", "{line}");
                }
            });

            Ok(SubprocessTransport {
                child: Some(child),
                writer,
                guard,
                reader_task: Some(reader_task),
                stderr_task: Some(stderr_task),
                config: self.config,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{JsonRpcNotification, RequestId};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    struct RecordingHandler {
        messages: mpsc::UnboundedSender<JsonRpcMessage>,
        closes: AtomicUsize,
    }

    #[async_trait]
    impl MessageHandler for RecordingHandler {
        async fn handle_message(&self, message: JsonRpcMessage) {
            let _ = self.messages.send(message);
        }
        async fn handle_error(&self, _error: TransportError) {}
        async fn handle_close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn recording_handler() -> (Arc<RecordingHandler>, mpsc::UnboundedReceiver<JsonRpcMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(RecordingHandler {
                messages: tx,
                closes: AtomicUsize::new(0),
            }),
            rx,
        )
    }

    #[tokio::test]
    async fn test_stdio_builder_requires_handler() {
        let result = StdioTransportBuilder::new().build().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_subprocess_builder_requires_command() {
        let (handler, _rx) = recording_handler();
        let result = SubprocessTransportBuilder::new()
            .with_message_handler(handler)
            .build()
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_subprocess_round_trip_with_cat() {
        // `cat` echoes every frame back unchanged, exercising framing both ways.
        let (handler, mut rx) = recording_handler();
        let mut transport = SubprocessTransportBuilder::new()
            .command("cat")
            .with_message_handler(Arc::clone(&handler) as Arc<dyn MessageHandler>)
            .build()
            .await
            .unwrap();

        transport.start().await.unwrap();
        assert!(transport.is_connected());
        assert!(transport.pid().is_some());

        let notification = JsonRpcMessage::Notification(JsonRpcNotification::new(
            "session/update",
            Some(serde_json::json!({"sessionId": "s1"})),
        ));
        transport.send(&notification).await.unwrap();

        let echoed = rx.recv().await.unwrap();
        assert_eq!(echoed, notification);

        transport.close().await.unwrap();
        assert!(!transport.is_connected());
        assert_eq!(handler.closes.load(Ordering::SeqCst), 1);

        // Idempotent close: the event does not fire twice
        transport.close().await.unwrap();
        assert_eq!(handler.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_subprocess_eof_fires_close() {
        let (handler, _rx) = recording_handler();
        let mut transport = SubprocessTransportBuilder::new()
            .command("true")
            .with_message_handler(Arc::clone(&handler) as Arc<dyn MessageHandler>)
            .build()
            .await
            .unwrap();
        transport.start().await.unwrap();

        // `true` exits immediately; the reader observes EOF and fires close.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(handler.closes.load(Ordering::SeqCst), 1);
        assert!(!transport.is_connected());

        let notification =
            JsonRpcMessage::Notification(JsonRpcNotification::new("session/update", None));
        let result = transport.send(&notification).await;
        assert!(matches!(result, Err(TransportError::Closed)));

        transport.close().await.unwrap();
        assert_eq!(handler.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_malformed_frame_gets_parse_error_response() {
        // An agent that emits one malformed frame carrying an id, then waits.
        let (handler, _rx) = recording_handler();
        let mut transport = SubprocessTransportBuilder::new()
            .command("sh")
            .args(vec![
                "-c".to_string(),
                r#"echo '{"jsonrpc":"1.0","method":"x","id":9}'; read reply; echo "$reply" 1>&2"#
                    .to_string(),
            ])
            .with_message_handler(Arc::clone(&handler) as Arc<dyn MessageHandler>)
            .build()
            .await
            .unwrap();
        transport.start().await.unwrap();

        // The reader answers the malformed frame with a -32700 response on the
        // child's stdin; nothing reaches handle_message.
        tokio::time::sleep(Duration::from_millis(300)).await;
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_oversized_message_rejected() {
        let writer: SharedWriter = Arc::new(Mutex::new(Box::new(Vec::<u8>::new())));
        let big = JsonRpcMessage::Notification(JsonRpcNotification::new(
            "session/update",
            Some(serde_json::json!({"blob": "x".repeat(256)})),
        ));

        let result = write_frame(&writer, &big, 64).await;
        assert!(matches!(
            result,
            Err(TransportError::MessageTooLarge { .. })
        ));

        // Nothing was written for the rejected frame
        let small =
            JsonRpcMessage::Notification(JsonRpcNotification::new("session/update", None));
        write_frame(&writer, &small, 1024).await.unwrap();
    }

    #[tokio::test]
    async fn test_request_id_survives_echo() {
        let (handler, mut rx) = recording_handler();
        let mut transport = SubprocessTransportBuilder::new()
            .command("cat")
            .with_message_handler(Arc::clone(&handler) as Arc<dyn MessageHandler>)
            .build()
            .await
            .unwrap();
        transport.start().await.unwrap();

        let request = JsonRpcMessage::from_request(
            "initialize",
            Some(serde_json::json!({"protocolVersion": "1"})),
            RequestId::new_number(1),
        );
        transport.send(&request).await.unwrap();

        match rx.recv().await.unwrap() {
            JsonRpcMessage::Request(req) => assert_eq!(req.id, RequestId::new_number(1)),
            other => panic!("expected request, got {other:?}"),
        }

        transport.close().await.unwrap();
    }
}
