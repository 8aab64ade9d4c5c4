//! Agent Façade
//!
//! The agent peer: owns the dispatcher, the session registry, and the
//! handler slots for `initialize` and the `session/*` methods. The
//! application supplies a [`PromptHandler`]; everything it needs during a
//! turn flows through the [`AgentSession`] handle.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, warn};

// Layer 3: Internal module imports
use crate::dispatcher::{DispatcherConfig, ProtocolDispatcher};
use crate::integration::handler::PromptHandler;
use crate::integration::parse_params;
use crate::protocol::constants::{defaults, methods};
use crate::protocol::{
    AcpError, AcpResult, AvailableCommand, AvailableCommandsUpdate, CancelNotification,
    ConfigOptionUpdate, ContentBlock, CreateTerminalRequest, CreateTerminalResponse,
    CurrentModeUpdate, InitializeRequest, InitializeResponse, KillTerminalRequest, MessageChunk,
    NewSessionRequest, PeerCapabilities, PermissionOutcome, PermissionRequest, PlanEntry,
    PlanUpdate, PromptCapabilities, PromptRequest, PromptResponse, ReadTextFileRequest,
    ReadTextFileResponse, ReleaseTerminalRequest, ReleaseTerminalResponse, SessionConfigOption,
    SessionId, SessionMode, SessionNotification, SessionUpdate, SetConfigOptionRequest,
    SetModeRequest, TerminalExitStatus, TerminalId, TerminalOutputRequest,
    TerminalOutputResponse, WaitForExitRequest, WriteTextFileRequest,
};
use crate::session::{Session, SessionRegistry};
use crate::toolcall::{ToolCallBuilder, ToolCallHandle, ToolCallSink};
use crate::transport::{
    HttpServerTransportBuilder, HttpTransportConfig, StdioTransportBuilder, Transport,
    TransportBuilder,
};

fn to_result_value<T: serde::Serialize>(value: &T) -> AcpResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| AcpError::internal_error(format!("serialization failed: {e}")))
}

/// Agent configuration: announced capabilities plus the tables every new
/// session starts with.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Protocol version announced during `initialize`
    pub protocol_version: String,

    /// Capabilities announced to the client
    pub capabilities: PeerCapabilities,

    /// Modes offered by new sessions
    pub modes: Vec<SessionMode>,

    /// Mode new sessions start in
    pub default_mode_id: Option<String>,

    /// Configuration options offered by new sessions
    pub config_options: Vec<SessionConfigOption>,

    /// Commands available in new sessions
    pub available_commands: Vec<AvailableCommand>,

    /// Dispatcher settings (timeouts, pending-table cap)
    pub dispatcher: DispatcherConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            protocol_version: defaults::PROTOCOL_VERSION.to_string(),
            capabilities: PeerCapabilities {
                load_session: true,
                prompt: Some(PromptCapabilities {
                    streaming: true,
                    attachments: true,
                }),
                cancellation: true,
                session_modes: true,
                config_options: true,
                persistence: false,
            },
            modes: Vec::new(),
            default_mode_id: None,
            config_options: Vec::new(),
            available_commands: Vec::new(),
            dispatcher: DispatcherConfig::default(),
        }
    }
}

/// The agent peer
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use airs_acp::integration::{AcpAgent, AgentConfig, AgentSession, PromptHandler};
/// use airs_acp::protocol::{AcpResult, ContentBlock, StopReason};
/// use async_trait::async_trait;
///
/// struct EchoAgent;
///
/// #[async_trait]
/// impl PromptHandler for EchoAgent {
///     async fn handle_prompt(
///         &self,
///         session: AgentSession,
///         _content: Vec<ContentBlock>,
///     ) -> AcpResult<StopReason> {
///         session.send_message_chunk("hello", true).await?;
///         Ok(StopReason::EndTurn)
///     }
/// }
///
/// # async fn example() -> AcpResult<()> {
/// let agent = AcpAgent::new(AgentConfig::default(), Arc::new(EchoAgent));
/// agent.serve_stdio().await?;
/// # Ok(())
/// # }
/// ```
pub struct AcpAgent {
    dispatcher: Arc<ProtocolDispatcher>,
    sessions: Arc<SessionRegistry>,
    config: AgentConfig,
    prompt_handler: Arc<dyn PromptHandler>,
    client_capabilities: Arc<RwLock<Option<PeerCapabilities>>>,
}

impl AcpAgent {
    /// Create an agent and register its protocol handlers
    pub fn new(config: AgentConfig, prompt_handler: Arc<dyn PromptHandler>) -> Arc<Self> {
        let dispatcher = ProtocolDispatcher::new(config.dispatcher.clone());
        let sessions = Arc::new(SessionRegistry::new());
        let client_capabilities = Arc::new(RwLock::new(None));

        dispatcher.add_close_listener(Arc::clone(&sessions) as Arc<dyn crate::dispatcher::CloseListener>);

        let agent = Arc::new(Self {
            dispatcher,
            sessions,
            config,
            prompt_handler,
            client_capabilities,
        });
        agent.register_handlers();
        agent
    }

    /// The dispatcher backing this peer
    pub fn dispatcher(&self) -> &Arc<ProtocolDispatcher> {
        &self.dispatcher
    }

    /// The session registry backing this peer
    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Capabilities the client announced, once `initialize` has run
    pub async fn client_capabilities(&self) -> Option<PeerCapabilities> {
        self.client_capabilities.read().await.clone()
    }

    /// Attach an already-built transport and start it
    pub async fn connect(&self, transport: Box<dyn Transport>) -> AcpResult<()> {
        self.dispatcher.attach_transport(transport).await;
        self.dispatcher.start().await
    }

    /// Serve over the current process's stdin/stdout
    pub async fn serve_stdio(&self) -> AcpResult<()> {
        let transport = StdioTransportBuilder::new()
            .with_message_handler(self.dispatcher.message_handler())
            .build()
            .await
            .map_err(|e| AcpError::internal_error(e.to_string()))?;
        self.connect(Box::new(transport)).await
    }

    /// Serve over HTTP on the configured host/port
    pub async fn serve_http(&self, config: HttpTransportConfig) -> AcpResult<()> {
        let transport = HttpServerTransportBuilder::new(config)
            .with_message_handler(self.dispatcher.message_handler())
            .build()
            .await
            .map_err(|e| AcpError::internal_error(e.to_string()))?;
        self.connect(Box::new(transport)).await
    }

    /// Close the transport and deactivate every session
    pub async fn shutdown(&self) {
        self.dispatcher.close().await;
        self.sessions.deactivate_all();
    }

    fn register_handlers(self: &Arc<Self>) {
        self.register_initialize();
        self.register_session_new();
        self.register_session_load();
        self.register_session_prompt();
        self.register_session_cancel();
        self.register_session_set_mode();
        self.register_session_set_config_option();
    }

    fn register_initialize(self: &Arc<Self>) {
        let client_capabilities = Arc::clone(&self.client_capabilities);
        let protocol_version = self.config.protocol_version.clone();
        let capabilities = self.config.capabilities.clone();

        self.dispatcher
            .register_request_fn(methods::INITIALIZE, move |params| {
                let client_capabilities = Arc::clone(&client_capabilities);
                let protocol_version = protocol_version.clone();
                let capabilities = capabilities.clone();
                async move {
                    let request: InitializeRequest = parse_params(params)?;
                    debug!(
                        version = %request.protocol_version,
                        "initialize received"
                    );
                    *client_capabilities.write().await = Some(request.capabilities);
                    to_result_value(&InitializeResponse {
                        protocol_version,
                        capabilities,
                    })
                }
            });
    }

    fn register_session_new(self: &Arc<Self>) {
        let sessions = Arc::clone(&self.sessions);
        let config = self.config.clone();

        self.dispatcher
            .register_request_fn(methods::SESSION_NEW, move |params| {
                let sessions = Arc::clone(&sessions);
                let config = config.clone();
                async move {
                    let request: NewSessionRequest = parse_params(params)?;
                    let session = Session::with_attributes(
                        SessionId::generate(),
                        request.working_directory,
                        request.mcp_servers,
                        config.modes.clone(),
                        config.default_mode_id.clone(),
                        config.config_options.clone(),
                        config.available_commands.clone(),
                    );
                    let info = session.info().await;
                    sessions.insert(session);
                    to_result_value(&info)
                }
            });
    }

    fn register_session_load(self: &Arc<Self>) {
        let sessions = Arc::clone(&self.sessions);
        let supported = self.config.capabilities.load_session;

        self.dispatcher
            .register_request_fn(methods::SESSION_LOAD, move |params| {
                let sessions = Arc::clone(&sessions);
                async move {
                    if !supported {
                        return Err(AcpError::capability_not_supported("loadSession"));
                    }
                    let request: crate::protocol::LoadSessionRequest = parse_params(params)?;
                    let session = sessions.require(&request.session_id)?;
                    session.ensure_active()?;
                    to_result_value(&session.info().await)
                }
            });
    }

    fn register_session_prompt(self: &Arc<Self>) {
        let agent = Arc::downgrade(self);

        self.dispatcher
            .register_request_fn(methods::SESSION_PROMPT, move |params| {
                let agent = Weak::clone(&agent);
                async move {
                    let agent = agent
                        .upgrade()
                        .ok_or_else(|| AcpError::internal_error("agent dropped"))?;
                    let request: PromptRequest = parse_params(params)?;
                    agent.handle_prompt_request(request).await
                }
            });
    }

    async fn handle_prompt_request(self: Arc<Self>, request: PromptRequest) -> AcpResult<Value> {
        let session = self.sessions.require_active(&request.session_id)?;
        // One prompt at a time per session; a concurrent call is rejected
        let guard = session.begin_prompt()?;

        let client_capabilities = self.client_capabilities.read().await.clone();
        let agent_session = AgentSession::new(
            Arc::clone(&session),
            Arc::clone(&self.dispatcher),
            client_capabilities.unwrap_or_default(),
        );

        let prompt_handler = Arc::clone(&self.prompt_handler);
        let result = prompt_handler
            .handle_prompt(agent_session, request.content)
            .await;
        drop(guard);

        let stop_reason = result?;
        to_result_value(&PromptResponse { stop_reason })
    }

    fn register_session_cancel(self: &Arc<Self>) {
        let sessions = Arc::clone(&self.sessions);

        self.dispatcher
            .register_notification_fn(methods::SESSION_CANCEL, move |params| {
                let sessions = Arc::clone(&sessions);
                async move {
                    let notification: CancelNotification = parse_params(params)?;
                    sessions.cancel(&notification.session_id)
                }
            });
    }

    fn register_session_set_mode(self: &Arc<Self>) {
        let sessions = Arc::clone(&self.sessions);
        let dispatcher = Arc::downgrade(&self.dispatcher);

        self.dispatcher
            .register_request_fn(methods::SESSION_SET_MODE, move |params| {
                let sessions = Arc::clone(&sessions);
                let dispatcher = Weak::clone(&dispatcher);
                async move {
                    let request: SetModeRequest = parse_params(params)?;
                    let session = sessions.require_active(&request.session_id)?;
                    session.set_mode(&request.mode_id).await?;

                    // Confirmed change flows back as an update
                    if let Some(dispatcher) = dispatcher.upgrade() {
                        let notification = SessionNotification::now(
                            request.session_id,
                            SessionUpdate::CurrentModeUpdate(CurrentModeUpdate {
                                current_mode_id: request.mode_id,
                            }),
                        );
                        let _ = dispatcher
                            .send_notification(methods::SESSION_UPDATE, Some(to_result_value(&notification)?))
                            .await;
                    }
                    Ok(json!({}))
                }
            });
    }

    fn register_session_set_config_option(self: &Arc<Self>) {
        let sessions = Arc::clone(&self.sessions);
        let dispatcher = Arc::downgrade(&self.dispatcher);

        self.dispatcher
            .register_request_fn(methods::SESSION_SET_CONFIG_OPTION, move |params| {
                let sessions = Arc::clone(&sessions);
                let dispatcher = Weak::clone(&dispatcher);
                async move {
                    let request: SetConfigOptionRequest = parse_params(params)?;
                    let session = sessions.require_active(&request.session_id)?;
                    session
                        .set_config_option(&request.option_id, request.value.clone())
                        .await?;

                    if let Some(dispatcher) = dispatcher.upgrade() {
                        let notification = SessionNotification::now(
                            request.session_id,
                            SessionUpdate::ConfigOptionUpdate(ConfigOptionUpdate {
                                option_id: request.option_id,
                                value: request.value,
                            }),
                        );
                        let _ = dispatcher
                            .send_notification(methods::SESSION_UPDATE, Some(to_result_value(&notification)?))
                            .await;
                    }
                    Ok(json!({}))
                }
            });
    }
}

/// Live session handle passed to the application's prompt handler
///
/// Everything an agent does during a turn flows through here: streamed
/// updates, tool calls with their permission round-trips, filesystem access
/// on the client, and terminal operations. Message and thought chunk
/// indices auto-increment per channel.
#[derive(Clone)]
pub struct AgentSession {
    session: Arc<Session>,
    dispatcher: Arc<ProtocolDispatcher>,
    client_capabilities: PeerCapabilities,
    message_index: Arc<AtomicU64>,
    thought_index: Arc<AtomicU64>,
}

impl AgentSession {
    fn new(
        session: Arc<Session>,
        dispatcher: Arc<ProtocolDispatcher>,
        client_capabilities: PeerCapabilities,
    ) -> Self {
        Self {
            session,
            dispatcher,
            client_capabilities,
            message_index: Arc::new(AtomicU64::new(0)),
            thought_index: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The session identifier
    pub fn id(&self) -> &SessionId {
        self.session.id()
    }

    /// The underlying session state
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Capabilities the client announced during `initialize`
    pub fn client_capabilities(&self) -> &PeerCapabilities {
        &self.client_capabilities
    }

    /// Whether cancellation has been requested for this session
    ///
    /// The prompt loop checks this at cooperative check-points and winds
    /// down with `StopReason::Cancelled`.
    pub fn is_cancelled(&self) -> bool {
        self.session.is_cancelled()
    }

    /// Token to select on at suspension points
    pub fn cancellation_token(&self) -> tokio_util::sync::CancellationToken {
        self.session.cancellation_token()
    }

    /// Emit one session update notification
    pub async fn emit(&self, update: SessionUpdate) -> AcpResult<()> {
        let notification = SessionNotification::now(self.session.id().clone(), update);
        self.dispatcher
            .send_notification(methods::SESSION_UPDATE, Some(to_result_value(&notification)?))
            .await
    }

    /// Stream one agent message chunk; the index auto-increments
    pub async fn send_message_chunk(
        &self,
        text: impl Into<String>,
        is_final: bool,
    ) -> AcpResult<()> {
        let index = self.message_index.fetch_add(1, Ordering::SeqCst);
        self.emit(SessionUpdate::AgentMessageChunk(MessageChunk {
            content: ContentBlock::text(text),
            index,
            is_final,
        }))
        .await
    }

    /// Stream one thought chunk; the index auto-increments
    pub async fn send_thought_chunk(
        &self,
        text: impl Into<String>,
        is_final: bool,
    ) -> AcpResult<()> {
        let index = self.thought_index.fetch_add(1, Ordering::SeqCst);
        self.emit(SessionUpdate::ThoughtMessageChunk(MessageChunk {
            content: ContentBlock::text(text),
            index,
            is_final,
        }))
        .await
    }

    /// Publish the current plan
    pub async fn send_plan(&self, entries: Vec<PlanEntry>) -> AcpResult<()> {
        self.emit(SessionUpdate::Plan(PlanUpdate { entries })).await
    }

    /// Replace the available-commands table and notify the client
    pub async fn set_available_commands(
        &self,
        commands: Vec<AvailableCommand>,
    ) -> AcpResult<()> {
        self.session.set_available_commands(commands.clone()).await;
        self.emit(SessionUpdate::AvailableCommands(AvailableCommandsUpdate {
            available_commands: commands,
        }))
        .await
    }

    /// Start a tool call; its first `tool_call` update is emitted here
    pub async fn start_tool_call(&self, builder: ToolCallBuilder) -> AcpResult<ToolCallHandle> {
        builder
            .start(
                self.session.id().clone(),
                Arc::new(self.clone()) as Arc<dyn ToolCallSink>,
            )
            .await
    }

    /// Read a text file on the client
    pub async fn read_text_file(&self, path: impl Into<std::path::PathBuf>) -> AcpResult<String> {
        let request = ReadTextFileRequest {
            session_id: Some(self.session.id().clone()),
            path: path.into(),
        };
        let result = self
            .dispatcher
            .send_request(methods::FS_READ_TEXT_FILE, Some(to_result_value(&request)?))
            .await?;
        let response: ReadTextFileResponse = parse_params(Some(result))?;
        Ok(response.content)
    }

    /// Write a text file on the client
    pub async fn write_text_file(
        &self,
        path: impl Into<std::path::PathBuf>,
        content: impl Into<String>,
    ) -> AcpResult<()> {
        let request = WriteTextFileRequest {
            session_id: Some(self.session.id().clone()),
            path: path.into(),
            content: content.into(),
        };
        self.dispatcher
            .send_request(methods::FS_WRITE_TEXT_FILE, Some(to_result_value(&request)?))
            .await?;
        Ok(())
    }

    /// Spawn a terminal on the client
    pub async fn terminal_create(
        &self,
        request: CreateTerminalRequest,
    ) -> AcpResult<CreateTerminalResponse> {
        let result = self
            .dispatcher
            .send_request(methods::TERMINAL_CREATE, Some(to_result_value(&request)?))
            .await?;
        parse_params(Some(result))
    }

    /// Snapshot a terminal's captured output
    pub async fn terminal_output(
        &self,
        terminal_id: &TerminalId,
    ) -> AcpResult<TerminalOutputResponse> {
        let request = TerminalOutputRequest {
            terminal_id: terminal_id.clone(),
        };
        let result = self
            .dispatcher
            .send_request(methods::TERMINAL_OUTPUT, Some(to_result_value(&request)?))
            .await?;
        parse_params(Some(result))
    }

    /// Await a terminal's exit
    pub async fn terminal_wait_for_exit(
        &self,
        terminal_id: &TerminalId,
        timeout_ms: Option<u64>,
    ) -> AcpResult<TerminalExitStatus> {
        let request = WaitForExitRequest {
            terminal_id: terminal_id.clone(),
            timeout: timeout_ms,
        };
        let result = self
            .dispatcher
            .send_request(methods::TERMINAL_WAIT_FOR_EXIT, Some(to_result_value(&request)?))
            .await?;
        parse_params(Some(result))
    }

    /// Signal a terminal's subprocess
    pub async fn terminal_kill(
        &self,
        terminal_id: &TerminalId,
        signal: Option<String>,
    ) -> AcpResult<()> {
        let request = KillTerminalRequest {
            terminal_id: terminal_id.clone(),
            signal,
        };
        self.dispatcher
            .send_request(methods::TERMINAL_KILL, Some(to_result_value(&request)?))
            .await?;
        Ok(())
    }

    /// Release a terminal resource
    pub async fn terminal_release(&self, terminal_id: &TerminalId) -> AcpResult<()> {
        let request = ReleaseTerminalRequest {
            terminal_id: terminal_id.clone(),
        };
        let result = self
            .dispatcher
            .send_request(methods::TERMINAL_RELEASE, Some(to_result_value(&request)?))
            .await?;
        let _: ReleaseTerminalResponse = parse_params(Some(result))?;
        Ok(())
    }
}

#[async_trait]
impl ToolCallSink for AgentSession {
    async fn emit_update(&self, update: SessionUpdate) -> AcpResult<()> {
        self.emit(update).await
    }

    async fn request_permission(
        &self,
        request: PermissionRequest,
    ) -> AcpResult<PermissionOutcome> {
        if self.session.is_cancelled() {
            // Cancellation is never silently swallowed
            warn!(session_id = %self.session.id(), "permission request after cancel");
        }
        let result = self
            .dispatcher
            .send_request(
                methods::SESSION_REQUEST_PERMISSION,
                Some(to_result_value(&request)?),
            )
            .await?;
        parse_params(Some(result))
    }
}
