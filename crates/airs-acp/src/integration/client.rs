//! Client Façade
//!
//! The client peer: owns the dispatcher, the terminal manager, the
//! permission broker, and the inbound wiring for `session/update`, `fs/*`,
//! `terminal/*`, and `session/request_permission`. Methods gated by a
//! capability the agent did not announce fail locally with
//! `CapabilityNotSupported` before any wire traffic.

// Layer 1: Standard library imports
use std::path::PathBuf;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use serde_json::Value;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

// Layer 3: Internal module imports
use crate::dispatcher::{DispatcherConfig, ProtocolDispatcher};
use crate::integration::handler::FsHandler;
use crate::integration::parse_params;
use crate::permission::{PermissionBroker, PermissionHandler};
use crate::protocol::constants::{defaults, methods};
use crate::protocol::{
    AcpError, AcpResult, CancelNotification, ContentBlock, CreateTerminalRequest,
    InitializeRequest, InitializeResponse, KillTerminalRequest, LoadSessionRequest,
    NewSessionRequest, PeerCapabilities, PermissionRequest, PromptRequest, PromptResponse,
    ReadTextFileRequest, ReleaseTerminalRequest, ReleaseTerminalResponse, SessionId,
    SessionInfo, SessionNotification, SetConfigOptionRequest, SetModeRequest, StopReason,
    TerminalOutputRequest, WaitForExitRequest, WriteTextFileRequest,
};
use crate::session::{Session, SessionRegistry};
use crate::terminal::TerminalManager;
use crate::transport::{
    HttpClientTransportBuilder, HttpTransportConfig, SubprocessConfig,
    SubprocessTransportBuilder, Transport, TransportBuilder,
};

fn to_result_value<T: serde::Serialize>(value: &T) -> AcpResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| AcpError::internal_error(format!("serialization failed: {e}")))
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Protocol version announced during `initialize`
    pub protocol_version: String,

    /// Capabilities announced to the agent
    pub capabilities: PeerCapabilities,

    /// Dispatcher settings (timeouts, pending-table cap)
    pub dispatcher: DispatcherConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            protocol_version: defaults::PROTOCOL_VERSION.to_string(),
            capabilities: PeerCapabilities {
                cancellation: true,
                ..Default::default()
            },
            dispatcher: DispatcherConfig::default(),
        }
    }
}

/// The client peer
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use airs_acp::integration::{AcpClient, ClientConfig, LocalFsHandler};
/// use airs_acp::permission::AllowAllPermissions;
/// use airs_acp::protocol::{AcpResult, ContentBlock};
/// use airs_acp::transport::SubprocessConfig;
///
/// # async fn example() -> AcpResult<()> {
/// let client = AcpClient::new(
///     ClientConfig::default(),
///     Arc::new(LocalFsHandler),
///     Arc::new(AllowAllPermissions),
/// );
///
/// client
///     .connect_subprocess(SubprocessConfig {
///         command: "my-agent".to_string(),
///         ..Default::default()
///     })
///     .await?;
///
/// let capabilities = client.initialize().await?;
/// let session = client.new_session("/p").await?;
/// let mut updates = client.subscribe(&session.session_id);
///
/// let stop = client
///     .prompt(&session.session_id, vec![ContentBlock::text("hi")])
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct AcpClient {
    dispatcher: Arc<ProtocolDispatcher>,
    sessions: Arc<SessionRegistry>,
    terminals: Arc<TerminalManager>,
    permissions: Arc<PermissionBroker>,
    config: ClientConfig,
    agent_capabilities: Arc<RwLock<Option<PeerCapabilities>>>,
}

impl AcpClient {
    /// Create a client and register its protocol handlers
    pub fn new(
        config: ClientConfig,
        fs_handler: Arc<dyn FsHandler>,
        permission_handler: Arc<dyn PermissionHandler>,
    ) -> Arc<Self> {
        let dispatcher = ProtocolDispatcher::new(config.dispatcher.clone());
        let sessions = Arc::new(SessionRegistry::new());
        let terminals = Arc::new(TerminalManager::new());
        let permissions = Arc::new(PermissionBroker::new(permission_handler));

        dispatcher.add_close_listener(Arc::clone(&sessions) as Arc<dyn crate::dispatcher::CloseListener>);
        dispatcher.add_close_listener(Arc::clone(&terminals) as Arc<dyn crate::dispatcher::CloseListener>);

        let client = Arc::new(Self {
            dispatcher,
            sessions,
            terminals,
            permissions,
            config,
            agent_capabilities: Arc::new(RwLock::new(None)),
        });
        client.register_handlers(fs_handler);
        client
    }

    /// The dispatcher backing this peer
    pub fn dispatcher(&self) -> &Arc<ProtocolDispatcher> {
        &self.dispatcher
    }

    /// The terminal manager backing this peer
    pub fn terminals(&self) -> &Arc<TerminalManager> {
        &self.terminals
    }

    /// Capabilities the agent announced, once `initialize` has run
    pub async fn agent_capabilities(&self) -> Option<PeerCapabilities> {
        self.agent_capabilities.read().await.clone()
    }

    /// Attach an already-built transport and start it
    pub async fn connect(&self, transport: Box<dyn Transport>) -> AcpResult<()> {
        self.dispatcher.attach_transport(transport).await;
        self.dispatcher.start().await
    }

    /// Spawn the agent as a subprocess and connect over its stdio
    pub async fn connect_subprocess(&self, config: SubprocessConfig) -> AcpResult<()> {
        let transport = SubprocessTransportBuilder::from_config(config)
            .with_message_handler(self.dispatcher.message_handler())
            .build()
            .await
            .map_err(|e| AcpError::internal_error(e.to_string()))?;
        self.connect(Box::new(transport)).await
    }

    /// Connect to an agent over HTTP
    pub async fn connect_http(&self, config: HttpTransportConfig) -> AcpResult<()> {
        let transport = HttpClientTransportBuilder::new(config)
            .with_message_handler(self.dispatcher.message_handler())
            .build()
            .await
            .map_err(|e| AcpError::internal_error(e.to_string()))?;
        self.connect(Box::new(transport)).await
    }

    /// Whether the transport is connected
    pub async fn is_connected(&self) -> bool {
        self.dispatcher.is_connected().await
    }

    /// Close the connection: pending requests fail, sessions deactivate,
    /// terminals are released
    pub async fn shutdown(&self) {
        self.dispatcher.close().await;
        self.sessions.deactivate_all();
        self.terminals.release_all().await;
    }

    /// Negotiate protocol version and capabilities with the agent
    pub async fn initialize(&self) -> AcpResult<PeerCapabilities> {
        let request = InitializeRequest {
            protocol_version: self.config.protocol_version.clone(),
            capabilities: self.config.capabilities.clone(),
        };
        let result = self
            .dispatcher
            .send_request(methods::INITIALIZE, Some(to_result_value(&request)?))
            .await?;
        let response: InitializeResponse = parse_params(Some(result))?;

        debug!(version = %response.protocol_version, "agent initialized");
        let capabilities = response.capabilities.clone();
        *self.agent_capabilities.write().await = Some(response.capabilities);
        Ok(capabilities)
    }

    /// Create a new session on the agent
    pub async fn new_session(&self, working_directory: impl Into<PathBuf>) -> AcpResult<SessionInfo> {
        let working_directory = working_directory.into();
        let request = NewSessionRequest {
            working_directory: working_directory.clone(),
            mcp_servers: Vec::new(),
        };
        let result = self
            .dispatcher
            .send_request(methods::SESSION_NEW, Some(to_result_value(&request)?))
            .await?;
        let info: SessionInfo = parse_params(Some(result))?;

        self.track_session(&info, working_directory);
        Ok(info)
    }

    /// Load an existing session by id; gated on the agent's `loadSession`
    pub async fn load_session(
        &self,
        session_id: &SessionId,
        working_directory: impl Into<PathBuf>,
    ) -> AcpResult<SessionInfo> {
        self.require_agent_capability("loadSession", |caps| caps.load_session)
            .await?;

        let working_directory = working_directory.into();
        let request = LoadSessionRequest {
            session_id: session_id.clone(),
            working_directory: Some(working_directory.clone()),
        };
        let result = self
            .dispatcher
            .send_request(methods::SESSION_LOAD, Some(to_result_value(&request)?))
            .await?;
        let info: SessionInfo = parse_params(Some(result))?;

        self.track_session(&info, working_directory);
        Ok(info)
    }

    /// Run one prompt turn
    ///
    /// Non-text content requires the agent's `prompt.attachments`
    /// capability.
    pub async fn prompt(
        &self,
        session_id: &SessionId,
        content: Vec<ContentBlock>,
    ) -> AcpResult<StopReason> {
        let has_attachments = content
            .iter()
            .any(|block| !matches!(block, ContentBlock::Text { .. }));
        if has_attachments {
            self.require_agent_capability("prompt.attachments", |caps| {
                caps.prompt.is_some_and(|prompt| prompt.attachments)
            })
            .await?;
        }

        let request = PromptRequest {
            session_id: session_id.clone(),
            content,
        };
        let result = self
            .dispatcher
            .send_request(methods::SESSION_PROMPT, Some(to_result_value(&request)?))
            .await?;
        let response: PromptResponse = parse_params(Some(result))?;
        Ok(response.stop_reason)
    }

    /// Request cooperative cancellation; gated on the agent's `cancellation`
    ///
    /// Fire-and-forget: the agent's prompt loop observes the sticky flag at
    /// its next check-point. The local session mirror is flagged too.
    pub async fn cancel(&self, session_id: &SessionId) -> AcpResult<()> {
        self.require_agent_capability("cancellation", |caps| caps.cancellation)
            .await?;

        if let Some(session) = self.sessions.get(session_id) {
            session.cancel();
        }

        let notification = CancelNotification {
            session_id: session_id.clone(),
        };
        self.dispatcher
            .send_notification(methods::SESSION_CANCEL, Some(to_result_value(&notification)?))
            .await
    }

    /// Switch the session mode; gated on the agent's `sessionModes`
    pub async fn set_mode(&self, session_id: &SessionId, mode_id: &str) -> AcpResult<()> {
        self.require_agent_capability("sessionModes", |caps| caps.session_modes)
            .await?;

        let request = SetModeRequest {
            session_id: session_id.clone(),
            mode_id: mode_id.to_string(),
        };
        self.dispatcher
            .send_request(methods::SESSION_SET_MODE, Some(to_result_value(&request)?))
            .await?;
        Ok(())
    }

    /// Change a configuration option; gated on the agent's `configOptions`
    pub async fn set_config_option(
        &self,
        session_id: &SessionId,
        option_id: &str,
        value: Value,
    ) -> AcpResult<()> {
        self.require_agent_capability("configOptions", |caps| caps.config_options)
            .await?;

        let request = SetConfigOptionRequest {
            session_id: session_id.clone(),
            option_id: option_id.to_string(),
            value,
        };
        self.dispatcher
            .send_request(
                methods::SESSION_SET_CONFIG_OPTION,
                Some(to_result_value(&request)?),
            )
            .await?;
        Ok(())
    }

    /// Subscribe to a session's update stream, in transport-receive order
    pub fn subscribe(&self, session_id: &SessionId) -> mpsc::UnboundedReceiver<SessionNotification> {
        self.sessions.subscribe(session_id)
    }

    /// The local mirror of a session
    pub fn session(&self, session_id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.get(session_id)
    }

    fn track_session(&self, info: &SessionInfo, working_directory: PathBuf) {
        let session = Session::with_attributes(
            info.session_id.clone(),
            working_directory,
            Vec::new(),
            info.modes.clone(),
            info.current_mode_id.clone(),
            info.config_options.clone(),
            info.available_commands.clone(),
        );
        self.sessions.insert(session);
    }

    async fn require_agent_capability(
        &self,
        name: &str,
        check: impl Fn(&PeerCapabilities) -> bool,
    ) -> AcpResult<()> {
        let capabilities = self.agent_capabilities.read().await;
        match capabilities.as_ref() {
            Some(caps) if check(caps) => Ok(()),
            Some(_) => Err(AcpError::capability_not_supported(name)),
            None => Err(AcpError::invalid_session_state(
                "initialize has not completed",
            )),
        }
    }

    fn register_handlers(self: &Arc<Self>, fs_handler: Arc<dyn FsHandler>) {
        self.register_session_update();
        self.register_fs(fs_handler);
        self.register_terminal();
        self.register_request_permission();
    }

    fn register_session_update(self: &Arc<Self>) {
        let sessions = Arc::clone(&self.sessions);

        self.dispatcher
            .register_notification_fn(methods::SESSION_UPDATE, move |params| {
                let sessions = Arc::clone(&sessions);
                async move {
                    let notification: SessionNotification = parse_params(params)?;
                    sessions.publish(notification).await;
                    Ok(())
                }
            });
    }

    fn register_fs(self: &Arc<Self>, fs_handler: Arc<dyn FsHandler>) {
        let fs = Arc::clone(&fs_handler);
        self.dispatcher
            .register_request_fn(methods::FS_READ_TEXT_FILE, move |params| {
                let fs = Arc::clone(&fs);
                async move {
                    let request: ReadTextFileRequest = parse_params(params)?;
                    let response = fs.read_text_file(request).await?;
                    to_result_value(&response)
                }
            });

        self.dispatcher
            .register_request_fn(methods::FS_WRITE_TEXT_FILE, move |params| {
                let fs = Arc::clone(&fs_handler);
                async move {
                    let request: WriteTextFileRequest = parse_params(params)?;
                    fs.write_text_file(request).await?;
                    Ok(serde_json::json!({}))
                }
            });
    }

    fn register_terminal(self: &Arc<Self>) {
        let terminals = Arc::clone(&self.terminals);
        self.dispatcher
            .register_request_fn(methods::TERMINAL_CREATE, move |params| {
                let terminals = Arc::clone(&terminals);
                async move {
                    let request: CreateTerminalRequest = parse_params(params)?;
                    let response = terminals.create(request).await?;
                    to_result_value(&response)
                }
            });

        let terminals = Arc::clone(&self.terminals);
        self.dispatcher
            .register_request_fn(methods::TERMINAL_OUTPUT, move |params| {
                let terminals = Arc::clone(&terminals);
                async move {
                    let request: TerminalOutputRequest = parse_params(params)?;
                    let response = terminals.output(&request.terminal_id).await?;
                    to_result_value(&response)
                }
            });

        let terminals = Arc::clone(&self.terminals);
        self.dispatcher
            .register_request_fn(methods::TERMINAL_WAIT_FOR_EXIT, move |params| {
                let terminals = Arc::clone(&terminals);
                async move {
                    let request: WaitForExitRequest = parse_params(params)?;
                    let status = terminals
                        .wait_for_exit(&request.terminal_id, request.timeout)
                        .await?;
                    to_result_value(&status)
                }
            });

        let terminals = Arc::clone(&self.terminals);
        self.dispatcher
            .register_request_fn(methods::TERMINAL_KILL, move |params| {
                let terminals = Arc::clone(&terminals);
                async move {
                    let request: KillTerminalRequest = parse_params(params)?;
                    terminals
                        .kill(&request.terminal_id, request.signal.as_deref())
                        .await?;
                    Ok(serde_json::json!({}))
                }
            });

        let terminals = Arc::clone(&self.terminals);
        self.dispatcher
            .register_request_fn(methods::TERMINAL_RELEASE, move |params| {
                let terminals = Arc::clone(&terminals);
                async move {
                    let request: ReleaseTerminalRequest = parse_params(params)?;
                    terminals.release(&request.terminal_id).await?;
                    to_result_value(&ReleaseTerminalResponse { released: true })
                }
            });
    }

    fn register_request_permission(self: &Arc<Self>) {
        let permissions = Arc::clone(&self.permissions);

        self.dispatcher
            .register_request_fn(methods::SESSION_REQUEST_PERMISSION, move |params| {
                let permissions = Arc::clone(&permissions);
                async move {
                    let request: PermissionRequest = parse_params(params)?;
                    let outcome = permissions.decide(&request).await?;
                    to_result_value(&outcome)
                }
            });
    }
}
