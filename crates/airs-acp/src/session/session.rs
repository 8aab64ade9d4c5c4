//! Session State
//!
//! A session is a long-lived, stateful context identified by a `SessionId`.
//! It is active from creation until its peer shuts down or the transport
//! closes; deactivation is one-way. Cancellation is sticky and cooperative,
//! carried by a `CancellationToken` the prompt loop polls at check-points.

// Layer 1: Standard library imports
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use serde_json::Value;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

// Layer 3: Internal module imports
use crate::protocol::{
    AcpError, AcpResult, AvailableCommand, McpServerConfig, SessionConfigOption, SessionId,
    SessionInfo, SessionMode,
};

/// Mutable session attributes guarded together
#[derive(Debug, Default)]
struct SessionState {
    modes: Vec<SessionMode>,
    current_mode_id: Option<String>,
    config_options: Vec<SessionConfigOption>,
    available_commands: Vec<AvailableCommand>,
}

/// A stateful prompt context shared between the runtime and the
/// application's prompt handler.
pub struct Session {
    id: SessionId,
    working_directory: PathBuf,
    mcp_servers: Vec<McpServerConfig>,
    state: RwLock<SessionState>,
    active: AtomicBool,
    cancelled: CancellationToken,
    prompt_in_flight: AtomicBool,
}

impl Session {
    /// Create a new active session
    pub fn new(id: SessionId, working_directory: PathBuf) -> Arc<Self> {
        Arc::new(Self {
            id,
            working_directory,
            mcp_servers: Vec::new(),
            state: RwLock::new(SessionState::default()),
            active: AtomicBool::new(true),
            cancelled: CancellationToken::new(),
            prompt_in_flight: AtomicBool::new(false),
        })
    }

    /// Create a session with its full attribute set
    pub fn with_attributes(
        id: SessionId,
        working_directory: PathBuf,
        mcp_servers: Vec<McpServerConfig>,
        modes: Vec<SessionMode>,
        current_mode_id: Option<String>,
        config_options: Vec<SessionConfigOption>,
        available_commands: Vec<AvailableCommand>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            working_directory,
            mcp_servers,
            state: RwLock::new(SessionState {
                modes,
                current_mode_id,
                config_options,
                available_commands,
            }),
            active: AtomicBool::new(true),
            cancelled: CancellationToken::new(),
            prompt_in_flight: AtomicBool::new(false),
        })
    }

    /// The session identifier
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// The session's working directory
    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    /// MCP servers attached to this session
    pub fn mcp_servers(&self) -> &[McpServerConfig] {
        &self.mcp_servers
    }

    /// Whether the session still accepts operations
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Deactivate the session; one-way, it never re-activates
    pub fn deactivate(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            debug!(session_id = %self.id, "session deactivated");
        }
    }

    /// Reject the operation unless the session is active
    pub fn ensure_active(&self) -> AcpResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(AcpError::invalid_session_state(format!(
                "session {} is inactive",
                self.id
            )))
        }
    }

    /// Set the sticky cancellation flag
    ///
    /// The session stays active; the prompt loop observes the flag at its
    /// next cooperative check-point. Once set it is never cleared.
    pub fn cancel(&self) {
        if !self.cancelled.is_cancelled() {
            debug!(session_id = %self.id, "session cancelled");
            self.cancelled.cancel();
        }
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.is_cancelled()
    }

    /// Token the prompt loop can select on at suspension points
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancelled.clone()
    }

    /// Begin a prompt turn
    ///
    /// A session serves one prompt at a time; a second concurrent
    /// `session/prompt` is rejected with `InvalidSessionState`. The returned
    /// guard clears the in-flight marker when dropped.
    pub fn begin_prompt(self: &Arc<Self>) -> AcpResult<PromptGuard> {
        self.ensure_active()?;
        if self.prompt_in_flight.swap(true, Ordering::SeqCst) {
            return Err(AcpError::invalid_session_state(format!(
                "session {} already has a prompt in flight",
                self.id
            )));
        }
        Ok(PromptGuard {
            session: Arc::clone(self),
        })
    }

    /// Whether a prompt turn is currently being served
    pub fn prompt_in_flight(&self) -> bool {
        self.prompt_in_flight.load(Ordering::SeqCst)
    }

    /// Switch the current mode, validating against the advertised table
    pub async fn set_mode(&self, mode_id: &str) -> AcpResult<()> {
        self.ensure_active()?;
        let mut state = self.state.write().await;
        if !state.modes.iter().any(|mode| mode.id == mode_id) {
            return Err(AcpError::invalid_params(format!(
                "unknown mode: {mode_id}"
            )));
        }
        state.current_mode_id = Some(mode_id.to_string());
        Ok(())
    }

    /// Change a configuration option, validating against the advertised table
    pub async fn set_config_option(&self, option_id: &str, value: Value) -> AcpResult<()> {
        self.ensure_active()?;
        let mut state = self.state.write().await;
        match state
            .config_options
            .iter_mut()
            .find(|option| option.id == option_id)
        {
            Some(option) => {
                option.value = value;
                Ok(())
            }
            None => Err(AcpError::invalid_params(format!(
                "unknown config option: {option_id}"
            ))),
        }
    }

    /// Replace the available-commands table
    pub async fn set_available_commands(&self, commands: Vec<AvailableCommand>) {
        self.state.write().await.available_commands = commands;
    }

    /// Identifier of the current mode
    pub async fn current_mode_id(&self) -> Option<String> {
        self.state.read().await.current_mode_id.clone()
    }

    /// Current value of a configuration option
    pub async fn config_option_value(&self, option_id: &str) -> Option<Value> {
        self.state
            .read()
            .await
            .config_options
            .iter()
            .find(|option| option.id == option_id)
            .map(|option| option.value.clone())
    }

    /// Snapshot the session as its wire representation
    pub async fn info(&self) -> SessionInfo {
        let state = self.state.read().await;
        SessionInfo {
            session_id: self.id.clone(),
            modes: state.modes.clone(),
            current_mode_id: state.current_mode_id.clone(),
            config_options: state.config_options.clone(),
            available_commands: state.available_commands.clone(),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("working_directory", &self.working_directory)
            .field("active", &self.is_active())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// RAII marker for an in-flight prompt turn
#[derive(Debug)]
pub struct PromptGuard {
    session: Arc<Session>,
}

impl Drop for PromptGuard {
    fn drop(&mut self) {
        self.session.prompt_in_flight.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session_with_tables() -> Arc<Session> {
        Session::with_attributes(
            SessionId::new("s1"),
            PathBuf::from("/p"),
            Vec::new(),
            vec![
                SessionMode {
                    id: "code".to_string(),
                    label: None,
                },
                SessionMode {
                    id: "plan".to_string(),
                    label: Some("Plan".to_string()),
                },
            ],
            Some("code".to_string()),
            vec![SessionConfigOption {
                id: "model".to_string(),
                label: None,
                value: json!("small"),
            }],
            Vec::new(),
        )
    }

    #[tokio::test]
    async fn test_deactivation_is_one_way() {
        let session = Session::new(SessionId::new("s1"), PathBuf::from("/p"));
        assert!(session.is_active());

        session.deactivate();
        assert!(!session.is_active());

        // No way back
        session.deactivate();
        assert!(!session.is_active());
        assert!(session.ensure_active().is_err());
    }

    #[tokio::test]
    async fn test_cancellation_is_sticky() {
        let session = Session::new(SessionId::new("s1"), PathBuf::from("/p"));
        assert!(!session.is_cancelled());

        session.cancel();
        assert!(session.is_cancelled());

        session.cancel();
        assert!(session.is_cancelled());

        // Cancelled but still active: further prompts are permitted
        assert!(session.is_active());
        assert!(session.begin_prompt().is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_prompt_rejected() {
        let session = Session::new(SessionId::new("s1"), PathBuf::from("/p"));

        let guard = session.begin_prompt().unwrap();
        let second = session.begin_prompt();
        assert!(second.is_err());
        assert_eq!(
            second.unwrap_err().code,
            crate::protocol::codes::INVALID_SESSION_STATE
        );

        drop(guard);
        assert!(session.begin_prompt().is_ok());
    }

    #[tokio::test]
    async fn test_set_mode_validates() {
        let session = session_with_tables();

        session.set_mode("plan").await.unwrap();
        assert_eq!(session.current_mode_id().await.as_deref(), Some("plan"));

        let err = session.set_mode("yolo").await.unwrap_err();
        assert_eq!(err.code, crate::protocol::codes::INVALID_PARAMS);
        assert_eq!(session.current_mode_id().await.as_deref(), Some("plan"));
    }

    #[tokio::test]
    async fn test_set_config_option_validates() {
        let session = session_with_tables();

        session
            .set_config_option("model", json!("large"))
            .await
            .unwrap();
        assert_eq!(
            session.config_option_value("model").await,
            Some(json!("large"))
        );

        let err = session
            .set_config_option("temperature", json!(0.5))
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::protocol::codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_cancellation_token_observed() {
        let session = Session::new(SessionId::new("s1"), PathBuf::from("/p"));
        let token = session.cancellation_token();

        let waiter = tokio::spawn(async move {
            token.cancelled().await;
            true
        });

        session.cancel();
        assert!(waiter.await.unwrap());
    }
}
