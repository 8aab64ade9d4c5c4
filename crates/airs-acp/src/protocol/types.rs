//! ACP Domain Types
//!
//! Wire-level payload types for the Agent Client Protocol: identifiers,
//! content blocks, session updates, tool calls, permissions, terminals, and
//! the `initialize` capability exchange.
//!
//! All structs serialize with camelCase field names as the protocol requires;
//! discriminated unions use a `type` tag.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// Layer 3: Internal module imports
// (none)

/// Opaque session identifier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap an identifier received from the remote peer
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh session identifier
    pub fn generate() -> Self {
        Self(format!("sess-{}", Uuid::new_v4()))
    }

    /// Get the identifier string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tool-call identifier, unique within a session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ToolCallId(String);

impl ToolCallId {
    /// Wrap an identifier received from the remote peer
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh tool-call identifier
    pub fn generate() -> Self {
        Self(format!("tc-{}", Uuid::new_v4()))
    }

    /// Get the identifier string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ToolCallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Terminal resource identifier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TerminalId(String);

impl TerminalId {
    /// Wrap an identifier received from the remote peer
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh terminal identifier
    pub fn generate() -> Self {
        Self(format!("term-{}", Uuid::new_v4()))
    }

    /// Get the identifier string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TerminalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A typed fragment of a prompt or message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text content
    Text {
        /// The text payload
        text: String,
    },
    /// Base64-encoded image content
    Image {
        /// Base64-encoded image data
        data: String,
        /// MIME type (e.g. `image/png`)
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// Base64-encoded audio content
    Audio {
        /// Base64-encoded audio data
        data: String,
        /// MIME type (e.g. `audio/wav`)
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// Reference to an embedded or linked resource
    Resource {
        /// Resource URI
        uri: String,
        /// Inline text for embedded resources
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        /// MIME type of the resource
        #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
}

impl ContentBlock {
    /// Convenience constructor for a text block
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }
}

/// Why a prompt turn concluded
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The agent finished its turn normally
    EndTurn,
    /// The turn was cancelled cooperatively
    Cancelled,
    /// The model hit its token limit
    MaxTokens,
    /// The agent refused to continue
    Refusal,
}

/// Classification of a tool call, used for permission inference
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Read,
    Edit,
    Delete,
    Move,
    Search,
    Execute,
    Think,
    Fetch,
    Other,
}

/// Source location a tool call operates on
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    /// File path
    pub path: String,
    /// Optional 1-based line number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

/// Lifecycle status of a tool call
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Pending,
    AwaitingPermission,
    InProgress,
    Completed,
    Failed,
    Denied,
    Cancelled,
}

impl ToolCallStatus {
    /// Whether this status is terminal
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ToolCallStatus::Completed
                | ToolCallStatus::Failed
                | ToolCallStatus::Denied
                | ToolCallStatus::Cancelled
        )
    }

    /// Whether a transition from `self` to `next` is legal
    pub fn can_transition_to(self, next: ToolCallStatus) -> bool {
        use ToolCallStatus::*;
        matches!(
            (self, next),
            (Pending, AwaitingPermission)
                | (Pending, InProgress)
                | (Pending, Cancelled)
                | (AwaitingPermission, InProgress)
                | (AwaitingPermission, Denied)
                | (AwaitingPermission, Cancelled)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (InProgress, Cancelled)
        )
    }
}

impl fmt::Display for ToolCallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ToolCallStatus::Pending => "pending",
            ToolCallStatus::AwaitingPermission => "awaiting_permission",
            ToolCallStatus::InProgress => "in_progress",
            ToolCallStatus::Completed => "completed",
            ToolCallStatus::Failed => "failed",
            ToolCallStatus::Denied => "denied",
            ToolCallStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Output of a completed tool call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolCallOutput {
    /// Plain text output
    Text {
        /// The text payload
        content: String,
    },
    /// Unified diff output
    Diff {
        /// File path the diff applies to
        path: String,
        /// Unified diff hunks
        hunks: Vec<String>,
    },
    /// Result of a terminal command
    Terminal {
        /// Command that was executed
        command: String,
        /// Exit code, if the process exited normally
        #[serde(rename = "exitCode")]
        exit_code: Option<i32>,
        /// Captured stdout
        stdout: String,
        /// Captured stderr
        stderr: String,
    },
}

/// Full tool-call record, sent once as a `tool_call` update
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    /// Tool-call identifier, unique within the session
    pub id: ToolCallId,
    /// Tool name
    pub name: String,
    /// Tool input object
    pub input: Value,
    /// Classification used for permission inference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ToolKind>,
    /// Source location the call operates on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    /// Human-readable reason for the call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Whether the call must pass the permission round-trip
    #[serde(default)]
    pub requires_permission: bool,
    /// Current lifecycle status
    pub status: ToolCallStatus,
}

/// Incremental tool-call update, sent as a `tool_call_update`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallUpdate {
    /// Tool-call identifier
    pub id: ToolCallId,
    /// New lifecycle status
    pub status: ToolCallStatus,
    /// Output; legal only on `completed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<ToolCallOutput>,
    /// Error message; legal only on `failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Milliseconds from start to the terminal transition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

/// A streamed chunk of agent message or thought text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageChunk {
    /// Chunk content
    pub content: ContentBlock,
    /// Monotonic index within the channel (gaps permitted)
    pub index: u64,
    /// Whether this is the last chunk of the turn
    #[serde(rename = "final", default)]
    pub is_final: bool,
}

/// Status of one plan entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlanEntryStatus {
    Pending,
    InProgress,
    Completed,
}

/// One entry of the agent's plan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanEntry {
    /// What this step does
    pub content: String,
    /// Step status
    pub status: PlanEntryStatus,
}

/// The agent's execution plan for the turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanUpdate {
    /// Plan entries in execution order
    pub entries: Vec<PlanEntry>,
}

/// A selectable session mode
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionMode {
    /// Mode identifier
    pub id: String,
    /// Human-readable label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// The session's current mode changed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CurrentModeUpdate {
    /// Identifier of the now-current mode
    pub current_mode_id: String,
}

/// A configuration option with its current value
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfigOption {
    /// Option identifier
    pub id: String,
    /// Human-readable label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Current value
    pub value: Value,
}

/// A configuration option's value changed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigOptionUpdate {
    /// Option identifier
    pub option_id: String,
    /// New value
    pub value: Value,
}

/// A command the agent can execute on behalf of the user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AvailableCommand {
    /// Command name (e.g. `create_plan`)
    pub name: String,
    /// What the command does
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The set of available commands is ready or has changed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AvailableCommandsUpdate {
    /// Commands the agent can execute
    pub available_commands: Vec<AvailableCommand>,
}

/// Shape-specific body of a `session/update` notification
///
/// The wire form is `{"type": <discriminator>, "data": {...}}`, flattened
/// into the enclosing [`SessionNotification`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SessionUpdate {
    /// A chunk of the agent's response text
    AgentMessageChunk(MessageChunk),
    /// A chunk of the agent's internal reasoning
    ThoughtMessageChunk(MessageChunk),
    /// The agent's execution plan
    Plan(PlanUpdate),
    /// A new tool call was initiated
    ToolCall(ToolCall),
    /// A tool call changed status
    ToolCallUpdate(ToolCallUpdate),
    /// The session's current mode changed
    CurrentModeUpdate(CurrentModeUpdate),
    /// A configuration option changed
    ConfigOptionUpdate(ConfigOptionUpdate),
    /// Available commands are ready or changed
    AvailableCommands(AvailableCommandsUpdate),
}

/// Parameters of a `session/update` notification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionNotification {
    /// Session this update pertains to
    pub session_id: SessionId,
    /// When the update was produced
    pub timestamp: DateTime<Utc>,
    /// The update body
    #[serde(flatten)]
    pub update: SessionUpdate,
}

impl SessionNotification {
    /// Stamp an update with the current time
    pub fn now(session_id: SessionId, update: SessionUpdate) -> Self {
        Self {
            session_id,
            timestamp: Utc::now(),
            update,
        }
    }
}

// Permission round-trip

/// An option presented to the user when requesting permission
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PermissionOption {
    /// Option identifier (e.g. `allow`, `deny`)
    pub id: String,
    /// Human-readable label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// How long a permission grant is remembered
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PermissionScope {
    /// This call only
    Once,
    /// The rest of this session
    Session,
    /// Remembered across sessions
    Always,
}

/// Parameters of a `session/request_permission` request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRequest {
    /// Session the tool call belongs to
    pub session_id: SessionId,
    /// Inferred operation (e.g. `file_write`, `terminal_execute`)
    pub operation: String,
    /// Resource the operation targets
    pub resource: String,
    /// Tool call awaiting the decision
    pub tool_call_id: ToolCallId,
    /// Options to present to the user
    pub options: Vec<PermissionOption>,
    /// Why the agent wants to do this
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Client's decision on a permission request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PermissionOutcome {
    /// Whether the operation may proceed
    pub granted: bool,
    /// Whether the decision should be remembered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remember: Option<bool>,
    /// Scope of a remembered decision
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<PermissionScope>,
    /// Why the decision was made
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Which presented option was selected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_option_id: Option<String>,
}

impl PermissionOutcome {
    /// A plain one-shot grant
    pub fn granted_once() -> Self {
        Self {
            granted: true,
            remember: None,
            scope: Some(PermissionScope::Once),
            reason: None,
            selected_option_id: None,
        }
    }

    /// A plain denial
    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            granted: false,
            remember: None,
            scope: None,
            reason: Some(reason.into()),
            selected_option_id: None,
        }
    }
}

// Capability exchange

/// Prompt-related capability flags
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PromptCapabilities {
    /// Streaming updates during a prompt turn
    #[serde(default)]
    pub streaming: bool,
    /// Non-text content blocks in prompts
    #[serde(default)]
    pub attachments: bool,
}

/// Capability flags announced by a peer during `initialize`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PeerCapabilities {
    /// `session/load` is supported
    #[serde(default)]
    pub load_session: bool,
    /// Prompt feature flags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<PromptCapabilities>,
    /// `session/cancel` is honored
    #[serde(default)]
    pub cancellation: bool,
    /// `session/set_mode` is supported
    #[serde(default)]
    pub session_modes: bool,
    /// `session/set_config_option` is supported
    #[serde(default)]
    pub config_options: bool,
    /// Sessions survive process restarts
    #[serde(default)]
    pub persistence: bool,
}

/// Parameters of the `initialize` request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequest {
    /// Protocol version the caller speaks
    pub protocol_version: String,
    /// Capabilities of the calling peer
    #[serde(default)]
    pub capabilities: PeerCapabilities,
}

/// Result of the `initialize` request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResponse {
    /// Protocol version the agent speaks
    pub protocol_version: String,
    /// Capabilities of the responding peer
    #[serde(default)]
    pub capabilities: PeerCapabilities,
}

// Session operations

/// Configuration of an MCP server attached to a session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct McpServerConfig {
    /// Server name
    pub name: String,
    /// Command to launch the server
    pub command: String,
    /// Command arguments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

/// Parameters of `session/new`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewSessionRequest {
    /// Working directory for the session
    pub working_directory: PathBuf,
    /// MCP servers to attach
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mcp_servers: Vec<McpServerConfig>,
}

/// Result of `session/new` and `session/load`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// The session identifier
    pub session_id: SessionId,
    /// Modes the session supports
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modes: Vec<SessionMode>,
    /// Identifier of the current mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_mode_id: Option<String>,
    /// Configuration options with current values
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_options: Vec<SessionConfigOption>,
    /// Commands the agent can execute
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub available_commands: Vec<AvailableCommand>,
}

/// Parameters of `session/load`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoadSessionRequest {
    /// Session to restore
    pub session_id: SessionId,
    /// Working directory for the restored session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,
}

/// Parameters of `session/prompt`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PromptRequest {
    /// Target session
    pub session_id: SessionId,
    /// Prompt content blocks
    pub content: Vec<ContentBlock>,
}

/// Result of `session/prompt`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PromptResponse {
    /// Why the turn concluded
    pub stop_reason: StopReason,
}

/// Parameters of the `session/cancel` notification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CancelNotification {
    /// Session to cancel
    pub session_id: SessionId,
}

/// Parameters of `session/set_mode`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SetModeRequest {
    /// Target session
    pub session_id: SessionId,
    /// Mode to switch to
    pub mode_id: String,
}

/// Parameters of `session/set_config_option`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SetConfigOptionRequest {
    /// Target session
    pub session_id: SessionId,
    /// Option to change
    pub option_id: String,
    /// New value
    pub value: Value,
}

// Filesystem operations

/// Parameters of `fs/read_text_file`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReadTextFileRequest {
    /// Session on whose behalf the read happens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// File path
    pub path: PathBuf,
}

/// Result of `fs/read_text_file`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReadTextFileResponse {
    /// File contents
    pub content: String,
}

/// Parameters of `fs/write_text_file`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WriteTextFileRequest {
    /// Session on whose behalf the write happens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// File path
    pub path: PathBuf,
    /// New file contents
    pub content: String,
}

// Terminal operations

/// Parameters of `terminal/create`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateTerminalRequest {
    /// Command to execute
    pub command: String,
    /// Command arguments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Working directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    /// Environment overlaid on the parent environment
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
    /// Command timeout in milliseconds; the process is killed on expiry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

/// Result of `terminal/create`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateTerminalResponse {
    /// Identifier of the new terminal
    pub terminal_id: TerminalId,
    /// OS process id, if available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

/// Parameters of `terminal/output`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TerminalOutputRequest {
    /// Target terminal
    pub terminal_id: TerminalId,
}

/// Snapshot of captured terminal output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TerminalOutputResponse {
    /// Captured stdout so far
    pub stdout: String,
    /// Captured stderr so far
    pub stderr: String,
    /// True iff the process has exited
    pub complete: bool,
}

/// Parameters of `terminal/wait_for_exit`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WaitForExitRequest {
    /// Target terminal
    pub terminal_id: TerminalId,
    /// Optional wait timeout in milliseconds; only affects the waiter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

/// How a terminal subprocess concluded
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TerminalExitStatus {
    /// Exit code, or null if the process was signaled or is still running
    pub exit_code: Option<i32>,
    /// Terminating signal name, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
    /// Whether the process was terminated by a signal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signaled: Option<bool>,
    /// Whether a timeout (command or wait) elapsed
    pub timed_out: bool,
    /// Milliseconds from spawn to exit (or to the wait timeout)
    pub duration: u64,
}

/// Parameters of `terminal/kill`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KillTerminalRequest {
    /// Target terminal
    pub terminal_id: TerminalId,
    /// Signal name (default SIGTERM)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
}

/// Parameters of `terminal/release`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseTerminalRequest {
    /// Target terminal
    pub terminal_id: TerminalId,
}

/// Result of `terminal/release`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseTerminalResponse {
    /// Always true; releasing an unknown terminal is a no-op
    pub released: bool,
}
