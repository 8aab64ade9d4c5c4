//! Tool-Call Lifecycle
//!
//! Drives each tool call through its state machine, emitting a full
//! `tool_call` update on first send and `tool_call_update` notifications on
//! every transition after that. Legal transitions:
//!
//! ```text
//! pending             -> awaiting_permission | in_progress | cancelled
//! awaiting_permission -> in_progress | denied | cancelled
//! in_progress         -> completed | failed | cancelled
//! ```
//!
//! Anything else is rejected with `InvalidSessionState` and leaves the state
//! untouched. `output` is legal only on `completed`, `error` only on
//! `failed`; terminal transitions carry the elapsed duration.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

// Layer 3: Internal module imports
use crate::protocol::{
    AcpError, AcpResult, PermissionOption, PermissionOutcome, PermissionRequest, SessionId,
    SessionUpdate, SourceLocation, ToolCall, ToolCallId, ToolCallOutput, ToolCallStatus,
    ToolCallUpdate, ToolKind,
};

/// Where a tool call's updates and permission requests go
///
/// The agent session implements this against the live dispatcher; tests
/// implement it with channels.
#[async_trait]
pub trait ToolCallSink: Send + Sync {
    /// Emit one session update for the owning session
    async fn emit_update(&self, update: SessionUpdate) -> AcpResult<()>;

    /// Run the permission round-trip with the client
    async fn request_permission(
        &self,
        request: PermissionRequest,
    ) -> AcpResult<PermissionOutcome>;
}

/// Infer the permission operation for a tool call
///
/// Known kinds map directly; otherwise the kind name is used, and with no
/// kind at all the tool name is matched heuristically.
pub fn infer_operation(kind: Option<ToolKind>, tool_name: &str) -> String {
    match kind {
        Some(ToolKind::Read) => "file_read".to_string(),
        Some(ToolKind::Edit) => "file_write".to_string(),
        Some(ToolKind::Delete) => "file_delete".to_string(),
        Some(ToolKind::Execute) => "terminal_execute".to_string(),
        Some(ToolKind::Fetch) => "network_access".to_string(),
        Some(ToolKind::Move) => "move".to_string(),
        Some(ToolKind::Search) => "search".to_string(),
        Some(ToolKind::Think) => "think".to_string(),
        Some(ToolKind::Other) => "other".to_string(),
        None => {
            let name = tool_name.to_ascii_lowercase();
            if name.contains("read") {
                "file_read".to_string()
            } else if name.contains("write") || name.contains("edit") {
                "file_write".to_string()
            } else if name.contains("delete") || name.contains("remove") {
                "file_delete".to_string()
            } else if name.contains("exec") || name.contains("run") || name.contains("command") {
                "terminal_execute".to_string()
            } else if name.contains("fetch") || name.contains("http") || name.contains("web") {
                "network_access".to_string()
            } else {
                "other".to_string()
            }
        }
    }
}

/// Infer the permission resource for a tool call
///
/// Taken from `input.path | input.file | input.url | input.command |
/// location.path` in that order, else the tool name.
pub fn infer_resource(
    input: &Value,
    location: Option<&SourceLocation>,
    tool_name: &str,
) -> String {
    for key in ["path", "file", "url", "command"] {
        if let Some(value) = input.get(key).and_then(Value::as_str) {
            return value.to_string();
        }
    }
    if let Some(location) = location {
        return location.path.clone();
    }
    tool_name.to_string()
}

/// Fluent builder for a new tool call
pub struct ToolCallBuilder {
    name: String,
    input: Value,
    kind: Option<ToolKind>,
    location: Option<SourceLocation>,
    reason: Option<String>,
    requires_permission: bool,
}

impl ToolCallBuilder {
    /// Start building a tool call for `name` with its input object
    pub fn new(name: impl Into<String>, input: Value) -> Self {
        Self {
            name: name.into(),
            input,
            kind: None,
            location: None,
            reason: None,
            requires_permission: false,
        }
    }

    /// Classify the call
    pub fn kind(mut self, kind: ToolKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Attach the source location the call operates on
    pub fn location(mut self, path: impl Into<String>, line: Option<u32>) -> Self {
        self.location = Some(SourceLocation {
            path: path.into(),
            line,
        });
        self
    }

    /// Attach a human-readable reason
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Require the permission round-trip before execution
    pub fn requires_permission(mut self, required: bool) -> Self {
        self.requires_permission = required;
        self
    }

    /// Create the tool call in `pending` state and emit the full `tool_call`
    /// record as its first update
    pub async fn start(
        self,
        session_id: SessionId,
        sink: Arc<dyn ToolCallSink>,
    ) -> AcpResult<ToolCallHandle> {
        let call = ToolCall {
            id: ToolCallId::generate(),
            name: self.name,
            input: self.input,
            kind: self.kind,
            location: self.location,
            reason: self.reason,
            requires_permission: self.requires_permission,
            status: ToolCallStatus::Pending,
        };

        sink.emit_update(SessionUpdate::ToolCall(call.clone())).await?;

        Ok(ToolCallHandle {
            call,
            session_id,
            sink,
            started_at: Utc::now(),
        })
    }
}

/// Handle driving one tool call through its lifecycle
pub struct ToolCallHandle {
    call: ToolCall,
    session_id: SessionId,
    sink: Arc<dyn ToolCallSink>,
    started_at: DateTime<Utc>,
}

impl ToolCallHandle {
    /// The tool-call identifier
    pub fn id(&self) -> &ToolCallId {
        &self.call.id
    }

    /// Current lifecycle status
    pub fn status(&self) -> ToolCallStatus {
        self.call.status
    }

    /// The full tool-call record
    pub fn call(&self) -> &ToolCall {
        &self.call
    }

    /// The inferred permission operation for this call
    pub fn operation(&self) -> String {
        infer_operation(self.call.kind, &self.call.name)
    }

    /// The inferred permission resource for this call
    pub fn resource(&self) -> String {
        infer_resource(&self.call.input, self.call.location.as_ref(), &self.call.name)
    }

    fn elapsed_ms(&self) -> u64 {
        Utc::now()
            .signed_duration_since(self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }

    /// Validate and perform one transition, emitting a `tool_call_update`
    ///
    /// An illegal transition is rejected with `InvalidSessionState` and does
    /// not alter state.
    async fn transition(
        &mut self,
        next: ToolCallStatus,
        output: Option<ToolCallOutput>,
        error: Option<String>,
    ) -> AcpResult<()> {
        if !self.call.status.can_transition_to(next) {
            return Err(AcpError::invalid_session_state(format!(
                "illegal tool-call transition {} -> {} for {}",
                self.call.status, next, self.call.id
            )));
        }

        debug_assert!(output.is_none() || next == ToolCallStatus::Completed);
        debug_assert!(error.is_none() || next == ToolCallStatus::Failed);

        self.call.status = next;
        debug!(tool_call_id = %self.call.id, status = %next, "tool call transition");

        let duration = next.is_terminal().then(|| self.elapsed_ms());
        self.sink
            .emit_update(SessionUpdate::ToolCallUpdate(ToolCallUpdate {
                id: self.call.id.clone(),
                status: next,
                output,
                error,
                duration,
            }))
            .await
    }

    /// Run the permission round-trip when required, else move straight to
    /// `in_progress`
    ///
    /// Returns whether execution may proceed. On denial the call lands in
    /// the terminal `denied` state.
    pub async fn authorize(&mut self) -> AcpResult<bool> {
        if !self.call.requires_permission {
            self.transition(ToolCallStatus::InProgress, None, None).await?;
            return Ok(true);
        }

        self.transition(ToolCallStatus::AwaitingPermission, None, None)
            .await?;

        let request = PermissionRequest {
            session_id: self.session_id.clone(),
            operation: self.operation(),
            resource: self.resource(),
            tool_call_id: self.call.id.clone(),
            options: vec![
                PermissionOption {
                    id: "allow".to_string(),
                    label: Some("Allow".to_string()),
                },
                PermissionOption {
                    id: "deny".to_string(),
                    label: Some("Deny".to_string()),
                },
            ],
            reason: self.call.reason.clone(),
        };

        let outcome = self.sink.request_permission(request).await?;

        if outcome.granted {
            self.transition(ToolCallStatus::InProgress, None, None).await?;
            Ok(true)
        } else {
            self.transition(ToolCallStatus::Denied, None, None).await?;
            Ok(false)
        }
    }

    /// Complete the call with its output
    pub async fn complete(&mut self, output: ToolCallOutput) -> AcpResult<()> {
        self.transition(ToolCallStatus::Completed, Some(output), None)
            .await
    }

    /// Fail the call with an error message
    pub async fn fail(&mut self, error: impl Into<String>) -> AcpResult<()> {
        self.transition(ToolCallStatus::Failed, None, Some(error.into()))
            .await
    }

    /// Cancel the call at a cooperative check-point
    pub async fn cancel(&mut self) -> AcpResult<()> {
        self.transition(ToolCallStatus::Cancelled, None, None).await
    }
}
