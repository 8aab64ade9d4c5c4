//! AIRS ACP - Agent Client Protocol Implementation
//!
//! This crate provides a bidirectional Agent Client Protocol (ACP) runtime
//! built on a JSON-RPC 2.0 foundation: a pair of symmetric peers - a
//! *client* (editor/IDE) and an *agent* (AI assistant) - exchanging
//! requests, responses, and unsolicited notifications over stdio or HTTP.
//!
//! # Architecture
//!
//! The implementation is organized in layers:
//!
//! - **Protocol Layer** (`protocol`): JSON-RPC 2.0 message types, the ACP
//!   payload types, method names, and the error-code taxonomy
//! - **Correlation Layer** (`correlation`): the pending-request table with
//!   deadlines, capacity limits, and transport-close semantics
//! - **Transport Layer** (`transport`): event-driven transports (current
//!   process stdio, agent subprocess, HTTP client and server)
//! - **Dispatcher Layer** (`dispatcher`): bidirectional request/notification
//!   routing bound to one transport
//! - **Session Layer** (`session`): session lifecycle, update fan-out, and
//!   chunk reassembly
//! - **Tool-Call Layer** (`toolcall`): the tool-call state machine with its
//!   permission round-trip
//! - **Terminal Layer** (`terminal`): client-owned subprocess resources
//! - **Integration Layer** (`integration`): the [`AcpAgent`] and
//!   [`AcpClient`] façades
//!
//! # Quick Start
//!
//! An agent that streams a greeting:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use airs_acp::integration::{AcpAgent, AgentConfig, AgentSession, PromptHandler};
//! use airs_acp::protocol::{AcpResult, ContentBlock, StopReason};
//! use async_trait::async_trait;
//!
//! struct Greeter;
//!
//! #[async_trait]
//! impl PromptHandler for Greeter {
//!     async fn handle_prompt(
//!         &self,
//!         session: AgentSession,
//!         _content: Vec<ContentBlock>,
//!     ) -> AcpResult<StopReason> {
//!         session.send_message_chunk("he", false).await?;
//!         session.send_message_chunk("llo", true).await?;
//!         if session.is_cancelled() {
//!             return Ok(StopReason::Cancelled);
//!         }
//!         Ok(StopReason::EndTurn)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> AcpResult<()> {
//!     let agent = AcpAgent::new(AgentConfig::default(), Arc::new(Greeter));
//!     agent.serve_stdio().await?;
//!     // Serve until the editor closes our stdin
//!     std::future::pending::<()>().await;
//!     Ok(())
//! }
//! ```
//!
//! A client that spawns the agent and runs a prompt:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use airs_acp::integration::{AcpClient, ClientConfig, LocalFsHandler};
//! use airs_acp::permission::AllowAllPermissions;
//! use airs_acp::protocol::{AcpResult, ContentBlock};
//! use airs_acp::transport::SubprocessConfig;
//!
//! #[tokio::main]
//! async fn main() -> AcpResult<()> {
//!     let client = AcpClient::new(
//!         ClientConfig::default(),
//!         Arc::new(LocalFsHandler),
//!         Arc::new(AllowAllPermissions),
//!     );
//!     client
//!         .connect_subprocess(SubprocessConfig {
//!             command: "my-agent".to_string(),
//!             ..Default::default()
//!         })
//!         .await?;
//!
//!     client.initialize().await?;
//!     let session = client.new_session("/project").await?;
//!     let stop = client
//!         .prompt(&session.session_id, vec![ContentBlock::text("hi")])
//!         .await?;
//!     println!("turn ended: {stop:?}");
//!     Ok(())
//! }
//! ```

pub mod correlation;
pub mod dispatcher;
pub mod integration;
pub mod permission;
pub mod protocol;
pub mod session;
pub mod terminal;
pub mod toolcall;
pub mod transport;

// Convenience re-exports for the most common entry points
pub use integration::{AcpAgent, AcpClient, AgentConfig, AgentSession, ClientConfig};
pub use protocol::{
    AcpError, AcpResult, ContentBlock, JsonRpcMessage, JsonRpcMessageTrait, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, RequestId, SessionId, StopReason,
};
