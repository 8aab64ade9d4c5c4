//! Integration Layer - Peer Façades
//!
//! High-level entry points for both ends of an ACP connection:
//!
//! - [`AcpAgent`]: the agent peer; owns the session registry and the
//!   `session/*` handler slots, delegating prompt turns to the
//!   application's [`PromptHandler`] through an [`AgentSession`] handle
//! - [`AcpClient`]: the client peer; owns the terminal manager, the
//!   permission broker, and the `fs/*`, `terminal/*`, `session/update`
//!   wiring
//!
//! Both peers negotiate capabilities via `initialize`; gated methods fail
//! locally with `CapabilityNotSupported` when the remote did not announce
//! the capability.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use serde::de::DeserializeOwned;
use serde_json::Value;

// Layer 3: Internal module imports
use crate::protocol::{AcpError, AcpResult};

pub mod agent;
pub mod client;
pub mod handler;

pub use agent::{AcpAgent, AgentConfig, AgentSession};
pub use client::{AcpClient, ClientConfig};
pub use handler::{FsHandler, LocalFsHandler, PromptHandler};

/// Deserialize request params (or a response result), mapping failures to
/// `InvalidParams`.
pub(crate) fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> AcpResult<T> {
    serde_json::from_value(params.unwrap_or(Value::Null))
        .map_err(|e| AcpError::invalid_params(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PromptRequest;
    use serde_json::json;

    #[test]
    fn test_parse_params_missing_field() {
        let err = parse_params::<PromptRequest>(Some(json!({"sessionId": "s1"}))).unwrap_err();
        assert_eq!(err.code, crate::protocol::codes::INVALID_PARAMS);
    }

    #[test]
    fn test_parse_params_none_is_null() {
        let err = parse_params::<PromptRequest>(None).unwrap_err();
        assert_eq!(err.code, crate::protocol::codes::INVALID_PARAMS);
    }
}
