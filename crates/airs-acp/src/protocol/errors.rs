//! Error Types - Protocol Error Handling
//!
//! This module consolidates the protocol-level error taxonomy:
//! - `ProtocolError` for codec failures (malformed envelopes, serialization)
//! - `AcpError` for method-level failures carrying a JSON-RPC error code
//!
//! `AcpError` is the single error currency between handlers and the
//! dispatcher: handlers return it, the dispatcher serializes it into the
//! JSON-RPC error object, and the requesting side rehydrates it from the
//! error object on a response.

// Layer 1: Standard library imports
// (None required for current thiserror implementation)

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Codec-level errors raised while parsing or serializing envelopes
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    /// The frame was not a valid JSON-RPC 2.0 envelope
    #[error("Invalid envelope: {message}")]
    InvalidEnvelope { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl ProtocolError {
    /// Create an invalid envelope error
    pub fn invalid_envelope(message: impl Into<String>) -> Self {
        Self::InvalidEnvelope {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

/// JSON-RPC error codes used by the ACP runtime
///
/// The first five are the standard JSON-RPC 2.0 codes; the `-320xx` range is
/// reserved for ACP-specific failures.
pub mod codes {
    /// Parse error (-32700)
    pub const PARSE_ERROR: i64 = -32700;
    /// Invalid request (-32600)
    pub const INVALID_REQUEST: i64 = -32600;
    /// Method not found (-32601)
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Invalid parameters (-32602)
    pub const INVALID_PARAMS: i64 = -32602;
    /// Internal error (-32603)
    pub const INTERNAL_ERROR: i64 = -32603;
    /// Session id is unknown to the peer (-32001)
    pub const SESSION_NOT_FOUND: i64 = -32001;
    /// Authentication required (-32002)
    pub const AUTH_REQUIRED: i64 = -32002;
    /// Permission denied by the client policy (-32003)
    pub const PERMISSION_DENIED: i64 = -32003;
    /// Operation cancelled cooperatively (-32004)
    pub const OPERATION_CANCELLED: i64 = -32004;
    /// Resource (terminal, file) not found (-32005)
    pub const RESOURCE_NOT_FOUND: i64 = -32005;
    /// Resource access denied (-32006)
    pub const RESOURCE_ACCESS_DENIED: i64 = -32006;
    /// Operation illegal in the current session/tool-call state (-32007)
    pub const INVALID_SESSION_STATE: i64 = -32007;
    /// Remote peer did not announce the required capability (-32008)
    pub const CAPABILITY_NOT_SUPPORTED: i64 = -32008;
    /// Pending-request table is full (-32009)
    pub const RATE_LIMITED: i64 = -32009;
    /// Request deadline elapsed (-32010)
    pub const TIMEOUT: i64 = -32010;
}

/// Method-level ACP error with its JSON-RPC error code
///
/// Carries the code, a human-readable message, and optional structured data.
/// Serializes to (and deserializes from) the JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("ACP error {code}: {message}")]
pub struct AcpError {
    /// JSON-RPC error code (see [`codes`])
    pub code: i64,
    /// Human-readable description
    pub message: String,
    /// Optional structured diagnostic data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl AcpError {
    /// Create an error with an explicit code
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attach structured data to this error
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Create a parse error (-32700)
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(codes::PARSE_ERROR, message)
    }

    /// Create an invalid request error (-32600)
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_REQUEST, message)
    }

    /// Create a method not found error (-32601)
    pub fn method_not_found(method: impl Into<String>) -> Self {
        let method = method.into();
        Self::new(codes::METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    /// Create an invalid parameters error (-32602)
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_PARAMS, message)
    }

    /// Create an internal error (-32603)
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(codes::INTERNAL_ERROR, message)
    }

    /// Create a session not found error (-32001)
    pub fn session_not_found(session_id: impl std::fmt::Display) -> Self {
        Self::new(
            codes::SESSION_NOT_FOUND,
            format!("Session not found: {session_id}"),
        )
    }

    /// Create an authentication required error (-32002)
    pub fn auth_required(message: impl Into<String>) -> Self {
        Self::new(codes::AUTH_REQUIRED, message)
    }

    /// Create a permission denied error (-32003)
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(codes::PERMISSION_DENIED, message)
    }

    /// Create an operation cancelled error (-32004)
    pub fn operation_cancelled(message: impl Into<String>) -> Self {
        Self::new(codes::OPERATION_CANCELLED, message)
    }

    /// Create a resource not found error (-32005)
    pub fn resource_not_found(resource: impl std::fmt::Display) -> Self {
        Self::new(
            codes::RESOURCE_NOT_FOUND,
            format!("Resource not found: {resource}"),
        )
    }

    /// Create a resource access denied error (-32006)
    pub fn resource_access_denied(message: impl Into<String>) -> Self {
        Self::new(codes::RESOURCE_ACCESS_DENIED, message)
    }

    /// Create an invalid session state error (-32007)
    pub fn invalid_session_state(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_SESSION_STATE, message)
    }

    /// Create a capability not supported error (-32008)
    pub fn capability_not_supported(capability: impl Into<String>) -> Self {
        let capability = capability.into();
        Self::new(
            codes::CAPABILITY_NOT_SUPPORTED,
            format!("Capability not supported: {capability}"),
        )
    }

    /// Create a rate limited error (-32009)
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(codes::RATE_LIMITED, message)
    }

    /// Create a timeout error (-32010)
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(codes::TIMEOUT, message)
    }

    /// Serialize into the JSON-RPC error object
    pub fn to_error_object(&self) -> Value {
        let mut obj = serde_json::json!({
            "code": self.code,
            "message": self.message,
        });
        if let Some(data) = &self.data {
            obj["data"] = data.clone();
        }
        obj
    }

    /// Rehydrate from a JSON-RPC error object found on a response
    ///
    /// Unknown or malformed error objects degrade to an internal error that
    /// preserves the raw value as `data`.
    pub fn from_error_object(value: &Value) -> Self {
        match serde_json::from_value::<AcpError>(value.clone()) {
            Ok(err) => err,
            Err(_) => Self::internal_error("malformed error object").with_data(value.clone()),
        }
    }
}

/// Convenient result type for ACP method handlers
pub type AcpResult<T> = Result<T, AcpError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_code_constructors() {
        assert_eq!(AcpError::parse_error("x").code, -32700);
        assert_eq!(AcpError::invalid_request("x").code, -32600);
        assert_eq!(AcpError::method_not_found("m").code, -32601);
        assert_eq!(AcpError::invalid_params("x").code, -32602);
        assert_eq!(AcpError::internal_error("x").code, -32603);
        assert_eq!(AcpError::session_not_found("s1").code, -32001);
        assert_eq!(AcpError::auth_required("x").code, -32002);
        assert_eq!(AcpError::permission_denied("x").code, -32003);
        assert_eq!(AcpError::operation_cancelled("x").code, -32004);
        assert_eq!(AcpError::resource_not_found("t1").code, -32005);
        assert_eq!(AcpError::resource_access_denied("x").code, -32006);
        assert_eq!(AcpError::invalid_session_state("x").code, -32007);
        assert_eq!(AcpError::capability_not_supported("x").code, -32008);
        assert_eq!(AcpError::rate_limited("x").code, -32009);
        assert_eq!(AcpError::timeout("x").code, -32010);
    }

    #[test]
    fn test_error_object_round_trip() {
        let err = AcpError::invalid_params("missing sessionId").with_data(json!({"field": "sessionId"}));
        let obj = err.to_error_object();
        assert_eq!(obj["code"], -32602);
        let back = AcpError::from_error_object(&obj);
        assert_eq!(back, err);
    }

    #[test]
    fn test_malformed_error_object_degrades() {
        let back = AcpError::from_error_object(&json!({"oops": true}));
        assert_eq!(back.code, codes::INTERNAL_ERROR);
        assert_eq!(back.data, Some(json!({"oops": true})));
    }

    #[test]
    fn test_method_not_found_message() {
        let err = AcpError::method_not_found("session/fork");
        assert!(err.message.contains("session/fork"));
    }
}
