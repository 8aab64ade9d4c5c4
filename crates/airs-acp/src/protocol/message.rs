//! JSON-RPC 2.0 Message Implementation
//!
//! This module provides the JSON-RPC 2.0 message types underpinning the Agent
//! Client Protocol, with shared serialization behavior through traits and a
//! strict envelope validator used by the transports.
//!
//! # Architecture
//!
//! The message layer is organized as follows:
//! - Core JSON-RPC 2.0 message types with the `JsonRpcMessageTrait`
//! - Strict envelope classification (`JsonRpcMessage::parse`) that rejects
//!   malformed frames before they reach the dispatcher
//! - Convenience constructors for requests, responses, and notifications
//!
//! # Examples
//!
//! ```rust
//! use airs_acp::protocol::{JsonRpcRequest, JsonRpcMessageTrait, RequestId};
//! use serde_json::json;
//!
//! let request = JsonRpcRequest::new(
//!     "session/new",
//!     Some(json!({"workingDirectory": "/p"})),
//!     RequestId::new_number(1),
//! );
//!
//! let json = request.to_json().unwrap();
//! let parsed = JsonRpcRequest::from_json(&json).unwrap();
//!
//! assert_eq!(request, parsed);
//! ```

// Layer 1: Standard library imports
use std::fmt;

// Layer 2: Third-party crate imports
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// Layer 3: Internal module imports
use super::errors::ProtocolError;

/// JSON-RPC message types supporting requests, responses, and notifications
///
/// This enum unifies all JSON-RPC 2.0 message types into a single type for
/// transport and dispatch. Each variant preserves the specific structure of
/// its message type while providing unified serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    /// JSON-RPC request message
    Request(JsonRpcRequest),
    /// JSON-RPC notification message
    ///
    /// Tried before `Response` during untagged deserialization: a response
    /// carries no `method`, so it can never match here, while a
    /// notification would otherwise match `Response` (whose fields are all
    /// optional).
    Notification(JsonRpcNotification),
    /// JSON-RPC response message
    Response(JsonRpcResponse),
}

/// Trait for JSON-RPC message serialization and deserialization
///
/// Provides common functionality for all JSON-RPC message types, ensuring
/// consistent serialization behavior. Any type that implements
/// `Serialize + Deserialize` gets the default implementations for free.
pub trait JsonRpcMessageTrait: Serialize + for<'de> Deserialize<'de> {
    /// Serialize this message to a JSON string
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if serialization fails, which should be
    /// rare given the controlled structure of JSON-RPC messages.
    fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize this message to pretty-printed JSON
    ///
    /// Useful for debugging and logging.
    fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from a JSON string
    fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Zero-copy serialization to a buffer
    ///
    /// Serializes the message directly to a buffer, avoiding an intermediate
    /// string allocation.
    fn serialize_to_buffer(&self, buffer: &mut BytesMut) -> Result<(), serde_json::Error> {
        serde_json::to_writer(buffer.writer(), self)
    }

    /// Serialize this message to bytes
    fn to_bytes(&self) -> Result<Bytes, serde_json::Error> {
        let mut buffer = BytesMut::with_capacity(256);
        self.serialize_to_buffer(&mut buffer)?;
        Ok(buffer.freeze())
    }

    /// Deserialize a message from JSON bytes
    fn from_json_bytes(json: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(json)
    }
}

impl JsonRpcMessage {
    /// Create a new notification message
    pub fn from_notification(method: &str, params: Option<Value>) -> Self {
        JsonRpcMessage::Notification(JsonRpcNotification::new(method, params))
    }

    /// Create a new request message
    pub fn from_request(method: &str, params: Option<Value>, id: RequestId) -> Self {
        JsonRpcMessage::Request(JsonRpcRequest::new(method, params, id))
    }

    /// Create a new success response message
    pub fn from_response(result: Value, id: RequestId) -> Self {
        JsonRpcMessage::Response(JsonRpcResponse::success(result, id))
    }

    /// Parse and strictly validate a JSON-RPC 2.0 envelope
    ///
    /// Unlike plain deserialization of the untagged enum, this classifier
    /// enforces the envelope rules before handing a message to the
    /// dispatcher:
    ///
    /// - `jsonrpc` must be exactly `"2.0"`
    /// - a request carries a string `method` and a string or integer `id`
    /// - a notification carries a string `method` and no `id`
    /// - a response carries exactly one of `result` or `error`, and `error`
    ///   (when present) is an object with an integer `code` and string
    ///   `message`
    ///
    /// Any violation is reported as a [`ProtocolError::InvalidEnvelope`],
    /// which the transports surface as a JSON-RPC parse error (`-32700`).
    pub fn parse(json: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| ProtocolError::invalid_envelope(format!("invalid JSON: {e}")))?;
        Self::classify(value)
    }

    /// Classify an already-parsed JSON value, applying the envelope rules of
    /// [`JsonRpcMessage::parse`].
    pub fn classify(value: Value) -> Result<Self, ProtocolError> {
        let obj = value
            .as_object()
            .ok_or_else(|| ProtocolError::invalid_envelope("message is not a JSON object"))?;

        match obj.get("jsonrpc").and_then(Value::as_str) {
            Some("2.0") => {}
            Some(other) => {
                return Err(ProtocolError::invalid_envelope(format!(
                    "unsupported jsonrpc version: {other}"
                )))
            }
            None => return Err(ProtocolError::invalid_envelope("missing jsonrpc field")),
        }

        if let Some(method) = obj.get("method") {
            let method = method
                .as_str()
                .ok_or_else(|| ProtocolError::invalid_envelope("method is not a string"))?
                .to_string();
            let params = obj.get("params").cloned();
            if let Some(p) = &params {
                if !(p.is_object() || p.is_array() || p.is_null()) {
                    return Err(ProtocolError::invalid_envelope(
                        "params must be an object or array",
                    ));
                }
            }

            return match obj.get("id") {
                None => Ok(JsonRpcMessage::Notification(JsonRpcNotification {
                    jsonrpc: "2.0".to_string(),
                    method,
                    params,
                })),
                Some(id) => Ok(JsonRpcMessage::Request(JsonRpcRequest {
                    jsonrpc: "2.0".to_string(),
                    method,
                    params,
                    id: parse_id(id)?,
                })),
            };
        }

        // No method: must be a response
        let result = obj.get("result").cloned();
        let error = obj.get("error").cloned();
        match (&result, &error) {
            (Some(_), Some(_)) => {
                return Err(ProtocolError::invalid_envelope(
                    "response carries both result and error",
                ))
            }
            (None, None) => {
                return Err(ProtocolError::invalid_envelope(
                    "message is neither a request nor a response",
                ))
            }
            _ => {}
        }

        if let Some(err) = &error {
            let err_obj = err
                .as_object()
                .ok_or_else(|| ProtocolError::invalid_envelope("error is not an object"))?;
            if !err_obj.get("code").is_some_and(Value::is_i64) {
                return Err(ProtocolError::invalid_envelope(
                    "error object requires an integer code",
                ));
            }
            if !err_obj.get("message").is_some_and(|m| m.is_string()) {
                return Err(ProtocolError::invalid_envelope(
                    "error object requires a string message",
                ));
            }
        }

        let id = match obj.get("id") {
            None | Some(Value::Null) => None,
            Some(id) => Some(parse_id(id)?),
        };

        Ok(JsonRpcMessage::Response(JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            result,
            error,
            id,
        }))
    }
}

fn parse_id(id: &Value) -> Result<RequestId, ProtocolError> {
    match id {
        Value::String(s) => Ok(RequestId::String(s.clone())),
        Value::Number(n) => n
            .as_i64()
            .map(RequestId::Number)
            .ok_or_else(|| ProtocolError::invalid_envelope("id is not an integer")),
        _ => Err(ProtocolError::invalid_envelope(
            "id must be a string or integer",
        )),
    }
}

/// Request ID supporting both string and numeric formats per JSON-RPC 2.0
///
/// The JSON-RPC 2.0 specification allows request IDs to be strings, numbers,
/// or null. This enum supports string and numeric variants; null IDs are
/// represented by `Option<RequestId>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// String-based request identifier
    String(String),
    /// Numeric request identifier
    Number(i64),
}

impl RequestId {
    /// Create a new string-based request ID
    pub fn new_string(id: impl Into<String>) -> Self {
        RequestId::String(id.into())
    }

    /// Create a new numeric request ID
    pub fn new_number(id: i64) -> Self {
        RequestId::Number(id)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::String(s) => write!(f, "{s}"),
            RequestId::Number(n) => write!(f, "{n}"),
        }
    }
}

/// JSON-RPC 2.0 Request Message
///
/// Represents a request to invoke a method on the remote peer. All fields are
/// required except for params, which may be omitted if the method takes no
/// parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcRequest {
    /// Protocol version - always "2.0" for JSON-RPC 2.0 compliance
    pub jsonrpc: String,

    /// Name of the method to invoke
    pub method: String,

    /// Parameters for the method (object or array)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,

    /// Unique identifier for this request
    pub id: RequestId,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC 2.0 request
    pub fn new(method: impl Into<String>, params: Option<Value>, id: RequestId) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
            id,
        }
    }
}

impl JsonRpcMessageTrait for JsonRpcRequest {}

/// JSON-RPC 2.0 Response Message
///
/// Represents the response to a JSON-RPC request. Contains either a
/// successful result or error information, never both (mutual exclusion
/// enforced by the JSON-RPC spec and by [`JsonRpcMessage::parse`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcResponse {
    /// Protocol version - always "2.0" for JSON-RPC 2.0 compliance
    pub jsonrpc: String,

    /// Result of successful method invocation (mutually exclusive with error)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error information for failed method invocation (mutually exclusive with result)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,

    /// Request identifier from the original request (null for parse errors)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
}

impl JsonRpcResponse {
    /// Create a successful JSON-RPC 2.0 response
    pub fn success(result: Value, id: RequestId) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id: Some(id),
        }
    }

    /// Create an error JSON-RPC 2.0 response
    ///
    /// The `error` value should conform to the JSON-RPC error object
    /// structure; `id` is `None` for parse errors where the request id was
    /// never recovered.
    pub fn error(error: Value, id: Option<RequestId>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }
}

impl JsonRpcMessageTrait for JsonRpcResponse {}

/// JSON-RPC 2.0 Notification Message
///
/// Represents a notification - a request that does not expect a response.
/// Notifications are "fire and forget" messages used for session updates and
/// cancellation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcNotification {
    /// Protocol version - always "2.0" for JSON-RPC 2.0 compliance
    pub jsonrpc: String,

    /// Name of the notification method
    pub method: String,

    /// Parameters for the notification (object or array)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    // Note: No `id` field - this is what makes it a notification instead of a request
}

impl JsonRpcNotification {
    /// Create a new JSON-RPC 2.0 notification
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
        }
    }
}

impl JsonRpcMessageTrait for JsonRpcNotification {}

impl JsonRpcMessageTrait for JsonRpcMessage {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_round_trip() {
        let request = JsonRpcRequest::new(
            "session/prompt",
            Some(json!({"sessionId": "s1", "content": [{"type": "text", "text": "hi"}]})),
            RequestId::new_number(7),
        );

        let json = request.to_json().unwrap();
        let parsed = JsonRpcRequest::from_json(&json).unwrap();
        assert_eq!(request, parsed);
    }

    #[test]
    fn test_classify_request() {
        let msg = JsonRpcMessage::parse(r#"{"jsonrpc":"2.0","method":"initialize","id":1}"#)
            .unwrap();
        match msg {
            JsonRpcMessage::Request(req) => {
                assert_eq!(req.method, "initialize");
                assert_eq!(req.id, RequestId::new_number(1));
            }
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_notification() {
        let msg = JsonRpcMessage::parse(
            r#"{"jsonrpc":"2.0","method":"session/update","params":{"sessionId":"s1"}}"#,
        )
        .unwrap();
        assert!(matches!(msg, JsonRpcMessage::Notification(_)));
    }

    #[test]
    fn test_classify_response_string_id() {
        let msg =
            JsonRpcMessage::parse(r#"{"jsonrpc":"2.0","result":{"ok":true},"id":"req-2"}"#)
                .unwrap();
        match msg {
            JsonRpcMessage::Response(resp) => {
                assert_eq!(resp.id, Some(RequestId::new_string("req-2")));
                assert!(resp.error.is_none());
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_error_response_null_id() {
        let msg = JsonRpcMessage::parse(
            r#"{"jsonrpc":"2.0","error":{"code":-32700,"message":"Parse error"},"id":null}"#,
        )
        .unwrap();
        match msg {
            JsonRpcMessage::Response(resp) => assert!(resp.id.is_none()),
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_missing_version() {
        let err = JsonRpcMessage::parse(r#"{"method":"initialize","id":1}"#).unwrap_err();
        assert!(err.to_string().contains("jsonrpc"));
    }

    #[test]
    fn test_rejects_wrong_version() {
        assert!(JsonRpcMessage::parse(r#"{"jsonrpc":"1.0","method":"x","id":1}"#).is_err());
    }

    #[test]
    fn test_rejects_result_and_error() {
        let err = JsonRpcMessage::parse(
            r#"{"jsonrpc":"2.0","result":1,"error":{"code":-32603,"message":"x"},"id":1}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("both result and error"));
    }

    #[test]
    fn test_rejects_non_string_method() {
        assert!(JsonRpcMessage::parse(r#"{"jsonrpc":"2.0","method":42,"id":1}"#).is_err());
    }

    #[test]
    fn test_rejects_fractional_id() {
        assert!(JsonRpcMessage::parse(r#"{"jsonrpc":"2.0","method":"x","id":1.5}"#).is_err());
    }

    #[test]
    fn test_rejects_malformed_error_object() {
        assert!(
            JsonRpcMessage::parse(r#"{"jsonrpc":"2.0","error":{"message":"x"},"id":1}"#).is_err()
        );
    }

    #[test]
    fn test_serialize_parse_semantic_equality() {
        // serialize(parse(json)) is semantically equal to the input
        let inputs = [
            r#"{"jsonrpc":"2.0","method":"terminal/create","params":{"command":"echo"},"id":3}"#,
            r#"{"jsonrpc":"2.0","method":"session/cancel","params":{"sessionId":"s1"}}"#,
            r#"{"jsonrpc":"2.0","result":{"stopReason":"end_turn"},"id":"p-1"}"#,
        ];
        for input in inputs {
            let msg = JsonRpcMessage::parse(input).unwrap();
            let serialized = msg.to_json().unwrap();
            let original: Value = serde_json::from_str(input).unwrap();
            let round_tripped: Value = serde_json::from_str(&serialized).unwrap();
            assert_eq!(original, round_tripped);
        }
    }

    #[test]
    fn test_to_bytes_matches_to_json() {
        let notification = JsonRpcNotification::new("session/update", Some(json!({"x": 1})));
        let bytes = notification.to_bytes().unwrap();
        assert_eq!(bytes, notification.to_json().unwrap().as_bytes());
    }
}
