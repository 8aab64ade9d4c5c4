//! Correlation Module
//!
//! Request/response correlation for bidirectional JSON-RPC communication in
//! the Agent Client Protocol runtime.
//!
//! ## Architecture
//!
//! - `manager.rs` - Core CorrelationManager implementation
//! - `types.rs` - Type definitions for the correlation system
//! - `error.rs` - Error types and result definitions
//!
//! Every outbound request registers a pending entry keyed by its id; exactly
//! one of three things resolves it: a matching response, the deadline firing,
//! or the transport closing.

pub mod error;
pub mod manager;
pub mod types;

pub use error::{CorrelationError, CorrelationResult};
pub use manager::{CorrelationConfig, CorrelationManager};
pub use types::{PendingRequest, RequestIdGenerator};
