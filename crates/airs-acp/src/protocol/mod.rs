//! Protocol Layer - JSON-RPC 2.0 Foundation and ACP Types
//!
//! This module provides the JSON-RPC 2.0 message foundation together with the
//! ACP-specific payload types exchanged between client and agent.
//!
//! ## Module Organization
//!
//! - `message`: JSON-RPC 2.0 message types with trait-based serialization and
//!   the strict envelope classifier
//! - `types`: ACP payload types (sessions, tool calls, permissions, terminals)
//! - `constants`: method names and protocol defaults
//! - `errors`: codec errors and the `AcpError` code taxonomy

// Layer 1: Standard library imports
// (None required for module declarations)

// Layer 2: Third-party crate imports
// (None required for module declarations)

// Layer 3: Internal module imports
// (None required for module declarations)

// Module declarations (workspace standard: declarations only in mod.rs)
pub mod constants;
pub mod errors;
pub mod message;
pub mod types;

// Public re-exports (workspace standard: clean API surface)
pub use constants::*;
pub use errors::*;
pub use message::*;
pub use types::*;
