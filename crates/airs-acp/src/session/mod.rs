//! Session Layer - Lifecycle, Registry, and Update Streams
//!
//! Sessions are active from creation until peer shutdown or transport
//! close; deactivation is one-way. The registry routes `session/update`
//! notifications to subscribers in transport-receive order, and the chunk
//! assembler restores in-order text from indexed chunks.

pub mod chunks;
pub mod registry;
pub mod session;

pub use chunks::ChunkAssembler;
pub use registry::SessionRegistry;
pub use session::{PromptGuard, Session};
