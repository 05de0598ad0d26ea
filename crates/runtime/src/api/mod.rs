//! Public runtime API surface.
//!
//! This module gathers the types exposed to consumers of the runtime crate so
//! other layers can stay focused on orchestration, workers, or infrastructure.

pub mod errors;
pub mod handle;
pub mod registry;
pub mod session;
pub mod wire;

pub use errors::{Result, RuntimeError};
pub use handle::RuntimeHandle;
pub use registry::CommandRegistry;
pub use session::{ClientSession, Confirmation};
pub use wire::{ClientId, ClientMessage, CommandEnvelope, CommandId, ServerMessage};
