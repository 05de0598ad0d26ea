//! Worker tasks that back the runtime orchestration.
//!
//! The authority worker owns the authoritative stores and is the only task
//! that executes replicated commands.

mod authority;

pub use authority::{AuthorityWorker, Command, Connected};
