//! Unified error types surfaced by the runtime API.
//!
//! Wraps failures from worker coordination, repositories, definition loading
//! and the command codec so callers can bubble them up with consistent context.
use thiserror::Error;
use tokio::sync::oneshot;

use items_core::{CommandError, StoreError, StoreId};

use crate::api::wire::CommandId;
pub use crate::oracle::OracleError;
pub use crate::repository::RepositoryError;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("authority worker command channel closed")]
    CommandChannelClosed,

    #[error("authority worker reply channel closed")]
    ReplyChannelClosed(#[source] oneshot::error::RecvError),

    #[error("authority worker join failed")]
    WorkerJoin(#[source] tokio::task::JoinError),

    #[error("authority link closed")]
    LinkClosed,

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error("runtime requires item definitions to be configured before building")]
    MissingDefinitions,

    #[error("no store repository configured")]
    MissingRepository,

    #[error("no command registered for tag `{tag}`")]
    UnknownCommandTag { tag: String },

    #[error("failed to encode command `{tag}`: {message}")]
    Encode { tag: String, message: String },

    #[error("failed to decode command `{tag}`: {message}")]
    Decode { tag: String, message: String },

    #[error("store {store} is not registered")]
    UnknownStore { store: StoreId },

    #[error("command {id} is not in flight")]
    UnknownCommand { id: CommandId },

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
