//! Static item content exposed through [`items_core::DefinitionOracle`].
//!
//! Definitions are immutable at runtime and shared by every store, authority
//! and replica alike; dynamic state lives in the stores and repositories.
mod definitions;

use thiserror::Error;

pub use definitions::{DefinitionCatalog, DefinitionOracleImpl};

/// Errors raised while loading item definitions.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("failed to read definitions from {path}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse definition catalog RON: {0}")]
    Parse(String),

    #[error("definition `{id}` is declared twice")]
    DuplicateDefinition { id: String },

    #[error("definition `{id}` is invalid: {reason}")]
    InvalidDefinition { id: String, reason: &'static str },
}
