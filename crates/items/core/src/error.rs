//! Common error infrastructure for items-core.
//!
//! Domain errors (`StoreError`, `CommandError`, `TagError`) live beside the
//! operations that raise them. This module holds the shared classification
//! used for logging and recovery decisions.

use crate::id::{ItemId, StoreId};

/// Severity level of an error, used for categorization and recovery strategies.
///
/// - **Recoverable**: the same request may succeed later (slot freed, lock released)
/// - **Validation**: the request itself is wrong and must not be retried unchanged
/// - **Internal**: the store disagrees with its own bookkeeping
/// - **Fatal**: the store can no longer be trusted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum ErrorSeverity {
    /// Examples: slot occupied, item pending on another command, stale version.
    Recoverable,

    /// Examples: unknown definition, item not found, attach slot not declared.
    Validation,

    /// Examples: index points at an empty arena slot.
    Internal,

    Fatal,
}

impl ErrorSeverity {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Recoverable => "recoverable",
            Self::Validation => "validation",
            Self::Internal => "internal",
            Self::Fatal => "fatal",
        }
    }

    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable)
    }

    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal | Self::Fatal)
    }
}

/// Contextual information attached to errors for diagnostics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ErrorContext {
    /// Item the failing operation targeted.
    pub item: Option<ItemId>,

    /// Store the failing operation ran against.
    pub store: Option<StoreId>,

    /// Record version observed when the error was raised.
    pub version: Option<u32>,

    pub message: Option<&'static str>,
}

impl ErrorContext {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            item: None,
            store: None,
            version: None,
            message: None,
        }
    }

    #[must_use]
    pub const fn with_item(mut self, item: ItemId) -> Self {
        self.item = Some(item);
        self
    }

    #[must_use]
    pub const fn with_store(mut self, store: StoreId) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub const fn with_version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    #[must_use]
    pub const fn with_message(mut self, message: &'static str) -> Self {
        self.message = Some(message);
        self
    }
}

/// Common trait for all items-core errors.
///
/// Every error enum in the crate implements this so callers (the runtime in
/// particular) can pick a log level and a retry policy without matching on
/// concrete variants.
pub trait ItemsError: core::fmt::Display + core::fmt::Debug {
    fn severity(&self) -> ErrorSeverity;

    fn context(&self) -> Option<&ErrorContext> {
        None
    }

    /// Stable identifier for metrics and tests.
    fn error_code(&self) -> &'static str {
        core::any::type_name::<Self>()
    }
}
