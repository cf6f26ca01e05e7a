//! Unified error type definition

use serde::Serialize;
use thiserror::Error;

// Re-export library error type
pub use account_storage_plugin::StorageError;

/// Core layer error type
#[derive(Error, Debug, Serialize)]
#[serde(tag = "code", content = "details")]
pub enum CoreError {
    /// No backend holds this account
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// The registry is empty
    #[error("No storage backends registered")]
    NoBackends,

    /// Every backend declined the write; nothing changed
    #[error("No backend claimed {key} on account {account}")]
    WriteFailed { account: String, key: String },

    /// Every backend declined to create the account
    #[error("No backend could create a {manager}/{protocol} account: {reason}")]
    CreateFailed {
        manager: String,
        protocol: String,
        reason: String,
    },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Backend error (converted from the plugin layer)
    #[error("{0}")]
    Storage(#[from] StorageError),
}

impl CoreError {
    /// Whether it is expected behavior (unknown account, read-only backend,
    /// declined write), used for log classification.
    ///
    /// Level `warn` should be used when returning `true` and level `error` when returning `false`.
    /// **Please update this method simultaneously when new variants are added.**
    #[must_use]
    pub fn is_expected(&self) -> bool {
        match self {
            Self::AccountNotFound(_) | Self::WriteFailed { .. } | Self::CreateFailed { .. } => {
                true
            }
            Self::Storage(e) => e.is_expected(),
            Self::NoBackends | Self::Config(_) => false,
        }
    }
}

/// Core layer Result type alias
pub type CoreResult<T> = std::result::Result<T, CoreError>;
