use serde::{Deserialize, Serialize};

use crate::types::ValueType;

/// Unified error type for all storage backend operations.
///
/// Each variant includes a `backend` field naming the backend that produced
/// the error (empty when the error does not come from a backend, e.g. a
/// keyfile parse failure), plus variant-specific context.
///
/// # Negative results vs. failures
///
/// - [`NotImplemented`](Self::NotImplemented) and [`Rejected`](Self::Rejected)
///   are normal negative results from read-only or limited backends.
/// - [`NotFound`](Self::NotFound) means the account or key is absent.
/// - [`Failure`](Self::Failure) is a backend-internal error such as an I/O
///   failure during commit or delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code")]
pub enum StorageError {
    /// The backend does not support this operation.
    NotImplemented {
        /// Backend that produced the error.
        backend: String,
        /// Name of the unsupported operation.
        operation: String,
    },

    /// The backend examined the request and declined it.
    Rejected {
        /// Backend that produced the error.
        backend: String,
        /// Why the request was declined.
        detail: String,
    },

    /// The account or key does not exist in this backend.
    NotFound {
        /// Backend that produced the error.
        backend: String,
        /// Account (and key, if any) that was not found.
        what: String,
    },

    /// A backend-internal error.
    Failure {
        /// Backend that produced the error.
        backend: String,
        /// Error details.
        detail: String,
    },

    /// A stored value could not be interpreted as the requested type.
    InvalidValue {
        /// Backend that produced the error.
        backend: String,
        /// The type the caller asked for.
        expected: ValueType,
        /// Error details.
        detail: String,
    },

    /// The operation observed a cancellation request and stopped.
    Cancelled {
        /// Backend that produced the error.
        backend: String,
    },
}

impl StorageError {
    /// Shortcut for [`StorageError::NotImplemented`].
    pub fn not_implemented(backend: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::NotImplemented {
            backend: backend.into(),
            operation: operation.into(),
        }
    }

    /// Shortcut for [`StorageError::Failure`].
    pub fn failure(backend: impl Into<String>, detail: impl ToString) -> Self {
        Self::Failure {
            backend: backend.into(),
            detail: detail.to_string(),
        }
    }

    /// Shortcut for a keyfile-level [`StorageError::InvalidValue`].
    pub fn invalid_value(expected: ValueType, detail: impl ToString) -> Self {
        Self::InvalidValue {
            backend: String::new(),
            expected,
            detail: detail.to_string(),
        }
    }

    /// Attach the backend name to an error raised below the backend layer.
    #[must_use]
    pub fn with_backend(self, name: &str) -> Self {
        match self {
            Self::InvalidValue {
                backend,
                expected,
                detail,
            } if backend.is_empty() => Self::InvalidValue {
                backend: name.to_string(),
                expected,
                detail,
            },
            other => other,
        }
    }

    /// Whether this is a normal negative outcome (read-only backend, declined
    /// write, missing key) rather than a fault. Callers log `warn` for `true`
    /// and `error` for `false`.
    #[must_use]
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::NotImplemented { .. }
                | Self::Rejected { .. }
                | Self::NotFound { .. }
                | Self::Cancelled { .. }
        )
    }
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotImplemented { backend, operation } => {
                write!(f, "[{backend}] Operation not implemented: {operation}")
            }
            Self::Rejected { backend, detail } => {
                write!(f, "[{backend}] Rejected: {detail}")
            }
            Self::NotFound { backend, what } => {
                write!(f, "[{backend}] '{what}' not found")
            }
            Self::Failure { backend, detail } => {
                write!(f, "[{backend}] {detail}")
            }
            Self::InvalidValue {
                backend,
                expected,
                detail,
            } => {
                if backend.is_empty() {
                    write!(f, "Invalid {expected} value: {detail}")
                } else {
                    write!(f, "[{backend}] Invalid {expected} value: {detail}")
                }
            }
            Self::Cancelled { backend } => {
                write!(f, "[{backend}] Operation cancelled")
            }
        }
    }
}

impl std::error::Error for StorageError {}

/// Convenience type alias for `Result<T, StorageError>`.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
