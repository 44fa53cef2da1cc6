//! Error types for graphview.
//!
//! Errors are strongly typed using thiserror. Store and render backends
//! report their own error enums; [`ViewError`] is what view operations return.

use thiserror::Error;

use crate::address::Address;
use crate::trigger::CallbackKey;

/// Errors raised by a [`Store`](crate::storage::Store) backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No record exists at the address.
    #[error("Record not found: {0}")]
    RecordNotFound(Address),

    /// Commit or rollback failed.
    #[error("Transaction error: {0}")]
    TransactionError(String),

    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),
}

/// Errors raised by a [`RenderSink`](crate::render::RenderSink).
#[derive(Debug, Error)]
pub enum RenderError {
    /// The sink refused the write.
    #[error("Render sink rejected write at {path}: {reason}")]
    Rejected {
        /// Rendered path of the slot, e.g. `0x10/0x14`.
        path: String,
        /// Why the sink refused it.
        reason: String,
    },

    /// Backend error.
    #[error("Render backend error: {0}")]
    BackendError(String),
}

/// A single subscriber failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("callback '{callback}' failed: {message}")]
pub struct CallbackError {
    /// Name of the failing callback.
    pub callback: String,
    /// What went wrong.
    pub message: String,
}

impl CallbackError {
    /// Creates a callback error.
    #[must_use]
    pub fn new(callback: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            callback: callback.into(),
            message: message.into(),
        }
    }
}

/// Aggregate failure signal returned by a trigger dispatch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TriggerError {
    /// At least one callback under the key failed; the rest still ran.
    #[error("{failed} of {total} callbacks for {key} failed; first: {first}")]
    CallbacksFailed {
        /// Key the callbacks were registered under.
        key: CallbackKey,
        /// Number of callbacks that failed.
        failed: usize,
        /// Number of callbacks that ran.
        total: usize,
        /// The first failure, in registration order.
        first: CallbackError,
    },
}

/// Top-level error type for view operations.
#[derive(Debug, Error)]
pub enum ViewError {
    /// The store failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The operation is not supported.
    #[error("Unsupported operation: {operation}")]
    Unsupported {
        /// Name of the operation, e.g. `watch.discard`.
        operation: &'static str,
    },
}

impl ViewError {
    /// Returns true if this is a store failure.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if this is an unsupported-operation error.
    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

/// Result type alias for view operations.
pub type ViewResult<T> = Result<T, ViewError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Tag;

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::RecordNotFound(Address::new(0x1000));
        assert!(err.to_string().contains("0x1000"));

        let err = StorageError::BackendError("connection refused".to_string());
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_view_error_from_storage() {
        let err: ViewError = StorageError::TransactionError("locked".into()).into();
        assert!(err.is_storage());
        assert!(!err.is_unsupported());
        assert!(err.to_string().contains("locked"));
    }

    #[test]
    fn test_unsupported_names_operation() {
        let err = ViewError::Unsupported {
            operation: "watch.discard",
        };
        assert!(err.is_unsupported());
        assert!(err.to_string().contains("watch.discard"));
    }

    #[test]
    fn test_trigger_error_display() {
        let err = TriggerError::CallbacksFailed {
            key: CallbackKey::Content(Address::new(0x10), Tag::new("comment")),
            failed: 1,
            total: 3,
            first: CallbackError::new("forward", "sink closed"),
        };
        let msg = err.to_string();
        assert!(msg.contains("1 of 3"));
        assert!(msg.contains("0x10:comment"));
        assert!(msg.contains("sink closed"));
    }
}
