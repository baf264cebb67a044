//! Error taxonomy for the payment-session lifecycle.
//!
//! [`PaymentError`] is what callers of the manager see. Store and catalog
//! failures have their own types at the seam and collapse into
//! [`PaymentError::TransientIo`], since the caller can only retry them.

use crate::types::{SessionId, SessionStatus};
use thiserror::Error;

/// Result alias for manager and gateway operations.
pub type PaymentResult<T> = Result<T, PaymentError>;

/// Errors returned by [`SessionManager`](crate::SessionManager) operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    /// Malformed input (non-positive amount, missing fields). Never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown session id, event or category.
    #[error("{resource} not found: {id}")]
    NotFound {
        /// What kind of thing was missing (`"payment session"`, `"event"`, ...)
        resource: &'static str,
        /// The identifier that was looked up
        id: String,
    },

    /// Confirm/cancel attempted on a session that is no longer pending.
    ///
    /// This is the expected outcome of a lost race or a repeated request, not a
    /// failure. It carries the status that actually won.
    #[error("Payment session {id} already processed with status {status}")]
    AlreadyProcessed {
        /// The session
        id: SessionId,
        /// The terminal status already recorded
        status: SessionStatus,
    },

    /// Store, catalog or network failure. Safe to retry.
    #[error("Transient I/O error: {0}")]
    TransientIo(String),
}

impl PaymentError {
    /// Build a `NotFound` for a session id.
    #[must_use]
    pub fn session_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            resource: "payment session",
            id: id.to_string(),
        }
    }

    /// Whether retrying the same call could succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::TransientIo(_))
    }
}

/// Errors raised by [`SessionStore`](crate::SessionStore) implementations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Backend unreachable or query failed.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Stored record could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Insert collided with an existing id.
    #[error("Session id already exists: {0}")]
    DuplicateId(SessionId),
}

impl From<StoreError> for PaymentError {
    fn from(err: StoreError) -> Self {
        Self::TransientIo(err.to_string())
    }
}

/// Errors raised by [`EventCatalog`](crate::EventCatalog) implementations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// Catalog backend unreachable.
    #[error("Event catalog unavailable: {0}")]
    Unavailable(String),
}

impl From<CatalogError> for PaymentError {
    fn from(err: CatalogError) -> Self {
        Self::TransientIo(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_become_transient() {
        let err: PaymentError = StoreError::Unavailable("connection reset".into()).into();
        assert!(err.is_transient());
        assert_eq!(
            err.to_string(),
            "Transient I/O error: Store unavailable: connection reset"
        );
    }

    #[test]
    fn already_processed_names_the_winner() {
        let id = SessionId::new();
        let err = PaymentError::AlreadyProcessed {
            id,
            status: SessionStatus::Success,
        };
        assert!(err.to_string().ends_with("with status success"));
        assert!(!err.is_transient());
    }

    #[test]
    fn session_not_found_message() {
        let err = PaymentError::session_not_found("abc");
        assert_eq!(err.to_string(), "payment session not found: abc");
    }
}
