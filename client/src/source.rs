//! Where the poller reads session state from.

use crate::error::ClientError;
use paysession_core::{BoxFuture, PaymentSession, PaymentError, SessionId, SessionManager};
use std::sync::Arc;

/// Read-only session lookup used by [`ClientPoller`](crate::ClientPoller).
///
/// [`PaymentApiClient`](crate::PaymentApiClient) implements it over HTTP;
/// tests and in-process callers can read a [`SessionManager`] directly.
pub trait SessionSource: Send + Sync {
    /// Fetch the current session state.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id and a transient error for
    /// transport or backend failures.
    fn fetch(&self, id: SessionId) -> BoxFuture<'_, Result<PaymentSession, ClientError>>;
}

impl SessionSource for SessionManager {
    fn fetch(&self, id: SessionId) -> BoxFuture<'_, Result<PaymentSession, ClientError>> {
        Box::pin(async move { self.get(id).await.map_err(ClientError::from) })
    }
}

impl<T: SessionSource + ?Sized> SessionSource for Arc<T> {
    fn fetch(&self, id: SessionId) -> BoxFuture<'_, Result<PaymentSession, ClientError>> {
        (**self).fetch(id)
    }
}

impl From<PaymentError> for ClientError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::NotFound { .. } => Self::NotFound(err.to_string()),
            PaymentError::Validation(message) => Self::Validation(message),
            PaymentError::AlreadyProcessed { .. } => Self::Server {
                status: 409,
                message: err.to_string(),
            },
            PaymentError::TransientIo(message) => Self::Transport(message),
        }
    }
}
