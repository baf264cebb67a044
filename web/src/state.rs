//! Application state for Axum handlers.

use paysession_core::{ConfirmationGateway, HandoffLinkBuilder, SessionManager};
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// Cloned per request; everything inside is shared.
#[derive(Clone)]
pub struct AppState {
    /// Session lifecycle
    pub manager: Arc<SessionManager>,
    /// Second-device boundary over the same manager
    pub gateway: ConfirmationGateway,
    /// Builds the `confirm_url` returned on create
    pub links: HandoffLinkBuilder,
}

impl AppState {
    /// Create the state from a manager and the public base URL builder.
    #[must_use]
    pub fn new(manager: Arc<SessionManager>, links: HandoffLinkBuilder) -> Self {
        Self {
            gateway: ConfirmationGateway::new(Arc::clone(&manager)),
            manager,
            links,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_clone() {
        // Ensure AppState implements Clone (required for Axum)
        fn assert_clone<T: Clone + Send + Sync + 'static>() {}
        assert_clone::<AppState>();
    }
}
