//! Axum HTTP surface for the payment-session lifecycle.
//!
//! This crate is the imperative shell around `paysession-core`: it parses
//! requests, calls the [`SessionManager`](paysession_core::SessionManager) or
//! [`ConfirmationGateway`](paysession_core::ConfirmationGateway), and maps
//! results and [`PaymentError`](paysession_core::PaymentError)s to HTTP.
//!
//! # Request Flow
//!
//! 1. **HTTP Request** arrives and gets a request id and tracing span
//! 2. **Extract data** from the request (JSON body, path, query)
//! 3. **Call** the manager or gateway
//! 4. **Map result** to a JSON response or `{code, message}` error
//!
//! # Example
//!
//! ```ignore
//! use paysession_web::{AppState, router};
//!
//! let state = AppState::new(manager, HandoffLinkBuilder::new("https://pay.example.com"));
//! let app = router(state);
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use paysession_core::api::SESSION_PATH;
use paysession_core::handoff::CONFIRM_PATH;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{ApiJson, RequestId};
pub use middleware::{REQUEST_ID_HEADER, with_request_tracing};
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;

/// Build the full router: payment routes, health routes, request tracing.
///
/// Extra routes (such as `/metrics`) can be merged by the caller.
pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route(SESSION_PATH, post(handlers::create_session))
        .route(&format!("{SESSION_PATH}/:id"), get(handlers::get_session))
        .route(
            CONFIRM_PATH,
            get(handlers::confirm_view).post(handlers::confirm_session),
        )
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .with_state(state);

    with_request_tracing(routes)
}
