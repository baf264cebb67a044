//! Error types for web handlers.
//!
//! [`AppError`] bridges [`PaymentError`] and HTTP responses. Every error body
//! is `{code, message}` so the client can branch on `code`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use paysession_core::{ErrorBody, PaymentError};
use std::fmt;

/// Application error type for web handlers.
///
/// # Examples
///
/// ```ignore
/// async fn handler(State(state): State<AppState>) -> Result<Json<PaymentSession>, AppError> {
///     let session = state.manager.get(id).await?;
///     Ok(Json(session))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: &'static str,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>, code: &'static str) -> Self {
        Self {
            status,
            message: message.into(),
            code,
            source: None,
        }
    }

    /// Create a new error with a source error.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message, "NOT_FOUND")
    }

    /// Create a 409 Conflict error for a session that is no longer pending.
    #[must_use]
    pub fn already_processed(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message, "ALREADY_PROCESSED")
    }

    /// Create a 422 Unprocessable Entity error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message, "VALIDATION_ERROR")
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message,
            "INTERNAL_SERVER_ERROR",
        )
    }

    /// Create a 503 Service Unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message, "SERVICE_UNAVAILABLE")
    }

    /// HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable code of this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    error = %source,
                    "Request failed"
                );
            } else {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    "Request failed"
                );
            }
        }

        let body = ErrorBody {
            code: self.code.to_string(),
            message: self.message,
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match &err {
            PaymentError::Validation(message) => Self::validation(message.clone()),
            PaymentError::NotFound { .. } => Self::not_found(err.to_string()),
            PaymentError::AlreadyProcessed { .. } => Self::already_processed(err.to_string()),
            PaymentError::TransientIo(_) => {
                Self::unavailable("Payment service temporarily unavailable, please retry")
                    .with_source(anyhow::Error::new(err))
            },
        }
    }
}

/// Convert `anyhow::Error` to `AppError`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("An internal error occurred").with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paysession_core::{SessionId, SessionStatus};

    #[test]
    fn test_error_display() {
        let err = AppError::validation("amount must be positive");
        assert_eq!(err.to_string(), "[VALIDATION_ERROR] amount must be positive");
    }

    #[test]
    fn test_payment_error_mapping() {
        let cases = [
            (
                PaymentError::Validation("bad".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
            ),
            (
                PaymentError::session_not_found("x"),
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
            ),
            (
                PaymentError::AlreadyProcessed {
                    id: SessionId::new(),
                    status: SessionStatus::Expired,
                },
                StatusCode::CONFLICT,
                "ALREADY_PROCESSED",
            ),
            (
                PaymentError::TransientIo("db down".into()),
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
            ),
        ];

        for (err, status, code) in cases {
            let app = AppError::from(err);
            assert_eq!(app.status(), status);
            assert_eq!(app.code(), code);
        }
    }

    #[test]
    fn test_transient_message_hides_backend_detail() {
        let app = AppError::from(PaymentError::TransientIo("password=hunter2".into()));
        assert!(!app.to_string().contains("hunter2"));
        assert!(std::error::Error::source(&app).is_some());
    }
}
