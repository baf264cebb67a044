//! Custom Axum extractors.
//!
//! - [`ApiJson`]: JSON body whose rejection is reported as an [`AppError`]
//! - [`RequestId`]: the id assigned by the request-id middleware
//!
//! # Examples
//!
//! ```ignore
//! async fn handler(
//!     request_id: RequestId,
//!     ApiJson(body): ApiJson<NewSession>,
//! ) -> Result<Json<PaymentSession>, AppError> {
//!     tracing::info!(request_id = %request_id.0, "Creating session");
//!     ...
//! }
//! ```

use crate::error::AppError;
use crate::middleware::REQUEST_ID_HEADER;
use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Request, rejection::JsonRejection},
    http::request::Parts,
};
use serde::de::DeserializeOwned;

/// JSON request body.
///
/// Malformed or mistyped bodies become `422 VALIDATION_ERROR` with the same
/// `{code, message}` shape as every other error, instead of axum's plain-text
/// rejection.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(json_rejection(&rejection)),
        }
    }
}

fn json_rejection(rejection: &JsonRejection) -> AppError {
    AppError::validation(rejection.body_text())
}

/// Request id for log correlation.
///
/// Reads the `x-request-id` header set (or propagated) by
/// [`crate::middleware::with_request_tracing`]; empty when the middleware is
/// not installed.
#[derive(Debug, Clone, Default)]
pub struct RequestId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        Ok(Self(id))
    }
}
