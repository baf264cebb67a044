//! Payment-session endpoints.
//!
//! # Routes
//!
//! ```text
//! POST /payment/session           create (Device A)
//! GET  /payment/session/:id       poll (Device A)
//! GET  /payment/confirm           open the handoff link (Device B)
//! POST /payment/confirm           confirm or cancel (Device B)
//! ```
//!
//! A repeated or late confirm is answered `200` with `already_processed: true`
//! and the stored status; it is never an error.

use crate::error::AppError;
use crate::extractors::{ApiJson, RequestId};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use paysession_core::{
    ConfirmRequest, CreatedSession, GatewayOutcome, GatewayView, NewSession, PaymentError,
    PaymentSession, SessionId,
};
use serde::Deserialize;

/// Query string of the handoff link.
#[derive(Debug, Deserialize)]
pub struct ConfirmQuery {
    /// Raw session id from the QR code
    #[serde(default)]
    pub session_id: String,
}

/// Create a payment session.
///
/// # Endpoint
///
/// ```text
/// POST /payment/session
/// Content-Type: application/json
///
/// {"event_id": "evt-1", "category": "10K", "amount": 199000}
/// ```
///
/// # Response (201 Created)
///
/// The session body plus `confirm_url`.
///
/// # Errors
///
/// - 422: blank fields, non-positive amount, malformed JSON
/// - 404: unknown event or category
/// - 503: store or catalog unavailable
pub async fn create_session(
    State(state): State<AppState>,
    request_id: RequestId,
    ApiJson(request): ApiJson<NewSession>,
) -> Result<(StatusCode, Json<CreatedSession>), AppError> {
    tracing::debug!(
        request_id = %request_id.0,
        event_id = %request.event_id,
        category = %request.category,
        "Create payment session requested"
    );

    let session = state.manager.create(request).await?;
    let confirm_url = state.links.build(&session);

    Ok((
        StatusCode::CREATED,
        Json(CreatedSession {
            session,
            confirm_url,
        }),
    ))
}

/// Read a session (lazy expiry applied).
///
/// # Endpoint
///
/// ```text
/// GET /payment/session/:id
/// ```
///
/// # Errors
///
/// - 404: unknown or malformed id
/// - 503: store unavailable
pub async fn get_session(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<PaymentSession>, AppError> {
    let id = SessionId::parse(&raw_id).ok_or_else(|| PaymentError::session_not_found(&raw_id))?;
    let session = state.manager.get(id).await?;
    Ok(Json(session))
}

/// What the second device shows after scanning the QR code.
///
/// # Endpoint
///
/// ```text
/// GET /payment/confirm?session_id=<id>
/// ```
///
/// # Errors
///
/// - 404: unknown or malformed id ("invalid or expired link")
/// - 503: store unavailable
pub async fn confirm_view(
    State(state): State<AppState>,
    Query(query): Query<ConfirmQuery>,
) -> Result<Json<GatewayView>, AppError> {
    let view = state.gateway.view(&query.session_id).await?;
    Ok(Json(view))
}

/// Confirm or cancel a session.
///
/// # Endpoint
///
/// ```text
/// POST /payment/confirm
/// Content-Type: application/json
///
/// {"session_id": "<id>", "action": "confirm"}
/// ```
///
/// # Response (200 OK)
///
/// ```json
/// {"status": "success", "already_processed": false}
/// ```
///
/// # Errors
///
/// - 404: unknown or malformed id
/// - 422: malformed body or unknown action
/// - 503: store unavailable
pub async fn confirm_session(
    State(state): State<AppState>,
    request_id: RequestId,
    ApiJson(request): ApiJson<ConfirmRequest>,
) -> Result<Json<GatewayOutcome>, AppError> {
    let outcome = state
        .gateway
        .handle(&request.session_id, request.action)
        .await?;

    tracing::info!(
        request_id = %request_id.0,
        session_id = %request.session_id,
        action = %request.action,
        status = %outcome.status,
        already_processed = outcome.already_processed,
        "Confirmation handled"
    );

    Ok(Json(outcome))
}
