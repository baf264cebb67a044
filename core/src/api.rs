//! JSON bodies of the HTTP contract shared by the server and the client.
//!
//! | Route                                | Request           | Response                 |
//! |--------------------------------------|-------------------|--------------------------|
//! | `POST /payment/session`              | [`NewSession`]    | `201` [`CreatedSession`] |
//! | `GET /payment/session/{id}`          |                   | `200` [`PaymentSession`] |
//! | `POST /payment/confirm`              | [`ConfirmRequest`]| `200` [`GatewayOutcome`] |
//! | `GET /payment/confirm?session_id=`   |                   | `200` [`GatewayView`]    |
//!
//! Errors use `{code, message}` with `404`, `422` or `503`.
//!
//! [`NewSession`]: crate::NewSession
//! [`GatewayOutcome`]: crate::GatewayOutcome
//! [`GatewayView`]: crate::GatewayView

use crate::types::{ConfirmAction, PaymentSession};
use serde::{Deserialize, Serialize};

/// Route that creates sessions.
pub const SESSION_PATH: &str = "/payment/session";

/// `201` body for a created session: the session plus its handoff link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedSession {
    /// The new session
    #[serde(flatten)]
    pub session: PaymentSession,
    /// Link for Device B, rendered as a QR code by Device A
    pub confirm_url: String,
}

/// Body of `POST /payment/confirm`.
///
/// `session_id` stays a string so a malformed id is answered with `404`
/// like any other unknown id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmRequest {
    /// Session id taken from the handoff link
    pub session_id: String,
    /// Defaults to `confirm`
    #[serde(default)]
    pub action: ConfirmAction,
}

/// Error body returned with every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable code (`NOT_FOUND`, `VALIDATION_ERROR`, ...)
    pub code: String,
    /// Human-readable message
    pub message: String,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::types::{Amount, SessionId, SessionStatus};
    use chrono::{Duration, Utc};

    #[test]
    fn created_session_is_flat() {
        let now = Utc::now();
        let body = CreatedSession {
            session: PaymentSession {
                id: SessionId::new(),
                event_id: "evt-1".to_string(),
                category: "5K".to_string(),
                amount: Amount::new(100_000).unwrap(),
                customer_id: None,
                status: SessionStatus::Pending,
                created_at: now,
                expires_at: now + Duration::minutes(5),
                resolved_at: None,
            },
            confirm_url: "http://localhost/payment/confirm?session_id=x".to_string(),
        };

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["status"], "pending");
        assert_eq!(value["amount"], 100_000);
        assert!(value.get("session").is_none());

        let back: CreatedSession = serde_json::from_value(value).unwrap();
        assert_eq!(back, body);
    }

    #[test]
    fn confirm_action_defaults_to_confirm() {
        let request: ConfirmRequest = serde_json::from_str(r#"{"session_id":"abc"}"#).unwrap();
        assert_eq!(request.action, ConfirmAction::Confirm);

        let request: ConfirmRequest =
            serde_json::from_str(r#"{"session_id":"abc","action":"cancel"}"#).unwrap();
        assert_eq!(request.action, ConfirmAction::Cancel);
    }
}
