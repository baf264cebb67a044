//! Confirmation gateway - the boundary hit by the second device.
//!
//! The gateway accepts the raw id from the handoff link, drives what the
//! second device may offer (confirm/cancel only while pending), and turns the
//! `AlreadyProcessed` outcome into a normal answer so a second tap, a stale
//! page or a lost race never shows an error dialog.

use crate::error::{PaymentError, PaymentResult};
use crate::manager::SessionManager;
use crate::types::{ConfirmAction, PaymentSession, SessionId, SessionStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What the second device shows when it opens the link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayView {
    /// Current session state, with lazy expiry applied
    pub session: PaymentSession,
    /// Whether confirm/cancel buttons should be offered
    pub actions_available: bool,
}

/// Result of a confirm/cancel tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOutcome {
    /// Resulting status, possibly one recorded earlier by someone else
    pub status: SessionStatus,
    /// `true` when this request did not cause the transition
    pub already_processed: bool,
}

/// Thin adapter between the second device and the [`SessionManager`].
#[derive(Clone)]
pub struct ConfirmationGateway {
    manager: Arc<SessionManager>,
}

impl ConfirmationGateway {
    /// Create a gateway over a shared manager.
    #[must_use]
    pub const fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }

    /// Load the session behind a handoff link.
    ///
    /// # Errors
    ///
    /// - `NotFound`: malformed or unknown id ("invalid or expired link")
    /// - `TransientIo`: store failure
    pub async fn view(&self, raw_session_id: &str) -> PaymentResult<GatewayView> {
        let id = parse_id(raw_session_id)?;
        let session = self.manager.get(id).await?;
        Ok(GatewayView {
            actions_available: !session.is_terminal(),
            session,
        })
    }

    /// Apply the user's explicit confirm/cancel choice.
    ///
    /// An already-terminal session is reported with its existing status and
    /// `already_processed = true`, never as an error.
    ///
    /// # Errors
    ///
    /// - `NotFound`: malformed or unknown id
    /// - `TransientIo`: store failure
    pub async fn handle(
        &self,
        raw_session_id: &str,
        action: ConfirmAction,
    ) -> PaymentResult<GatewayOutcome> {
        let id = parse_id(raw_session_id)?;

        match self.manager.confirm(id, action).await {
            Ok(session) => Ok(GatewayOutcome {
                status: session.status,
                already_processed: false,
            }),
            Err(PaymentError::AlreadyProcessed { status, .. }) => Ok(GatewayOutcome {
                status,
                already_processed: true,
            }),
            Err(err) => Err(err),
        }
    }
}

fn parse_id(raw: &str) -> PaymentResult<SessionId> {
    SessionId::parse(raw).ok_or_else(|| PaymentError::session_not_found(raw.trim()))
}
