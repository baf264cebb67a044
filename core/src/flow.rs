//! Registration flow context.
//!
//! The registration flow runs ticket selection → participant info → payment.
//! Each step consumes the previous step's value and produces the next one, so
//! the data a page needs is always passed in explicitly and a step cannot be
//! reached without the steps before it.

use crate::error::{PaymentError, PaymentResult};
use crate::types::{Amount, NewSession, PaymentSession, SessionId, SessionStatus};
use serde::{Deserialize, Serialize};

/// Step 1: the ticket the user picked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketSelection {
    event_id: String,
    category: String,
    amount: Amount,
}

impl TicketSelection {
    /// Validate a ticket selection.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for blank ids or a non-positive amount.
    pub fn new(
        event_id: impl Into<String>,
        category: impl Into<String>,
        amount: i64,
    ) -> PaymentResult<Self> {
        let event_id = non_blank("event_id", event_id.into())?;
        let category = non_blank("category", category.into())?;
        Ok(Self {
            event_id,
            category,
            amount: Amount::new(amount)?,
        })
    }

    /// Event id.
    #[must_use]
    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    /// Ticket category.
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Ticket price.
    #[must_use]
    pub const fn amount(&self) -> Amount {
        self.amount
    }

    /// Advance to step 2.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the participant's name or email is unusable.
    pub fn with_participant(self, participant: ParticipantInfo) -> PaymentResult<ParticipantStep> {
        participant.validate()?;
        Ok(ParticipantStep {
            selection: self,
            participant,
        })
    }
}

/// Participant details captured in step 2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantInfo {
    /// Name printed on the bib
    pub full_name: String,
    /// Contact email
    pub email: String,
    /// Optional phone number
    #[serde(default)]
    pub phone: Option<String>,
    /// Customer reference from the authentication layer
    #[serde(default)]
    pub customer_id: Option<String>,
}

impl ParticipantInfo {
    fn validate(&self) -> PaymentResult<()> {
        if self.full_name.trim().is_empty() {
            return Err(PaymentError::Validation("full_name is required".to_string()));
        }
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(PaymentError::Validation(format!(
                "invalid email address: {email:?}"
            )));
        }
        Ok(())
    }
}

/// Step 2 complete: ticket and participant known, payment not started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantStep {
    selection: TicketSelection,
    participant: ParticipantInfo,
}

impl ParticipantStep {
    /// The ticket selection carried forward.
    #[must_use]
    pub const fn selection(&self) -> &TicketSelection {
        &self.selection
    }

    /// The participant carried forward.
    #[must_use]
    pub const fn participant(&self) -> &ParticipantInfo {
        &self.participant
    }

    /// Request body for creating the payment session.
    #[must_use]
    pub fn session_request(&self) -> NewSession {
        NewSession {
            event_id: self.selection.event_id.clone(),
            category: self.selection.category.clone(),
            amount: self.selection.amount.value(),
            customer_id: self.participant.customer_id.clone(),
        }
    }

    /// Advance to step 3 once the server has created the session.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the session does not match the selection.
    pub fn attach_session(self, session: &PaymentSession) -> PaymentResult<PaymentStep> {
        let selection = &self.selection;
        if session.event_id != selection.event_id
            || session.category != selection.category
            || session.amount != selection.amount
        {
            return Err(PaymentError::Validation(format!(
                "payment session {} does not match the selected ticket",
                session.id
            )));
        }
        Ok(PaymentStep {
            previous: self,
            session_id: session.id,
        })
    }
}

/// Step 3: waiting for the payment session to resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStep {
    previous: ParticipantStep,
    session_id: SessionId,
}

impl PaymentStep {
    /// The session being observed.
    #[must_use]
    pub const fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Fold the latest observed session state into the flow.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if `session` belongs to a different payment.
    pub fn settle(self, session: PaymentSession) -> PaymentResult<FlowOutcome> {
        if session.id != self.session_id {
            return Err(PaymentError::Validation(format!(
                "expected session {}, got {}",
                self.session_id, session.id
            )));
        }

        Ok(match session.status {
            SessionStatus::Pending => FlowOutcome::AwaitingPayment(self),
            SessionStatus::Success => FlowOutcome::Registered(CompletedRegistration {
                selection: self.previous.selection,
                participant: self.previous.participant,
                session,
            }),
            status @ (SessionStatus::Cancelled | SessionStatus::Expired) => {
                FlowOutcome::Abandoned {
                    status,
                    retry: self.previous,
                }
            },
        })
    }
}

/// Where the flow stands after observing the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    /// Still pending; keep polling
    AwaitingPayment(PaymentStep),
    /// Paid; registration is complete from the user's point of view
    Registered(CompletedRegistration),
    /// Cancelled or expired; `retry` restarts payment without re-entering details
    Abandoned {
        /// Terminal status that ended the attempt
        status: SessionStatus,
        /// Step 2 state for a new attempt
        retry: ParticipantStep,
    },
}

/// Final output of a successful registration flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedRegistration {
    /// Ticket bought
    pub selection: TicketSelection,
    /// Who registered
    pub participant: ParticipantInfo,
    /// The successful session
    pub session: PaymentSession,
}

fn non_blank(field: &str, value: String) -> PaymentResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(PaymentError::Validation(format!("{field} is required")))
    } else {
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use chrono::{Duration, Utc};

    fn participant() -> ParticipantInfo {
        ParticipantInfo {
            full_name: "Nguyen Van A".to_string(),
            email: "a@example.com".to_string(),
            phone: None,
            customer_id: Some("user-42".to_string()),
        }
    }

    fn session_for(step: &ParticipantStep, status: SessionStatus) -> PaymentSession {
        let now = Utc::now();
        PaymentSession {
            id: SessionId::new(),
            event_id: step.selection().event_id().to_string(),
            category: step.selection().category().to_string(),
            amount: step.selection().amount(),
            customer_id: step.participant().customer_id.clone(),
            status,
            created_at: now,
            expires_at: now + Duration::minutes(5),
            resolved_at: None,
        }
    }

    #[test]
    fn selection_rejects_bad_input() {
        assert!(TicketSelection::new("", "10K", 100).is_err());
        assert!(TicketSelection::new("evt-1", "10K", 0).is_err());
    }

    #[test]
    fn participant_requires_email() {
        let selection = TicketSelection::new("evt-1", "10K", 199_000).unwrap();
        let mut info = participant();
        info.email = "nope".to_string();
        assert!(selection.with_participant(info).is_err());
    }

    #[test]
    fn session_request_carries_selection_and_customer() {
        let step = TicketSelection::new("evt-1", "10K", 199_000)
            .unwrap()
            .with_participant(participant())
            .unwrap();

        let request = step.session_request();
        assert_eq!(request, NewSession::new("evt-1", "10K", 199_000).with_customer("user-42"));
    }

    #[test]
    fn mismatched_session_is_rejected() {
        let step = TicketSelection::new("evt-1", "10K", 199_000)
            .unwrap()
            .with_participant(participant())
            .unwrap();
        let mut session = session_for(&step, SessionStatus::Pending);
        session.category = "5K".to_string();

        assert!(step.attach_session(&session).is_err());
    }

    #[test]
    fn success_completes_registration() {
        let step = TicketSelection::new("evt-1", "10K", 199_000)
            .unwrap()
            .with_participant(participant())
            .unwrap();
        let pending = session_for(&step, SessionStatus::Pending);
        let payment = step.attach_session(&pending).unwrap();

        let FlowOutcome::AwaitingPayment(payment) = payment.settle(pending.clone()).unwrap() else {
            panic!("pending session should keep the flow waiting");
        };

        let mut paid = pending;
        paid.status = SessionStatus::Success;
        match payment.settle(paid).unwrap() {
            FlowOutcome::Registered(done) => {
                assert_eq!(done.participant.full_name, "Nguyen Van A");
                assert_eq!(done.session.status, SessionStatus::Success);
            },
            other => panic!("expected registration, got {other:?}"),
        }
    }

    #[test]
    fn expiry_offers_retry_from_participant_step() {
        let step = TicketSelection::new("evt-1", "10K", 199_000)
            .unwrap()
            .with_participant(participant())
            .unwrap();
        let mut session = session_for(&step, SessionStatus::Pending);
        let payment = step.clone().attach_session(&session).unwrap();
        session.status = SessionStatus::Expired;

        match payment.settle(session).unwrap() {
            FlowOutcome::Abandoned { status, retry } => {
                assert_eq!(status, SessionStatus::Expired);
                assert_eq!(retry, step);
            },
            other => panic!("expected abandoned flow, got {other:?}"),
        }
    }

    #[test]
    fn settle_rejects_foreign_session() {
        let step = TicketSelection::new("evt-1", "10K", 199_000)
            .unwrap()
            .with_participant(participant())
            .unwrap();
        let session = session_for(&step, SessionStatus::Pending);
        let payment = step.clone().attach_session(&session).unwrap();
        let other = session_for(&step, SessionStatus::Success);

        assert!(payment.settle(other).is_err());
    }
}
