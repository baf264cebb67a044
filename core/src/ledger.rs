//! Registration ledger seam.
//!
//! A successful payment registers the customer for the event category. The
//! registration itself (admin approval, notifications) is owned elsewhere;
//! the manager only hands over the winning session.

use crate::BoxFuture;
use crate::error::StoreError;
use crate::types::PaymentSession;

/// Result of recording a paid registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// A new registration row was written
    Recorded,
    /// A registration for the same event, category and registrant already existed
    AlreadyRegistered,
}

/// Who a registration belongs to.
///
/// The customer id when the session carries one. Anonymous sessions are
/// keyed on their own id, so two anonymous payments never share a slot.
#[must_use]
pub fn registrant(session: &PaymentSession) -> String {
    match session.customer_id.as_deref() {
        Some(customer) => customer.to_string(),
        None => format!("session:{}", session.id),
    }
}

/// Sink for registrations created by successful payments.
///
/// Implementations must be idempotent on `(event_id, category, registrant)`,
/// with the registrant taken from [`registrant`].
pub trait RegistrationLedger: Send + Sync {
    /// Record a registration for a session that just moved to `success`.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` on backend failure.
    fn record<'a>(
        &'a self,
        session: &'a PaymentSession,
    ) -> BoxFuture<'a, Result<RecordOutcome, StoreError>>;
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::types::{Amount, SessionId, SessionStatus};
    use chrono::{Duration, TimeZone, Utc};

    fn session(customer_id: Option<&str>) -> PaymentSession {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        PaymentSession {
            id: SessionId::new(),
            event_id: "evt-1".to_string(),
            category: "10K".to_string(),
            amount: Amount::new(100).unwrap(),
            customer_id: customer_id.map(str::to_string),
            status: SessionStatus::Success,
            created_at: now,
            expires_at: now + Duration::minutes(5),
            resolved_at: Some(now),
        }
    }

    #[test]
    fn customer_sessions_share_a_registrant() {
        assert_eq!(registrant(&session(Some("cust-1"))), "cust-1");
        assert_eq!(
            registrant(&session(Some("cust-1"))),
            registrant(&session(Some("cust-1")))
        );
    }

    #[test]
    fn anonymous_sessions_are_distinct_registrants() {
        let first = session(None);
        let second = session(None);
        assert_eq!(registrant(&first), format!("session:{}", first.id));
        assert_ne!(registrant(&first), registrant(&second));
    }
}
