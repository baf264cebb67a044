//! Domain types for payment sessions.
//!
//! The wire representation of these types is the JSON contract shared by the
//! web crate and the client crate, so field names are snake case and statuses
//! are lowercase strings.

use crate::error::PaymentError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Opaque, unguessable payment-session identifier (UUID v4).
///
/// The id is the only secret carried by the handoff link, so it must never be
/// derived from anything predictable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a new random session id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Access the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Parse a session id from its textual form.
    ///
    /// Returns `None` for anything that is not a UUID; callers report that as
    /// an unknown session rather than a validation failure.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw.trim()).ok().map(Self)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// Status & actions
// ============================================================================

/// Lifecycle status of a payment session.
///
/// `Pending` is the only non-terminal state. The only edges are
/// `Pending → Success`, `Pending → Cancelled` and `Pending → Expired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Waiting for the second device
    Pending,
    /// Confirmed on the second device
    Success,
    /// Cancelled on the second device
    Cancelled,
    /// Observed past `expires_at` while still pending
    Expired,
}

impl SessionStatus {
    /// Convert status to its storage/wire string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    /// Whether no further transition is allowed from this status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "cancelled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            other => Err(PaymentError::Validation(format!(
                "unknown session status: {other}"
            ))),
        }
    }
}

/// Action requested by the second device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmAction {
    /// Pay
    #[default]
    Confirm,
    /// Abandon
    Cancel,
}

impl ConfirmAction {
    /// The terminal status this action moves a pending session into.
    #[must_use]
    pub const fn target_status(&self) -> SessionStatus {
        match self {
            Self::Confirm => SessionStatus::Success,
            Self::Cancel => SessionStatus::Cancelled,
        }
    }

    /// Wire string for the action.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Confirm => "confirm",
            Self::Cancel => "cancel",
        }
    }
}

impl fmt::Display for ConfirmAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfirmAction {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirm" => Ok(Self::Confirm),
            "cancel" => Ok(Self::Cancel),
            other => Err(PaymentError::Validation(format!(
                "action must be \"confirm\" or \"cancel\", got {other:?}"
            ))),
        }
    }
}

// ============================================================================
// Amount
// ============================================================================

/// Strictly positive amount in minor currency units (e.g. VND).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Amount(i64);

impl Amount {
    /// Validate and wrap a raw amount.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Validation`] if `value <= 0`.
    pub fn new(value: i64) -> Result<Self, PaymentError> {
        if value > 0 {
            Ok(Self(value))
        } else {
            Err(PaymentError::Validation(format!(
                "amount must be positive, got {value}"
            )))
        }
    }

    /// The raw value.
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for Amount {
    type Error = PaymentError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for i64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// Session
// ============================================================================

/// Input to [`SessionManager::create`](crate::SessionManager::create).
///
/// The amount is kept raw so that validation happens in exactly one place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSession {
    /// Event being registered for
    pub event_id: String,
    /// Ticket category within the event
    pub category: String,
    /// Raw amount, validated to be positive
    pub amount: i64,
    /// Customer reference supplied by the authentication layer
    #[serde(default)]
    pub customer_id: Option<String>,
}

impl NewSession {
    /// Create a request without a customer reference.
    #[must_use]
    pub fn new(event_id: impl Into<String>, category: impl Into<String>, amount: i64) -> Self {
        Self {
            event_id: event_id.into(),
            category: category.into(),
            amount,
            customer_id: None,
        }
    }

    /// Attach the customer reference.
    #[must_use]
    pub fn with_customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }
}

/// A payment session record.
///
/// Everything except `status` and `resolved_at` is immutable after creation,
/// and those two change together exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSession {
    /// Session id
    pub id: SessionId,
    /// Event reference (validated at creation)
    pub event_id: String,
    /// Category reference (validated at creation)
    pub category: String,
    /// Positive amount
    pub amount: Amount,
    /// Customer reference, if the caller was authenticated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    /// Current status
    pub status: SessionStatus,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// `created_at + TTL`
    pub expires_at: DateTime<Utc>,
    /// When the single terminal transition was written.
    ///
    /// For lazy expiry this is the time of the read that noticed the
    /// deadline, which can be later than `expires_at`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl PaymentSession {
    /// Whether the session has reached a terminal status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether a read at `now` must observe this session as expired.
    #[must_use]
    pub fn is_due_to_expire(&self, now: DateTime<Utc>) -> bool {
        self.status == SessionStatus::Pending && now >= self.expires_at
    }

    /// Apply a terminal transition in place if the session is still pending.
    ///
    /// This is the compare-and-swap body used by stores that hold the record
    /// under their own exclusive access (a mutex guard, a Lua script, ...).
    /// Returns `false` without touching the record if it is already terminal
    /// or if `to` is not a terminal status.
    pub fn try_resolve(&mut self, to: SessionStatus, at: DateTime<Utc>) -> bool {
        if self.status != SessionStatus::Pending || !to.is_terminal() {
            return false;
        }
        self.status = to;
        self.resolved_at = Some(at);
        true
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use chrono::Duration;

    fn pending_session(now: DateTime<Utc>) -> PaymentSession {
        PaymentSession {
            id: SessionId::new(),
            event_id: "evt-1".to_string(),
            category: "10K".to_string(),
            amount: Amount::new(199_000).unwrap(),
            customer_id: None,
            status: SessionStatus::Pending,
            created_at: now,
            expires_at: now + Duration::minutes(5),
            resolved_at: None,
        }
    }

    #[test]
    fn amount_rejects_zero_and_negative() {
        assert!(Amount::new(0).is_err());
        assert!(Amount::new(-5).is_err());
        assert_eq!(Amount::new(1).unwrap().value(), 1);
    }

    #[test]
    fn amount_deserialization_validates() {
        let err = serde_json::from_str::<Amount>("-1");
        assert!(err.is_err());
        let ok: Amount = serde_json::from_str("150000").unwrap();
        assert_eq!(ok.value(), 150_000);
    }

    #[test]
    fn status_wire_format_is_lowercase() {
        let json = serde_json::to_string(&SessionStatus::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
        assert_eq!("expired".parse::<SessionStatus>().unwrap(), SessionStatus::Expired);
        assert!("done".parse::<SessionStatus>().is_err());
    }

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(!SessionStatus::Pending.is_terminal());
        assert!(SessionStatus::Success.is_terminal());
        assert!(SessionStatus::Cancelled.is_terminal());
        assert!(SessionStatus::Expired.is_terminal());
    }

    #[test]
    fn action_maps_to_target_status() {
        assert_eq!(ConfirmAction::Confirm.target_status(), SessionStatus::Success);
        assert_eq!(ConfirmAction::Cancel.target_status(), SessionStatus::Cancelled);
        assert!("refund".parse::<ConfirmAction>().is_err());
    }

    #[test]
    fn session_id_parse_rejects_garbage() {
        let id = SessionId::new();
        assert_eq!(SessionId::parse(&id.to_string()), Some(id));
        assert_eq!(SessionId::parse("not-a-uuid"), None);
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let now = Utc::now();
        let session = pending_session(now);
        assert!(!session.is_due_to_expire(session.expires_at - Duration::seconds(1)));
        assert!(session.is_due_to_expire(session.expires_at));
    }

    #[test]
    fn try_resolve_is_one_shot() {
        let now = Utc::now();
        let mut session = pending_session(now);

        assert!(session.try_resolve(SessionStatus::Success, now));
        assert!(!session.try_resolve(SessionStatus::Cancelled, now));
        assert_eq!(session.status, SessionStatus::Success);
        assert_eq!(session.resolved_at, Some(now));
    }

    #[test]
    fn try_resolve_refuses_pending_target() {
        let now = Utc::now();
        let mut session = pending_session(now);
        assert!(!session.try_resolve(SessionStatus::Pending, now));
        assert_eq!(session.resolved_at, None);
    }

    #[test]
    fn session_json_uses_wire_names() {
        let now = Utc::now();
        let session = pending_session(now);
        let value = serde_json::to_value(&session).unwrap();

        assert_eq!(value["status"], "pending");
        assert_eq!(value["amount"], 199_000);
        assert_eq!(value["event_id"], "evt-1");
        assert!(value.get("expires_at").is_some());
        assert!(value.get("resolved_at").is_none());
    }
}
