//! The payment-session state machine.
//!
//! ```text
//!                ┌──────────► success    (confirm, first winner)
//!   pending ─────┼──────────► cancelled  (cancel, first winner)
//!                └──────────► expired    (observed on read at now >= expires_at)
//! ```
//!
//! Every edge is taken through [`SessionStore::transition`], so concurrent
//! callers on any number of server instances agree on a single winner. The
//! manager itself holds no locks and no per-session state.

use crate::catalog::{CatalogLookup, CatalogPolicy, EventCatalog};
use crate::environment::Clock;
use crate::error::{PaymentError, PaymentResult};
use crate::ledger::{RecordOutcome, RegistrationLedger};
use crate::store::{SessionStore, Transition};
use crate::types::{Amount, ConfirmAction, NewSession, PaymentSession, SessionId, SessionStatus};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Tunables for the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Lifetime of a session, `expires_at = created_at + ttl`
    pub ttl: Duration,
    /// Behaviour when the event catalog is unreachable
    pub catalog_policy: CatalogPolicy,
}

impl SessionConfig {
    /// Default session lifetime: five minutes, the QR scanning window.
    pub const DEFAULT_TTL_SECS: i64 = 300;

    /// Longest lifetime deployments may configure: one day.
    pub const MAX_TTL_SECS: i64 = 86_400;

    /// Override the session lifetime.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Override the catalog policy.
    #[must_use]
    pub const fn with_catalog_policy(mut self, policy: CatalogPolicy) -> Self {
        self.catalog_policy = policy;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::seconds(Self::DEFAULT_TTL_SECS),
            catalog_policy: CatalogPolicy::Strict,
        }
    }
}

/// Owns the payment-session lifecycle: create, read with lazy expiry, confirm.
///
/// Cheap to clone; all collaborators are shared.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    catalog: Arc<dyn EventCatalog>,
    clock: Arc<dyn Clock>,
    ledger: Option<Arc<dyn RegistrationLedger>>,
    config: SessionConfig,
}

impl SessionManager {
    /// Create a manager with the default configuration and no ledger.
    #[must_use]
    pub fn new(
        store: Arc<dyn SessionStore>,
        catalog: Arc<dyn EventCatalog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            catalog,
            clock,
            ledger: None,
            config: SessionConfig::default(),
        }
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Record a registration whenever a confirm wins the `success` transition.
    #[must_use]
    pub fn with_ledger(mut self, ledger: Arc<dyn RegistrationLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Create a pending session.
    ///
    /// # Errors
    ///
    /// - `Validation`: blank `event_id`/`category`, non-positive amount, or a ttl
    ///   that overflows the calendar
    /// - `NotFound`: the catalog does not know the event or category
    /// - `TransientIo`: store failure, or catalog failure under [`CatalogPolicy::Strict`]
    pub async fn create(&self, request: NewSession) -> PaymentResult<PaymentSession> {
        let event_id = required("event_id", &request.event_id)?;
        let category = required("category", &request.category)?;
        let amount = Amount::new(request.amount)?;

        self.check_catalog(event_id, category).await?;

        let now = self.clock.now();
        let expires_at = now.checked_add_signed(self.config.ttl).ok_or_else(|| {
            PaymentError::Validation(format!(
                "session ttl of {}s is out of range",
                self.config.ttl.num_seconds()
            ))
        })?;
        let session = PaymentSession {
            id: SessionId::new(),
            event_id: event_id.to_string(),
            category: category.to_string(),
            amount,
            customer_id: request.customer_id,
            status: SessionStatus::Pending,
            created_at: now,
            expires_at,
            resolved_at: None,
        };

        self.store.insert(session.clone()).await?;

        metrics::counter!("payment_sessions_created_total").increment(1);
        tracing::info!(
            session_id = %session.id,
            event_id = %session.event_id,
            category = %session.category,
            amount = %session.amount,
            expires_at = %session.expires_at,
            "Payment session created"
        );

        Ok(session)
    }

    /// Read a session, applying lazy expiry first.
    ///
    /// A pending session read at or after `expires_at` is moved to `expired`
    /// through the store's conditional transition. If another caller resolved
    /// it in the meantime, the stored winner is returned instead.
    ///
    /// # Errors
    ///
    /// - `NotFound`: unknown id
    /// - `TransientIo`: store failure
    pub async fn get(&self, id: SessionId) -> PaymentResult<PaymentSession> {
        let now = self.clock.now();
        let session = self.load(id).await?;
        self.settle_expiry(session, now).await
    }

    /// Confirm or cancel a pending session.
    ///
    /// # Errors
    ///
    /// - `AlreadyProcessed`: the session was already terminal (including just
    ///   expired) or another caller won the race; carries the winning status
    /// - `NotFound`: unknown id
    /// - `TransientIo`: store failure
    pub async fn confirm(
        &self,
        id: SessionId,
        action: ConfirmAction,
    ) -> PaymentResult<PaymentSession> {
        let now = self.clock.now();
        let session = self.load(id).await?;
        let session = self.settle_expiry(session, now).await?;

        if session.is_terminal() {
            tracing::debug!(
                session_id = %id,
                action = %action,
                status = %session.status,
                "Confirmation on terminal session"
            );
            return Err(PaymentError::AlreadyProcessed {
                id,
                status: session.status,
            });
        }

        let target = action.target_status();
        match self.store.transition(id, target, now).await? {
            Transition::Applied(updated) => {
                metrics::counter!(
                    "payment_sessions_transitions_total",
                    "status" => target.as_str()
                )
                .increment(1);
                tracing::info!(
                    session_id = %id,
                    action = %action,
                    status = %updated.status,
                    "Payment session resolved"
                );

                if updated.status == SessionStatus::Success {
                    self.record_registration(&updated).await;
                }
                Ok(updated)
            },
            Transition::Conflict(winner) => {
                metrics::counter!("payment_sessions_conflicts_total").increment(1);
                tracing::info!(
                    session_id = %id,
                    action = %action,
                    winner = %winner.status,
                    "Lost confirmation race"
                );
                Err(PaymentError::AlreadyProcessed {
                    id,
                    status: winner.status,
                })
            },
            Transition::Missing => Err(PaymentError::session_not_found(id)),
        }
    }

    /// Probe the store for readiness checks.
    ///
    /// # Errors
    ///
    /// Returns `TransientIo` if the store cannot be reached.
    pub async fn ping(&self) -> PaymentResult<()> {
        self.store.ping().await.map_err(PaymentError::from)
    }

    async fn load(&self, id: SessionId) -> PaymentResult<PaymentSession> {
        self.store
            .load(id)
            .await?
            .ok_or_else(|| PaymentError::session_not_found(id))
    }

    async fn settle_expiry(
        &self,
        session: PaymentSession,
        now: DateTime<Utc>,
    ) -> PaymentResult<PaymentSession> {
        if !session.is_due_to_expire(now) {
            return Ok(session);
        }

        match self
            .store
            .transition(session.id, SessionStatus::Expired, now)
            .await?
        {
            Transition::Applied(expired) => {
                metrics::counter!(
                    "payment_sessions_transitions_total",
                    "status" => SessionStatus::Expired.as_str()
                )
                .increment(1);
                tracing::info!(
                    session_id = %expired.id,
                    expires_at = %expired.expires_at,
                    "Payment session expired"
                );
                Ok(expired)
            },
            // Someone else resolved it first; their status stands.
            Transition::Conflict(winner) => Ok(winner),
            Transition::Missing => Err(PaymentError::session_not_found(session.id)),
        }
    }

    async fn check_catalog(&self, event_id: &str, category: &str) -> PaymentResult<()> {
        match self.catalog.lookup(event_id, category).await {
            Ok(CatalogLookup::Found) => Ok(()),
            Ok(CatalogLookup::UnknownEvent) => Err(PaymentError::NotFound {
                resource: "event",
                id: event_id.to_string(),
            }),
            Ok(CatalogLookup::UnknownCategory) => Err(PaymentError::NotFound {
                resource: "category",
                id: format!("{event_id}/{category}"),
            }),
            Err(err) => match self.config.catalog_policy {
                CatalogPolicy::Strict => Err(err.into()),
                CatalogPolicy::Advisory => {
                    tracing::warn!(
                        event_id,
                        category,
                        error = %err,
                        "Event catalog unavailable, accepting session without validation"
                    );
                    Ok(())
                },
            },
        }
    }

    async fn record_registration(&self, session: &PaymentSession) {
        let Some(ledger) = &self.ledger else {
            return;
        };

        match ledger.record(session).await {
            Ok(RecordOutcome::Recorded) => tracing::info!(
                session_id = %session.id,
                event_id = %session.event_id,
                category = %session.category,
                "Registration recorded"
            ),
            Ok(RecordOutcome::AlreadyRegistered) => tracing::debug!(
                session_id = %session.id,
                "Registration already present"
            ),
            // The payment stands even if the registration write fails.
            Err(err) => tracing::error!(
                session_id = %session.id,
                error = %err,
                "Failed to record registration for successful payment"
            ),
        }
    }
}

fn required<'a>(field: &str, value: &'a str) -> PaymentResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(PaymentError::Validation(format!("{field} is required")))
    } else {
        Ok(trimmed)
    }
}
