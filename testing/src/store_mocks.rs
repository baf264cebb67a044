//! In-memory collaborators for the payment-session manager.
//!
//! Provides fast, deterministic implementations of every seam:
//! - [`InMemorySessionStore`]: `HashMap` storage with an atomic transition
//! - [`FlakySessionStore`]: wrapper that fails a chosen number of calls
//! - [`InMemoryEventCatalog`]: static event/category table
//! - [`InMemoryRegistrationLedger`]: idempotent registration set
//!
//! All state sits behind `tokio::sync` locks, so nothing here can panic on a
//! poisoned lock and the store is safe to run in the server.

use chrono::{DateTime, Utc};
use paysession_core::{
    BoxFuture, CatalogError, CatalogLookup, EventCatalog, PaymentError, PaymentResult,
    PaymentSession, RecordOutcome, RegistrationLedger, SessionId, SessionStatus, SessionStore,
    StoreError, Transition, registrant,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

// ============================================================================
// Session store
// ============================================================================

/// In-memory session store.
///
/// The conditional transition runs entirely under the map's write guard, so
/// concurrent tasks in this process see exactly one winner per session.
///
/// # Example
///
/// ```
/// use paysession_testing::InMemorySessionStore;
///
/// let store = InMemorySessionStore::new();
/// assert_eq!(store.applied_transitions(), 0);
/// ```
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, PaymentSession>>,
    applied: AtomicUsize,
}

impl InMemorySessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of transitions that actually changed a record.
    ///
    /// Concurrency tests assert this equals the number of sessions resolved.
    #[must_use]
    pub fn applied_transitions(&self) -> usize {
        self.applied.load(Ordering::SeqCst)
    }

    /// Number of stored sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether the store holds no sessions.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Raw stored record, bypassing lazy expiry.
    pub async fn snapshot(&self, id: SessionId) -> Option<PaymentSession> {
        self.sessions.read().await.get(&id).cloned()
    }
}

impl SessionStore for InMemorySessionStore {
    fn insert(&self, session: PaymentSession) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            let mut sessions = self.sessions.write().await;
            if sessions.contains_key(&session.id) {
                return Err(StoreError::DuplicateId(session.id));
            }
            sessions.insert(session.id, session);
            Ok(())
        })
    }

    fn load(&self, id: SessionId) -> BoxFuture<'_, Result<Option<PaymentSession>, StoreError>> {
        Box::pin(async move { Ok(self.sessions.read().await.get(&id).cloned()) })
    }

    fn transition(
        &self,
        id: SessionId,
        to: SessionStatus,
        at: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Transition, StoreError>> {
        Box::pin(async move {
            let mut sessions = self.sessions.write().await;
            let Some(session) = sessions.get_mut(&id) else {
                return Ok(Transition::Missing);
            };

            if session.try_resolve(to, at) {
                self.applied.fetch_add(1, Ordering::SeqCst);
                Ok(Transition::Applied(session.clone()))
            } else {
                Ok(Transition::Conflict(session.clone()))
            }
        })
    }

    fn ping(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async { Ok(()) })
    }
}

// ============================================================================
// Fault injection
// ============================================================================

/// Store wrapper that fails the next `n` calls with `Unavailable`.
///
/// Used to drive the transient-error paths of the manager, the HTTP layer and
/// the poller without a real backend.
pub struct FlakySessionStore {
    inner: Arc<dyn SessionStore>,
    failures_left: AtomicUsize,
}

impl FlakySessionStore {
    /// Wrap a store; it starts healthy.
    #[must_use]
    pub fn new(inner: Arc<dyn SessionStore>) -> Self {
        Self {
            inner,
            failures_left: AtomicUsize::new(0),
        }
    }

    /// Fail the next `n` calls (any operation).
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    fn trip(&self) -> Result<(), StoreError> {
        let tripped = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if tripped {
            Err(StoreError::Unavailable("injected failure".to_string()))
        } else {
            Ok(())
        }
    }
}

impl SessionStore for FlakySessionStore {
    fn insert(&self, session: PaymentSession) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            self.trip()?;
            self.inner.insert(session).await
        })
    }

    fn load(&self, id: SessionId) -> BoxFuture<'_, Result<Option<PaymentSession>, StoreError>> {
        Box::pin(async move {
            self.trip()?;
            self.inner.load(id).await
        })
    }

    fn transition(
        &self,
        id: SessionId,
        to: SessionStatus,
        at: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Transition, StoreError>> {
        Box::pin(async move {
            self.trip()?;
            self.inner.transition(id, to, at).await
        })
    }

    fn ping(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            self.trip()?;
            self.inner.ping().await
        })
    }
}

// ============================================================================
// Event catalog
// ============================================================================

/// Static event catalog.
#[derive(Debug, Default)]
pub struct InMemoryEventCatalog {
    events: HashMap<String, HashSet<String>>,
    unavailable: AtomicBool,
}

impl InMemoryEventCatalog {
    /// Empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event and its categories.
    #[must_use]
    pub fn with_event<I, S>(mut self, event_id: impl Into<String>, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.events
            .entry(event_id.into())
            .or_default()
            .extend(categories.into_iter().map(Into::into));
        self
    }

    /// Parse a seed of the form `evt-1:5K,10K;evt-2:21K`.
    ///
    /// Whitespace around ids is ignored and empty entries are skipped.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an entry without `:` or with a blank event id.
    pub fn parse_seed(seed: &str) -> PaymentResult<Self> {
        let mut catalog = Self::new();
        for entry in seed.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (event_id, categories) = entry.split_once(':').ok_or_else(|| {
                PaymentError::Validation(format!("catalog entry {entry:?} is missing ':'"))
            })?;
            let event_id = event_id.trim();
            if event_id.is_empty() {
                return Err(PaymentError::Validation(format!(
                    "catalog entry {entry:?} has no event id"
                )));
            }
            catalog = catalog.with_event(
                event_id,
                categories.split(',').map(str::trim).filter(|c| !c.is_empty()),
            );
        }
        Ok(catalog)
    }

    /// Simulate an outage (or recovery).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of events.
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}

impl EventCatalog for InMemoryEventCatalog {
    fn lookup<'a>(
        &'a self,
        event_id: &'a str,
        category: &'a str,
    ) -> BoxFuture<'a, Result<CatalogLookup, CatalogError>> {
        Box::pin(async move {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(CatalogError::Unavailable("catalog offline".to_string()));
            }
            Ok(match self.events.get(event_id) {
                None => CatalogLookup::UnknownEvent,
                Some(categories) if categories.contains(category) => CatalogLookup::Found,
                Some(_) => CatalogLookup::UnknownCategory,
            })
        })
    }
}

// ============================================================================
// Registration ledger
// ============================================================================

type RegistrationKey = (String, String, String);

/// Registration ledger keyed on `(event_id, category, registrant)`.
#[derive(Debug, Default)]
pub struct InMemoryRegistrationLedger {
    registrations: RwLock<HashMap<RegistrationKey, SessionId>>,
    failing: AtomicBool,
}

impl InMemoryRegistrationLedger {
    /// Empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `record` call fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of distinct registrations.
    pub async fn len(&self) -> usize {
        self.registrations.read().await.len()
    }

    /// Whether no registrations were recorded.
    pub async fn is_empty(&self) -> bool {
        self.registrations.read().await.is_empty()
    }

    /// Session that produced the registration for this key, if any.
    ///
    /// `registrant` is a customer id, or `session:{id}` for anonymous payments.
    pub async fn session_for(
        &self,
        event_id: &str,
        category: &str,
        registrant: &str,
    ) -> Option<SessionId> {
        let key = (
            event_id.to_string(),
            category.to_string(),
            registrant.to_string(),
        );
        self.registrations.read().await.get(&key).copied()
    }
}

impl RegistrationLedger for InMemoryRegistrationLedger {
    fn record<'a>(
        &'a self,
        session: &'a PaymentSession,
    ) -> BoxFuture<'a, Result<RecordOutcome, StoreError>> {
        Box::pin(async move {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("ledger offline".to_string()));
            }
            let key = (
                session.event_id.clone(),
                session.category.clone(),
                registrant(session),
            );
            let mut registrations = self.registrations.write().await;
            if registrations.contains_key(&key) {
                return Ok(RecordOutcome::AlreadyRegistered);
            }
            registrations.insert(key, session.id);
            Ok(RecordOutcome::Recorded)
        })
    }
}
