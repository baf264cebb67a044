//! Session store abstraction.
//!
//! The store is the only place where the exactly-once guarantee lives. Every
//! mutation goes through [`SessionStore::transition`], a single conditional
//! update ("set status to X only if the stored status is still `pending`").
//! Implementations must make that operation atomic against every other writer,
//! including writers in other server processes:
//!
//! - `PostgresSessionStore`: `UPDATE ... WHERE id = $1 AND status = 'pending' RETURNING ...`
//! - `RedisSessionStore`: a Lua script that compares and sets the status field
//! - `InMemorySessionStore`: the compare-and-set runs under the map's write lock
//!
//! Application code never reads, decides and then writes.

use crate::BoxFuture;
use crate::error::StoreError;
use crate::types::{PaymentSession, SessionId, SessionStatus};
use chrono::{DateTime, Utc};

/// Outcome of a conditional transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// This call moved the session out of `pending`; carries the updated record.
    Applied(PaymentSession),
    /// The session was already terminal; carries the record as stored,
    /// i.e. the winner's status.
    Conflict(PaymentSession),
    /// No session with that id.
    Missing,
}

/// Durable keyed storage for payment sessions.
///
/// # Dyn Compatibility
///
/// Methods return [`BoxFuture`] so the manager can hold an
/// `Arc<dyn SessionStore>` and swap backends at startup.
pub trait SessionStore: Send + Sync {
    /// Persist a freshly created session.
    ///
    /// # Errors
    ///
    /// - `DuplicateId`: a record with this id already exists
    /// - `Unavailable`: backend failure
    fn insert(&self, session: PaymentSession) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Load a session by id. Returns `Ok(None)` when absent.
    ///
    /// # Errors
    ///
    /// - `Unavailable`: backend failure
    /// - `Serialization`: stored record is corrupt
    fn load(&self, id: SessionId) -> BoxFuture<'_, Result<Option<PaymentSession>, StoreError>>;

    /// Atomically move a pending session into the terminal status `to`,
    /// stamping `resolved_at = at`.
    ///
    /// Must be a single conditional update keyed on the expected current
    /// status. When the stored status is not `pending`, nothing is written and
    /// [`Transition::Conflict`] carries the stored record.
    ///
    /// # Errors
    ///
    /// - `Unavailable`: backend failure
    fn transition(
        &self,
        id: SessionId,
        to: SessionStatus,
        at: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Transition, StoreError>>;

    /// Cheap connectivity probe for readiness checks.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the backend cannot be reached.
    fn ping(&self) -> BoxFuture<'_, Result<(), StoreError>>;
}
