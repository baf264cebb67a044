//! Registrations written when a payment succeeds.

use crate::redis_error;
use paysession_core::{
    BoxFuture, PaymentSession, RecordOutcome, RegistrationLedger, SessionId, StoreError,
    registrant,
};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

/// Ledger of plain string keys, one per `(event_id, category, registrant)`.
///
/// The value is the id of the session that paid. `SETNX` makes the first
/// writer win, so a replayed success records nothing new.
#[derive(Clone)]
pub struct RedisRegistrationLedger {
    conn_manager: ConnectionManager,
}

impl RedisRegistrationLedger {
    /// Share the connection of an existing store.
    #[must_use]
    pub const fn new(conn_manager: ConnectionManager) -> Self {
        Self { conn_manager }
    }

    fn registration_key(event_id: &str, category: &str, registrant: &str) -> String {
        format!("paysession:registration:{event_id}:{category}:{registrant}")
    }

    /// Session that produced the registration, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if Redis cannot be reached.
    pub async fn session_for(
        &self,
        event_id: &str,
        category: &str,
        registrant: &str,
    ) -> Result<Option<SessionId>, StoreError> {
        let mut conn = self.conn_manager.clone();
        let raw: Option<String> = conn
            .get(Self::registration_key(event_id, category, registrant))
            .await
            .map_err(|e| redis_error("load_registration", &e))?;
        Ok(raw.as_deref().and_then(SessionId::parse))
    }
}

impl RegistrationLedger for RedisRegistrationLedger {
    fn record<'a>(
        &'a self,
        session: &'a PaymentSession,
    ) -> BoxFuture<'a, Result<RecordOutcome, StoreError>> {
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let key = Self::registration_key(
                &session.event_id,
                &session.category,
                &registrant(session),
            );
            let inserted: bool = conn
                .set_nx(&key, session.id.to_string())
                .await
                .map_err(|e| redis_error("record_registration", &e))?;

            Ok(if inserted {
                RecordOutcome::Recorded
            } else {
                RecordOutcome::AlreadyRegistered
            })
        })
    }
}
