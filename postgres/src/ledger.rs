//! Registrations written when a payment succeeds.

use crate::db_error;
use paysession_core::{
    BoxFuture, PaymentSession, RecordOutcome, RegistrationLedger, StoreError, registrant,
};
use sqlx::PgPool;

/// Ledger backed by `registrations`, unique on `(event_id, category, registrant)`.
#[derive(Clone, Debug)]
pub struct PostgresRegistrationLedger {
    pool: PgPool,
}

impl PostgresRegistrationLedger {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Number of registrations for an event category.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the query fails.
    pub async fn count(&self, event_id: &str, category: &str) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM registrations WHERE event_id = $1 AND category = $2",
        )
        .bind(event_id)
        .bind(category)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("count_registrations", &e))?;
        Ok(count)
    }
}

impl RegistrationLedger for PostgresRegistrationLedger {
    fn record<'a>(
        &'a self,
        session: &'a PaymentSession,
    ) -> BoxFuture<'a, Result<RecordOutcome, StoreError>> {
        Box::pin(async move {
            let result = sqlx::query(
                r"
                INSERT INTO registrations (event_id, category, registrant, customer_id, session_id)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (event_id, category, registrant) DO NOTHING
                ",
            )
            .bind(&session.event_id)
            .bind(&session.category)
            .bind(registrant(session))
            .bind(session.customer_id.as_deref())
            .bind(*session.id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("record_registration", &e))?;

            Ok(if result.rows_affected() == 0 {
                RecordOutcome::AlreadyRegistered
            } else {
                RecordOutcome::Recorded
            })
        })
    }
}
