//! `PostgreSQL` session store.

use crate::db_error;
use chrono::{DateTime, Utc};
use paysession_core::{
    Amount, BoxFuture, PaymentSession, SessionId, SessionStatus, SessionStore, StoreError,
    Transition,
};
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use uuid::Uuid;

const SESSION_COLUMNS: &str =
    "id, event_id, category, amount, customer_id, status, created_at, expires_at, resolved_at";

/// Session store backed by the `payment_sessions` table.
///
/// The terminal transition is a single statement:
///
/// ```sql
/// UPDATE payment_sessions SET status = $2, resolved_at = $3
/// WHERE id = $1 AND status = 'pending'
/// RETURNING ...
/// ```
///
/// so concurrent confirms across any number of server processes produce exactly
/// one updated row. A caller that updates nothing re-reads the row to learn
/// the winner.
#[derive(Clone, Debug)]
pub struct PostgresSessionStore {
    pool: PgPool,
}

impl PostgresSessionStore {
    /// Connect with a fresh pool.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the connection cannot be established.
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| db_error("connect", &e))?;
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool (shared with the catalog and ledger).
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the bundled migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Migration failed: {e}")))?;
        Ok(())
    }

    async fn fetch(&self, id: SessionId) -> Result<Option<PaymentSession>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM payment_sessions WHERE id = $1"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("load", &e))?;

        row.as_ref().map(row_to_session).transpose()
    }

    async fn resolve(
        &self,
        id: SessionId,
        to: SessionStatus,
        at: DateTime<Utc>,
    ) -> Result<Transition, StoreError> {
        if !to.is_terminal() {
            return Ok(self
                .fetch(id)
                .await?
                .map_or(Transition::Missing, Transition::Conflict));
        }

        let updated = sqlx::query(&format!(
            r"
            UPDATE payment_sessions
            SET status = $2, resolved_at = $3, updated_at = now()
            WHERE id = $1 AND status = 'pending'
            RETURNING {SESSION_COLUMNS}
            "
        ))
        .bind(*id.as_uuid())
        .bind(to.as_str())
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("transition", &e))?;

        if let Some(row) = updated {
            return Ok(Transition::Applied(row_to_session(&row)?));
        }

        // No row matched: either unknown, or someone else already resolved it.
        Ok(self
            .fetch(id)
            .await?
            .map_or(Transition::Missing, Transition::Conflict))
    }
}

impl SessionStore for PostgresSessionStore {
    fn insert(&self, session: PaymentSession) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            sqlx::query(
                r"
                INSERT INTO payment_sessions
                    (id, event_id, category, amount, customer_id, status,
                     created_at, expires_at, resolved_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ",
            )
            .bind(*session.id.as_uuid())
            .bind(&session.event_id)
            .bind(&session.category)
            .bind(session.amount.value())
            .bind(session.customer_id.as_deref())
            .bind(session.status.as_str())
            .bind(session.created_at)
            .bind(session.expires_at)
            .bind(session.resolved_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.is_unique_violation() {
                        return StoreError::DuplicateId(session.id);
                    }
                }
                db_error("insert", &e)
            })?;
            Ok(())
        })
    }

    fn load(&self, id: SessionId) -> BoxFuture<'_, Result<Option<PaymentSession>, StoreError>> {
        Box::pin(self.fetch(id))
    }

    fn transition(
        &self,
        id: SessionId,
        to: SessionStatus,
        at: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<Transition, StoreError>> {
        Box::pin(self.resolve(id, to, at))
    }

    fn ping(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(|e| db_error("ping", &e))?;
            Ok(())
        })
    }
}

/// Convert a database row to a `PaymentSession`.
fn row_to_session(row: &PgRow) -> Result<PaymentSession, StoreError> {
    let decode = |e: sqlx::Error| StoreError::Serialization(e.to_string());

    let id: Uuid = row.try_get("id").map_err(decode)?;
    let amount: i64 = row.try_get("amount").map_err(decode)?;
    let status: String = row.try_get("status").map_err(decode)?;

    Ok(PaymentSession {
        id: SessionId::from_uuid(id),
        event_id: row.try_get("event_id").map_err(decode)?,
        category: row.try_get("category").map_err(decode)?,
        amount: Amount::new(amount).map_err(|e| StoreError::Serialization(e.to_string()))?,
        customer_id: row.try_get("customer_id").map_err(decode)?,
        status: status
            .parse()
            .map_err(|e: paysession_core::PaymentError| StoreError::Serialization(e.to_string()))?,
        created_at: row.try_get("created_at").map_err(decode)?,
        expires_at: row.try_get("expires_at").map_err(decode)?,
        resolved_at: row.try_get("resolved_at").map_err(decode)?,
    })
}
