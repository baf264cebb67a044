//! Event catalog read from the `events` table.

use crate::db_error;
use paysession_core::{BoxFuture, CatalogError, CatalogLookup, EventCatalog, StoreError};
use sqlx::PgPool;

/// Catalog lookups against `events(id, categories TEXT[])`.
#[derive(Clone, Debug)]
pub struct PostgresEventCatalog {
    pool: PgPool,
}

impl PostgresEventCatalog {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or replace an event and its categories.
    ///
    /// Event management owns this table in production; this is used for
    /// seeding and tests.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the write fails.
    pub async fn upsert_event(&self, event_id: &str, categories: &[&str]) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO events (id, categories)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET categories = EXCLUDED.categories
            ",
        )
        .bind(event_id)
        .bind(categories)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("upsert_event", &e))?;
        Ok(())
    }
}

impl EventCatalog for PostgresEventCatalog {
    fn lookup<'a>(
        &'a self,
        event_id: &'a str,
        category: &'a str,
    ) -> BoxFuture<'a, Result<CatalogLookup, CatalogError>> {
        Box::pin(async move {
            let categories: Option<(Vec<String>,)> =
                sqlx::query_as("SELECT categories FROM events WHERE id = $1")
                    .bind(event_id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| CatalogError::Unavailable(db_error("lookup", &e).to_string()))?;

            Ok(match categories {
                None => CatalogLookup::UnknownEvent,
                Some((categories,)) if categories.iter().any(|c| c == category) => {
                    CatalogLookup::Found
                },
                Some(_) => CatalogLookup::UnknownCategory,
            })
        })
    }
}
