//! `PostgreSQL` backends for the payment-session lifecycle.
//!
//! This crate implements the storage seams from `paysession-core` on top of a
//! shared `sqlx` connection pool:
//!
//! - [`PostgresSessionStore`]: session rows with a conditional `UPDATE` transition
//! - [`PostgresEventCatalog`]: read-only lookups against the `events` table
//! - [`PostgresRegistrationLedger`]: idempotent inserts into `registrations`
//!
//! Queries are built at runtime (`sqlx::query`), so the crate compiles without a
//! live database.
//!
//! # Example
//!
//! ```ignore
//! use paysession_postgres::PostgresSessionStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresSessionStore::new("postgres://localhost/payments", 10).await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod catalog;
mod ledger;
mod session_store;

pub use catalog::PostgresEventCatalog;
pub use ledger::PostgresRegistrationLedger;
pub use session_store::PostgresSessionStore;

use paysession_core::StoreError;

/// Map a `sqlx` failure to the store seam's error, counting it per operation.
pub(crate) fn db_error(operation: &'static str, err: &sqlx::Error) -> StoreError {
    metrics::counter!(
        "payment_store_errors_total",
        "backend" => "postgres",
        "operation" => operation
    )
    .increment(1);
    tracing::warn!(operation, error = %err, "PostgreSQL operation failed");
    StoreError::Unavailable(format!("{operation} failed: {err}"))
}
