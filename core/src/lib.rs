//! # Paysession Core
//!
//! The payment-session lifecycle of the event-registration platform.
//!
//! A payment session is a short-lived, server-tracked record that is created on
//! one device, handed to a second device as a scannable link, confirmed (or
//! cancelled) there, and observed by polling on the first device until it
//! reaches a terminal state.
//!
//! ## Core Concepts
//!
//! - **`PaymentSession`**: The sole persistent entity (`pending → success | cancelled | expired`)
//! - **`SessionStore`**: Durable keyed storage with an atomic conditional transition
//! - **`SessionManager`**: Owns the state machine (create, get with lazy expiry, confirm)
//! - **`HandoffLinkBuilder`**: Derives the confirmation URL from a session id
//! - **`ConfirmationGateway`**: The boundary hit by the second device
//! - **Environment**: `Clock` and `EventCatalog` are injected via traits
//!
//! ## Architecture Principles
//!
//! - Exactly-once terminal transition lives in the store, never in process locks
//! - Expiry is evaluated lazily on read, no background sweeper
//! - Every collaborator is a trait object so tests run at memory speed
//!
//! ## Example
//!
//! ```ignore
//! use paysession_core::{ConfirmAction, NewSession, SessionManager};
//!
//! let session = manager
//!     .create(NewSession::new("evt-1", "10K", 199_000))
//!     .await?;
//!
//! let confirmed = manager.confirm(session.id, ConfirmAction::Confirm).await?;
//! assert!(confirmed.status.is_terminal());
//! ```

use std::future::Future;
use std::pin::Pin;

// Re-export commonly used types
pub use chrono::{DateTime, Duration, Utc};

pub mod api;
pub mod catalog;
pub mod error;
pub mod flow;
pub mod gateway;
pub mod handoff;
pub mod ledger;
pub mod manager;
pub mod store;
pub mod types;

pub use api::{ConfirmRequest, CreatedSession, ErrorBody};
pub use catalog::{CatalogLookup, CatalogPolicy, EventCatalog};
pub use environment::{Clock, SystemClock};
pub use error::{CatalogError, PaymentError, PaymentResult, StoreError};
pub use flow::{
    CompletedRegistration, FlowOutcome, ParticipantInfo, ParticipantStep, PaymentStep,
    TicketSelection,
};
pub use gateway::{ConfirmationGateway, GatewayOutcome, GatewayView};
pub use handoff::HandoffLinkBuilder;
pub use ledger::{RecordOutcome, RegistrationLedger, registrant};
pub use manager::{SessionConfig, SessionManager};
pub use store::{SessionStore, Transition};
pub use types::{Amount, ConfirmAction, NewSession, PaymentSession, SessionId, SessionStatus};

/// Boxed, sendable future returned by the dyn-compatible collaborator traits.
///
/// The store, catalog and ledger traits are used as `Arc<dyn Trait>`, so they
/// return `Pin<Box<dyn Future>>` instead of using `async fn`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Environment module - time source for expiry decisions.
///
/// All expiry logic reads time through [`Clock`], so tests can move time
/// forward without sleeping.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Production - uses system clock
    /// let clock = SystemClock;
    ///
    /// // Test - fixed time for deterministic tests
    /// let clock = FixedClock::new(Utc::now());
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time source used in production.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::environment::{Clock, SystemClock};

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }
}
