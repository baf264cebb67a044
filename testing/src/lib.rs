//! # Paysession Testing
//!
//! Testing utilities for the payment-session lifecycle.
//!
//! This crate provides:
//! - Deterministic clocks (`FixedClock`, `ManualClock`)
//! - In-memory implementations of the store, catalog and ledger seams
//! - A fault-injecting store wrapper for transient-error paths
//! - A ready-wired [`helpers::TestHarness`]
//! - proptest strategies for amounts and confirm actions
//!
//! `InMemorySessionStore` is also what the server runs with when no external
//! backend is configured.
//!
//! ## Example
//!
//! ```ignore
//! use paysession_testing::helpers::TestHarness;
//!
//! #[tokio::test]
//! async fn test_expiry() {
//!     let harness = TestHarness::new();
//!     let session = harness.create_default().await;
//!
//!     harness.clock.advance(chrono::Duration::minutes(6));
//!     let session = harness.manager.get(session.id).await.unwrap();
//!     assert_eq!(session.status, SessionStatus::Expired);
//! }
//! ```

use chrono::{DateTime, Utc};
use paysession_core::environment::Clock;

mod store_mocks;

pub use store_mocks::{
    FlakySessionStore, InMemoryEventCatalog, InMemoryRegistrationLedger, InMemorySessionStore,
};

/// Deterministic clocks.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use chrono::Duration;
    use std::sync::{PoisonError, RwLock};

    pub use crate::store_mocks::{
        FlakySessionStore, InMemoryEventCatalog, InMemoryRegistrationLedger, InMemorySessionStore,
    };

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use paysession_testing::mocks::FixedClock;
    /// use paysession_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when a test moves it.
    ///
    /// Shared by reference between the manager and the test, so expiry can be
    /// exercised without sleeping.
    #[derive(Debug)]
    pub struct ManualClock {
        time: RwLock<DateTime<Utc>>,
    }

    impl ManualClock {
        /// Start at the given instant.
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: RwLock::new(time),
            }
        }

        /// Move time forward (or backward, for a negative duration).
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.write().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }

        /// Jump to an absolute instant.
        pub fn set(&self, to: DateTime<Utc>) {
            *self.time.write().unwrap_or_else(PoisonError::into_inner) = to;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.read().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// The instant every test clock starts at: 2025-01-01 00:00:00 UTC.
    #[must_use]
    pub fn epoch() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_735_689_600, 0).unwrap_or_default()
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(epoch())
    }

    /// Create a manual clock starting at 2025-01-01 00:00:00 UTC.
    #[must_use]
    pub fn manual_clock() -> ManualClock {
        ManualClock::new(epoch())
    }
}

/// Test helpers and utilities.
pub mod helpers {
    use crate::mocks::{ManualClock, manual_clock};
    use crate::store_mocks::{InMemoryEventCatalog, InMemoryRegistrationLedger, InMemorySessionStore};
    use paysession_core::{
        NewSession, PaymentResult, PaymentSession, SessionConfig, SessionManager, SessionStore,
    };
    use std::sync::{Arc, Once};

    /// Event id known to [`test_catalog`].
    pub const TEST_EVENT: &str = "evt-1";

    /// Catalog with `evt-1` offering `5K`, `10K` and `21K`.
    #[must_use]
    pub fn test_catalog() -> InMemoryEventCatalog {
        InMemoryEventCatalog::new().with_event(TEST_EVENT, ["5K", "10K", "21K"])
    }

    /// The reference request: `evt-1 / 10K / 199000`.
    #[must_use]
    pub fn default_request() -> NewSession {
        NewSession::new(TEST_EVENT, "10K", 199_000)
    }

    /// Route `tracing` output through the test harness once per process.
    pub fn init_test_tracing() {
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| "paysession=debug".into()),
                )
                .with_test_writer()
                .try_init();
        });
    }

    /// A manager wired to in-memory collaborators that the test can inspect.
    pub struct TestHarness {
        /// The manager under test
        pub manager: Arc<SessionManager>,
        /// Backing store
        pub store: Arc<InMemorySessionStore>,
        /// Catalog (toggle availability to test policies)
        pub catalog: Arc<InMemoryEventCatalog>,
        /// Registration ledger
        pub ledger: Arc<InMemoryRegistrationLedger>,
        /// Time source
        pub clock: Arc<ManualClock>,
    }

    impl TestHarness {
        /// Harness with default configuration.
        #[must_use]
        pub fn new() -> Self {
            Self::with_config(SessionConfig::default())
        }

        /// Harness with a custom configuration.
        #[must_use]
        pub fn with_config(config: SessionConfig) -> Self {
            let store = Arc::new(InMemorySessionStore::new());
            Self::with_store(config, store.clone(), store)
        }

        /// Harness whose manager talks to `backend` (e.g. a [`FlakySessionStore`]
        /// wrapping `store`) while the test inspects `store` directly.
        ///
        /// [`FlakySessionStore`]: crate::FlakySessionStore
        #[must_use]
        pub fn with_store(
            config: SessionConfig,
            store: Arc<InMemorySessionStore>,
            backend: Arc<dyn SessionStore>,
        ) -> Self {
            let catalog = Arc::new(test_catalog());
            let ledger = Arc::new(InMemoryRegistrationLedger::new());
            let clock = Arc::new(manual_clock());

            let manager = SessionManager::new(backend, catalog.clone(), clock.clone())
                .with_config(config)
                .with_ledger(ledger.clone());

            Self {
                manager: Arc::new(manager),
                store,
                catalog,
                ledger,
                clock,
            }
        }

        /// Create the reference session.
        ///
        /// # Errors
        ///
        /// Propagates any manager error.
        pub async fn create_default(&self) -> PaymentResult<PaymentSession> {
            self.manager.create(default_request()).await
        }
    }

    impl Default for TestHarness {
        fn default() -> Self {
            Self::new()
        }
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use paysession_core::ConfirmAction;
    use proptest::prelude::*;

    /// Valid amounts (strictly positive).
    pub fn valid_amount() -> impl Strategy<Value = i64> {
        1_i64..=10_000_000_000
    }

    /// Invalid amounts (zero or negative).
    pub fn invalid_amount() -> impl Strategy<Value = i64> {
        i64::MIN..=0
    }

    /// Either confirm action.
    pub fn confirm_action() -> impl Strategy<Value = ConfirmAction> {
        prop_oneof![Just(ConfirmAction::Confirm), Just(ConfirmAction::Cancel)]
    }

    /// A batch of concurrent callers, each with its own action.
    pub fn contending_actions(max: usize) -> impl Strategy<Value = Vec<ConfirmAction>> {
        prop::collection::vec(confirm_action(), 2..=max)
    }
}

// Re-export commonly used items
pub use helpers::TestHarness;
pub use mocks::{FixedClock, ManualClock, manual_clock, test_clock};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn manual_clock_advances() {
        let clock = manual_clock();
        let start = clock.now();
        clock.advance(Duration::seconds(301));
        assert_eq!(clock.now() - start, Duration::seconds(301));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn epoch_is_new_year_2025() {
        assert_eq!(mocks::epoch().to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }
}
