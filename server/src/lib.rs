//! # Paysession Server
//!
//! Wires the configured backends into a [`SessionManager`] and serves the
//! payment routes from `paysession-web`, plus `/metrics`.
//!
//! | `STORE_BACKEND` | Sessions              | Catalog               | Ledger                |
//! |-----------------|-----------------------|-----------------------|-----------------------|
//! | `memory`        | in-memory             | seeded from `CATALOG_SEED` | in-memory        |
//! | `postgres`      | `payment_sessions`    | `events` table        | `registrations` table |
//! | `redis`         | Redis hashes          | seeded from `CATALOG_SEED` | Redis `SETNX` keys |

pub mod config;
pub mod metrics;

use anyhow::Context;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use paysession_core::{
    EventCatalog, HandoffLinkBuilder, RegistrationLedger, SessionManager, SessionStore,
    SystemClock,
};
use paysession_postgres::{
    PostgresEventCatalog, PostgresRegistrationLedger, PostgresSessionStore,
};
use paysession_redis::{RedisRegistrationLedger, RedisSessionStore};
use paysession_testing::{InMemoryEventCatalog, InMemoryRegistrationLedger, InMemorySessionStore};
use paysession_web::AppState;
use std::sync::Arc;

pub use config::{Config, ConfigError, StoreBackend};

/// The collaborators a manager is built from.
struct Backends {
    store: Arc<dyn SessionStore>,
    catalog: Arc<dyn EventCatalog>,
    ledger: Option<Arc<dyn RegistrationLedger>>,
}

/// Connect the configured backends and build the shared application state.
///
/// # Errors
///
/// Returns an error if a backend cannot be reached, migrations fail, or the
/// catalog seed is malformed.
pub async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let backends = connect(config).await?;

    let mut manager = SessionManager::new(backends.store, backends.catalog, Arc::new(SystemClock))
        .with_config(config.payment.session_config());
    if let Some(ledger) = backends.ledger {
        manager = manager.with_ledger(ledger);
    }

    tracing::info!(
        backend = %config.store.backend,
        ttl_secs = config.payment.session_ttl_secs,
        base_url = %config.payment.base_url,
        "Session manager ready"
    );

    Ok(AppState::new(
        Arc::new(manager),
        HandoffLinkBuilder::new(config.payment.base_url.clone()),
    ))
}

/// The full HTTP application, with `/metrics` when a recorder is installed.
pub fn app(state: AppState, prometheus: Option<PrometheusHandle>) -> Router {
    let router = paysession_web::router(state);
    match prometheus {
        Some(handle) => router.merge(metrics::metrics_router(handle)),
        None => router,
    }
}

async fn connect(config: &Config) -> anyhow::Result<Backends> {
    match config.store.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory session store; state is lost on restart");
            Ok(Backends {
                store: Arc::new(InMemorySessionStore::new()),
                catalog: Arc::new(seeded_catalog(config)?),
                ledger: Some(Arc::new(InMemoryRegistrationLedger::new())),
            })
        },
        StoreBackend::Postgres => {
            tracing::info!("Connecting to PostgreSQL...");
            let store = PostgresSessionStore::new(
                &config.store.database_url,
                config.store.max_connections,
            )
            .await
            .context("Failed to connect to PostgreSQL")?;
            if config.store.run_migrations {
                store.migrate().await.context("Failed to run migrations")?;
            }
            let pool = store.pool().clone();
            Ok(Backends {
                store: Arc::new(store),
                catalog: Arc::new(PostgresEventCatalog::new(pool.clone())),
                ledger: Some(Arc::new(PostgresRegistrationLedger::new(pool))),
            })
        },
        StoreBackend::Redis => {
            tracing::info!("Connecting to Redis...");
            let store = RedisSessionStore::new(&config.store.redis_url)
                .await
                .context("Failed to connect to Redis")?;
            let ledger = RedisRegistrationLedger::new(store.connection());
            Ok(Backends {
                store: Arc::new(store),
                catalog: Arc::new(seeded_catalog(config)?),
                ledger: Some(Arc::new(ledger)),
            })
        },
    }
}

fn seeded_catalog(config: &Config) -> anyhow::Result<InMemoryEventCatalog> {
    let catalog = InMemoryEventCatalog::parse_seed(&config.catalog.seed)
        .context("Invalid CATALOG_SEED")?;
    tracing::info!(events = catalog.event_count(), "Event catalog seeded");
    Ok(catalog)
}
