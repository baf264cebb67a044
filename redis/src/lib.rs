//! Redis-based payment-session store and registration ledger.
//!
//! # Architecture
//!
//! Each session is a hash at `paysession:session:{id}` with one field per
//! column. Both mutations run as Lua scripts so Redis executes them
//! atomically:
//!
//! - **insert**: refuse if the key exists, otherwise write all fields and set
//!   the retention TTL
//! - **transition**: compare `status` with `pending`, set `status` and
//!   `resolved_at` only on a match, and return the stored hash either way
//!
//! The retention TTL only bounds how long resolved records linger. It is much
//! longer than the session lifetime, and expiry of a pending session is still
//! decided by `expires_at` on read.
//!
//! Registrations live under `paysession:registration:{event}:{category}:{registrant}`
//! and never expire; see [`RedisRegistrationLedger`].
//!
//! # Example
//!
//! ```no_run
//! use paysession_redis::RedisSessionStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RedisSessionStore::new("redis://127.0.0.1:6379").await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod ledger;

pub use ledger::RedisRegistrationLedger;

use chrono::{DateTime, Duration, Utc};
use paysession_core::{
    Amount, BoxFuture, PaymentSession, SessionId, SessionStatus, SessionStore, StoreError,
    Transition,
};
use redis::aio::ConnectionManager;
use redis::{Client, Script};
use std::collections::HashMap;

const INSERT_SCRIPT: &str = r"
    if redis.call('EXISTS', KEYS[1]) == 1 then
        return 0
    end
    redis.call('HSET', KEYS[1], unpack(ARGV, 2))
    redis.call('EXPIRE', KEYS[1], ARGV[1])
    return 1
";

// Returns {code, fields}: 0 = missing, 1 = conflict, 2 = applied.
const TRANSITION_SCRIPT: &str = r"
    local status = redis.call('HGET', KEYS[1], 'status')
    if not status then
        return {0, {}}
    end
    if status ~= 'pending' then
        return {1, redis.call('HGETALL', KEYS[1])}
    end
    redis.call('HSET', KEYS[1], 'status', ARGV[1], 'resolved_at', ARGV[2])
    return {2, redis.call('HGETALL', KEYS[1])}
";

/// Default retention of session records: seven days.
pub const DEFAULT_RETENTION_SECS: i64 = 7 * 24 * 60 * 60;

/// Session store on Redis hashes.
///
/// Cloning is cheap; all clones share one [`ConnectionManager`].
#[derive(Clone)]
pub struct RedisSessionStore {
    /// Connection manager for connection pooling.
    conn_manager: ConnectionManager,
    retention: Duration,
    insert_script: Script,
    transition_script: Script,
}

impl RedisSessionStore {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the URL is invalid or the
    /// connection fails.
    pub async fn new(redis_url: &str) -> Result<Self, StoreError> {
        let client = Client::open(redis_url).map_err(|e| {
            StoreError::Unavailable(format!("Failed to create Redis client: {e}"))
        })?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            StoreError::Unavailable(format!("Failed to create Redis connection manager: {e}"))
        })?;

        Ok(Self {
            conn_manager,
            retention: Duration::seconds(DEFAULT_RETENTION_SECS),
            insert_script: Script::new(INSERT_SCRIPT),
            transition_script: Script::new(TRANSITION_SCRIPT),
        })
    }

    /// Override how long records are kept after creation.
    #[must_use]
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Connection shared with a [`RedisRegistrationLedger`].
    #[must_use]
    pub fn connection(&self) -> ConnectionManager {
        self.conn_manager.clone()
    }

    fn session_key(id: SessionId) -> String {
        format!("paysession:session:{id}")
    }

    async fn write(&self, session: PaymentSession) -> Result<(), StoreError> {
        let mut conn = self.conn_manager.clone();
        let key = Self::session_key(session.id);
        let ttl_secs = self.retention.num_seconds().max(1);

        let mut invocation = self.insert_script.key(&key);
        invocation.arg(ttl_secs);
        for (field, value) in session_fields(&session) {
            invocation.arg(field).arg(value);
        }

        let inserted: i64 = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(|e| redis_error("insert", &e))?;

        if inserted == 0 {
            return Err(StoreError::DuplicateId(session.id));
        }
        Ok(())
    }

    async fn read(&self, id: SessionId) -> Result<Option<PaymentSession>, StoreError> {
        let mut conn = self.conn_manager.clone();
        let fields: HashMap<String, String> = redis::cmd("HGETALL")
            .arg(Self::session_key(id))
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("load", &e))?;

        if fields.is_empty() {
            return Ok(None);
        }
        fields_to_session(&fields).map(Some)
    }

    async fn resolve(
        &self,
        id: SessionId,
        to: SessionStatus,
        at: DateTime<Utc>,
    ) -> Result<Transition, StoreError> {
        if !to.is_terminal() {
            return Ok(self
                .read(id)
                .await?
                .map_or(Transition::Missing, Transition::Conflict));
        }

        let mut conn = self.conn_manager.clone();
        let (code, fields): (i64, HashMap<String, String>) = self
            .transition_script
            .key(Self::session_key(id))
            .arg(to.as_str())
            .arg(at.to_rfc3339())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| redis_error("transition", &e))?;

        match code {
            0 => Ok(Transition::Missing),
            1 => Ok(Transition::Conflict(fields_to_session(&fields)?)),
            _ => {
                tracing::debug!(session_id = %id, status = %to, "Redis transition applied");
                Ok(Transition::Applied(fields_to_session(&fields)?))
            },
        }
    }
}

impl SessionStore for RedisSessionStore {
    fn insert(&self, session: PaymentSession) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(self.write(session))
    }

    fn load(&self, id: SessionId) -> BoxFuture<'_, Result<Option<PaymentSession>, StoreError>> {
        Box::pin(self.read(id))
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
            let mut conn = self.conn_manager.clone();
            let _: String = redis::cmd("PING")
                .query_async(&mut conn)
                .await
                .map_err(|e| redis_error("ping", &e))?;
            Ok(())
        })
    }
}

fn redis_error(operation: &'static str, err: &redis::RedisError) -> StoreError {
    metrics::counter!(
        "payment_store_errors_total",
        "backend" => "redis",
        "operation" => operation
    )
    .increment(1);
    tracing::warn!(operation, error = %err, "Redis operation failed");
    StoreError::Unavailable(format!("{operation} failed: {err}"))
}

fn session_fields(session: &PaymentSession) -> Vec<(&'static str, String)> {
    let mut fields = vec![
        ("id", session.id.to_string()),
        ("event_id", session.event_id.clone()),
        ("category", session.category.clone()),
        ("amount", session.amount.value().to_string()),
        ("status", session.status.as_str().to_string()),
        ("created_at", session.created_at.to_rfc3339()),
        ("expires_at", session.expires_at.to_rfc3339()),
    ];
    if let Some(customer_id) = &session.customer_id {
        fields.push(("customer_id", customer_id.clone()));
    }
    if let Some(resolved_at) = session.resolved_at {
        fields.push(("resolved_at", resolved_at.to_rfc3339()));
    }
    fields
}

fn fields_to_session(fields: &HashMap<String, String>) -> Result<PaymentSession, StoreError> {
    let field = |name: &str| {
        fields
            .get(name)
            .ok_or_else(|| StoreError::Serialization(format!("missing field {name}")))
    };
    let corrupt = |name: &str, err: &dyn std::fmt::Display| {
        StoreError::Serialization(format!("invalid field {name}: {err}"))
    };
    let timestamp = |name: &str| -> Result<DateTime<Utc>, StoreError> {
        DateTime::parse_from_rfc3339(field(name)?)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| corrupt(name, &e))
    };

    let id = SessionId::parse(field("id")?)
        .ok_or_else(|| StoreError::Serialization("invalid field id".to_string()))?;
    let amount = field("amount")?
        .parse::<i64>()
        .map_err(|e| corrupt("amount", &e))
        .and_then(|raw| Amount::new(raw).map_err(|e| corrupt("amount", &e)))?;
    let status = field("status")?
        .parse::<SessionStatus>()
        .map_err(|e| corrupt("status", &e))?;
    let resolved_at = if fields.contains_key("resolved_at") {
        Some(timestamp("resolved_at")?)
    } else {
        None
    };

    Ok(PaymentSession {
        id,
        event_id: field("event_id")?.clone(),
        category: field("category")?.clone(),
        amount,
        customer_id: fields.get("customer_id").cloned(),
        status,
        created_at: timestamp("created_at")?,
        expires_at: timestamp("expires_at")?,
        resolved_at,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use chrono::Duration;

    fn session() -> PaymentSession {
        let now = DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        PaymentSession {
            id: SessionId::new(),
            event_id: "evt-1".to_string(),
            category: "10K".to_string(),
            amount: Amount::new(199_000).unwrap(),
            customer_id: None,
            status: SessionStatus::Pending,
            created_at: now,
            expires_at: now + Duration::minutes(5),
            resolved_at: None,
        }
    }

    fn as_map(fields: Vec<(&'static str, String)>) -> HashMap<String, String> {
        fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn hash_fields_decode_back() {
        let mut original = session();
        original.customer_id = Some("user-1".to_string());
        original.status = SessionStatus::Cancelled;
        original.resolved_at = Some(original.created_at + Duration::seconds(30));

        let decoded = fields_to_session(&as_map(session_fields(&original))).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn optional_fields_are_omitted() {
        let fields = as_map(session_fields(&session()));
        assert!(!fields.contains_key("customer_id"));
        assert!(!fields.contains_key("resolved_at"));
    }

    #[test]
    fn corrupt_status_is_a_serialization_error() {
        let mut fields = as_map(session_fields(&session()));
        fields.insert("status".to_string(), "paid".to_string());
        assert!(matches!(
            fields_to_session(&fields),
            Err(StoreError::Serialization(_))
        ));
    }
}
