//! Per-user sliding-window state used by the velocity, device, and
//! geographic rule families.
//!
//! The store keeps three structures per user:
//!
//! - a time-ordered set of recent transactions (`velocity:user:{uuid}`),
//!   members `"txId|amount"` scored by event time, 24 h retention
//! - a set of seen device ids (`devices:user:{uuid}`), 30 d retention
//! - a set of seen `"country:city"` pairs (`locations:user:{uuid}`), 90 d
//!   retention
//!
//! Eviction is best-effort; readers only ever query inside the window, so a
//! late eviction is invisible. There is no transactional bundle across
//! operations — callers must tolerate a stale read of at most one in-flight
//! record.

pub mod memory;
pub mod redis;

pub use memory::MemoryWindowStore;
pub use redis::RedisWindowStore;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Retention horizon for the per-user transaction window, in seconds (24 h).
pub const VELOCITY_RETENTION_SECS: i64 = 24 * 60 * 60;
/// Retention horizon for the per-user device set, in seconds (30 d).
pub const DEVICE_RETENTION_SECS: i64 = 30 * 24 * 60 * 60;
/// Retention horizon for the per-user location set, in seconds (90 d).
pub const LOCATION_RETENTION_SECS: i64 = 90 * 24 * 60 * 60;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by a window store backend.
///
/// Rule evaluation treats any store error as "unable to evaluate" and fails
/// open for that rule; these errors must never escalate into a blocked
/// transaction on their own.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A transaction recovered from the window, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowEntry {
    pub transaction_id: Uuid,
    pub amount: Decimal,
    pub recorded_at: DateTime<Utc>,
}

/// Per-user sliding windows and membership sets.
///
/// All operations are scoped to a single user key; there are no cross-user
/// reads or writes. Implementations must be cheap to clone and safe to share
/// across request tasks.
#[async_trait]
pub trait WindowStore: Send + Sync {
    /// Insert a transaction into the user's window and refresh the key TTL.
    /// Idempotent per `(user_id, transaction_id)`: re-recording the same
    /// transaction only refreshes its timestamp.
    async fn record_transaction(
        &self,
        user_id: Uuid,
        transaction_id: Uuid,
        amount: Decimal,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Number of transactions recorded in `[now - window, now]`.
    async fn count_in_window(&self, user_id: Uuid, window: Duration) -> StoreResult<i64>;

    /// Sum of amounts recorded in `[now - window, now]`. Entries whose
    /// amount fails to parse are skipped, never aborting the sum.
    async fn sum_in_window(&self, user_id: Uuid, window: Duration) -> StoreResult<Decimal>;

    /// Transactions recorded in `[now - window, now]`, oldest first.
    async fn recent(&self, user_id: Uuid, window: Duration) -> StoreResult<Vec<WindowEntry>>;

    /// Add a device to the user's seen set and refresh the key TTL.
    async fn record_device(&self, user_id: Uuid, device_id: &str) -> StoreResult<()>;

    /// Number of distinct devices seen for the user.
    async fn device_count(&self, user_id: Uuid) -> StoreResult<i64>;

    async fn is_known_device(&self, user_id: Uuid, device_id: &str) -> StoreResult<bool>;

    /// Add a `"country:city"` pair to the user's seen set and refresh the
    /// key TTL.
    async fn record_location(&self, user_id: Uuid, country: &str, city: &str) -> StoreResult<()>;

    async fn is_known_location(
        &self,
        user_id: Uuid,
        country: &str,
        city: &str,
    ) -> StoreResult<bool>;

    /// All `"country:city"` pairs seen for the user.
    async fn known_locations(&self, user_id: Uuid) -> StoreResult<Vec<String>>;

    /// Liveness probe for readiness checks.
    async fn ping(&self) -> StoreResult<()>;
}

/// Member encoding for the transaction window: `"txId|amount"`.
pub(crate) fn encode_member(transaction_id: Uuid, amount: Decimal) -> String {
    format!("{transaction_id}|{amount}")
}

/// Split a window member on its last `|`. Returns `None` when the member is
/// malformed; callers skip such entries.
pub(crate) fn decode_member(member: &str) -> Option<(Uuid, Decimal)> {
    let sep = member.rfind('|')?;
    let id = member[..sep].parse().ok()?;
    let amount = member[sep + 1..].parse().ok()?;
    Some((id, amount))
}

/// Location set member: `"country:city"`.
pub(crate) fn location_member(country: &str, city: &str) -> String {
    format!("{country}:{city}")
}
