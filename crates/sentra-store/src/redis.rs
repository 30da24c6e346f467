//! Redis-backed window store.
//!
//! Transaction windows are sorted sets scored by UNIX timestamp; device and
//! location memberships are plain sets. TTLs are refreshed on every write
//! and stale window entries are trimmed opportunistically.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    decode_member, encode_member, location_member, StoreResult, WindowEntry, WindowStore,
    DEVICE_RETENTION_SECS, LOCATION_RETENTION_SECS, VELOCITY_RETENTION_SECS,
};

/// Window store over a shared Redis connection manager.
///
/// The manager multiplexes a single connection and reconnects on failure;
/// cloning the store is cheap and shares the underlying connection.
#[derive(Clone)]
pub struct RedisWindowStore {
    conn: ConnectionManager,
}

impl RedisWindowStore {
    /// Connect to Redis at `url` (e.g. `redis://127.0.0.1:6379/0`).
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        tracing::info!("connected to redis window store at {}", url);
        Ok(Self { conn })
    }

    /// Build a store from an existing connection manager.
    pub fn with_connection(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    fn velocity_key(user_id: Uuid) -> String {
        format!("velocity:user:{user_id}")
    }

    fn devices_key(user_id: Uuid) -> String {
        format!("devices:user:{user_id}")
    }

    fn locations_key(user_id: Uuid) -> String {
        format!("locations:user:{user_id}")
    }

    fn window_bounds(window: Duration) -> (i64, i64) {
        let now = Utc::now().timestamp();
        (now - window.num_seconds(), now)
    }
}

#[async_trait]
impl WindowStore for RedisWindowStore {
    async fn record_transaction(
        &self,
        user_id: Uuid,
        transaction_id: Uuid,
        amount: Decimal,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let key = Self::velocity_key(user_id);
        let member = encode_member(transaction_id, amount);
        let mut conn = self.conn.clone();

        let _: () = conn.zadd(&key, member, at.timestamp()).await?;
        let _: () = conn.expire(&key, VELOCITY_RETENTION_SECS).await?;

        // Trim entries past the retention horizon. Readers never look that
        // far back, so a failed trim costs memory, not correctness.
        let cutoff = Utc::now().timestamp() - VELOCITY_RETENTION_SECS;
        let trimmed: Result<i64, _> = conn.zrembyscore(&key, "-inf", cutoff).await;
        if let Err(e) = trimmed {
            tracing::debug!(user_id = %user_id, "window trim failed: {}", e);
        }

        Ok(())
    }

    async fn count_in_window(&self, user_id: Uuid, window: Duration) -> StoreResult<i64> {
        let key = Self::velocity_key(user_id);
        let (min, max) = Self::window_bounds(window);
        let mut conn = self.conn.clone();
        Ok(conn.zcount(&key, min, max).await?)
    }

    async fn sum_in_window(&self, user_id: Uuid, window: Duration) -> StoreResult<Decimal> {
        let key = Self::velocity_key(user_id);
        let (min, max) = Self::window_bounds(window);
        let mut conn = self.conn.clone();

        let members: Vec<String> = conn.zrangebyscore(&key, min, max).await?;

        let mut total = Decimal::ZERO;
        for member in &members {
            match decode_member(member) {
                Some((_, amount)) => total += amount,
                None => {
                    tracing::warn!(user_id = %user_id, "skipping malformed window member");
                }
            }
        }
        Ok(total)
    }

    async fn recent(&self, user_id: Uuid, window: Duration) -> StoreResult<Vec<WindowEntry>> {
        let key = Self::velocity_key(user_id);
        let (min, max) = Self::window_bounds(window);
        let mut conn = self.conn.clone();

        // ZRANGEBYSCORE returns ascending score order, i.e. oldest first.
        let members: Vec<(String, i64)> = conn.zrangebyscore_withscores(&key, min, max).await?;

        let mut entries = Vec::with_capacity(members.len());
        for (member, score) in members {
            let Some((transaction_id, amount)) = decode_member(&member) else {
                tracing::warn!(user_id = %user_id, "skipping malformed window member");
                continue;
            };
            let recorded_at = Utc
                .timestamp_opt(score, 0)
                .single()
                .unwrap_or_else(Utc::now);
            entries.push(WindowEntry {
                transaction_id,
                amount,
                recorded_at,
            });
        }
        Ok(entries)
    }

    async fn record_device(&self, user_id: Uuid, device_id: &str) -> StoreResult<()> {
        let key = Self::devices_key(user_id);
        let mut conn = self.conn.clone();
        let _: () = conn.sadd(&key, device_id).await?;
        let _: () = conn.expire(&key, DEVICE_RETENTION_SECS).await?;
        Ok(())
    }

    async fn device_count(&self, user_id: Uuid) -> StoreResult<i64> {
        let mut conn = self.conn.clone();
        Ok(conn.scard(Self::devices_key(user_id)).await?)
    }

    async fn is_known_device(&self, user_id: Uuid, device_id: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        Ok(conn.sismember(Self::devices_key(user_id), device_id).await?)
    }

    async fn record_location(&self, user_id: Uuid, country: &str, city: &str) -> StoreResult<()> {
        let key = Self::locations_key(user_id);
        let mut conn = self.conn.clone();
        let _: () = conn.sadd(&key, location_member(country, city)).await?;
        let _: () = conn.expire(&key, LOCATION_RETENTION_SECS).await?;
        Ok(())
    }

    async fn is_known_location(
        &self,
        user_id: Uuid,
        country: &str,
        city: &str,
    ) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        Ok(conn
            .sismember(Self::locations_key(user_id), location_member(country, city))
            .await?)
    }

    async fn known_locations(&self, user_id: Uuid) -> StoreResult<Vec<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.smembers(Self::locations_key(user_id)).await?)
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
