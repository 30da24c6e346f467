//! In-process window store.
//!
//! Mirrors the Redis implementation's semantics (idempotent recording,
//! window bounds, best-effort eviction) without external state. Used by unit
//! tests and single-node development runs.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{StoreResult, WindowEntry, WindowStore, VELOCITY_RETENTION_SECS};

#[derive(Default)]
struct UserState {
    /// transaction id -> (event time, amount). Keying by id gives the same
    /// set-member idempotency as the Redis sorted set.
    transactions: HashMap<Uuid, (DateTime<Utc>, Decimal)>,
    devices: HashSet<String>,
    locations: HashSet<String>,
}

/// Shared in-memory window store. Cloning shares the underlying maps.
#[derive(Clone, Default)]
pub struct MemoryWindowStore {
    users: Arc<RwLock<HashMap<Uuid, UserState>>>,
}

impl MemoryWindowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WindowStore for MemoryWindowStore {
    async fn record_transaction(
        &self,
        user_id: Uuid,
        transaction_id: Uuid,
        amount: Decimal,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut users = self.users.write().await;
        let state = users.entry(user_id).or_default();
        state.transactions.insert(transaction_id, (at, amount));

        let cutoff = Utc::now() - Duration::seconds(VELOCITY_RETENTION_SECS);
        state.transactions.retain(|_, (ts, _)| *ts >= cutoff);
        Ok(())
    }

    async fn count_in_window(&self, user_id: Uuid, window: Duration) -> StoreResult<i64> {
        let min = Utc::now() - window;
        let users = self.users.read().await;
        let count = users
            .get(&user_id)
            .map(|s| s.transactions.values().filter(|(ts, _)| *ts >= min).count())
            .unwrap_or(0);
        Ok(count as i64)
    }

    async fn sum_in_window(&self, user_id: Uuid, window: Duration) -> StoreResult<Decimal> {
        let min = Utc::now() - window;
        let users = self.users.read().await;
        let total = users
            .get(&user_id)
            .map(|s| {
                s.transactions
                    .values()
                    .filter(|(ts, _)| *ts >= min)
                    .map(|(_, amount)| *amount)
                    .sum()
            })
            .unwrap_or(Decimal::ZERO);
        Ok(total)
    }

    async fn recent(&self, user_id: Uuid, window: Duration) -> StoreResult<Vec<WindowEntry>> {
        let min = Utc::now() - window;
        let users = self.users.read().await;
        let mut entries: Vec<WindowEntry> = users
            .get(&user_id)
            .map(|s| {
                s.transactions
                    .iter()
                    .filter(|(_, (ts, _))| *ts >= min)
                    .map(|(id, (ts, amount))| WindowEntry {
                        transaction_id: *id,
                        amount: *amount,
                        recorded_at: *ts,
                    })
                    .collect()
            })
            .unwrap_or_default();
        entries.sort_by_key(|e| e.recorded_at);
        Ok(entries)
    }

    async fn record_device(&self, user_id: Uuid, device_id: &str) -> StoreResult<()> {
        let mut users = self.users.write().await;
        users
            .entry(user_id)
            .or_default()
            .devices
            .insert(device_id.to_string());
        Ok(())
    }

    async fn device_count(&self, user_id: Uuid) -> StoreResult<i64> {
        let users = self.users.read().await;
        Ok(users.get(&user_id).map(|s| s.devices.len()).unwrap_or(0) as i64)
    }

    async fn is_known_device(&self, user_id: Uuid, device_id: &str) -> StoreResult<bool> {
        let users = self.users.read().await;
        Ok(users
            .get(&user_id)
            .map(|s| s.devices.contains(device_id))
            .unwrap_or(false))
    }

    async fn record_location(&self, user_id: Uuid, country: &str, city: &str) -> StoreResult<()> {
        let mut users = self.users.write().await;
        users
            .entry(user_id)
            .or_default()
            .locations
            .insert(crate::location_member(country, city));
        Ok(())
    }

    async fn is_known_location(
        &self,
        user_id: Uuid,
        country: &str,
        city: &str,
    ) -> StoreResult<bool> {
        let users = self.users.read().await;
        Ok(users
            .get(&user_id)
            .map(|s| s.locations.contains(&crate::location_member(country, city)))
            .unwrap_or(false))
    }

    async fn known_locations(&self, user_id: Uuid) -> StoreResult<Vec<String>> {
        let users = self.users.read().await;
        Ok(users
            .get(&user_id)
            .map(|s| s.locations.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
