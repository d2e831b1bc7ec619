//! In-process counter store.
//!
//! Backs a single gatehouse instance (and the test suite). Each per-key
//! operation runs while holding that key's shard lock, which makes the
//! operations linearizable per key without any global lock.

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::backend::{CounterStore, StoreResult};
use crate::error::StoreError;

/// Stand-in deadline for TTLs too large to add to the clock.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

fn deadline(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl).unwrap_or_else(|| now + FAR_FUTURE)
}

/// A stored value and its expiry deadline.
#[derive(Debug, Clone)]
struct Slot {
    value: String,
    expires_at: Instant,
}

impl Slot {
    fn new(value: impl Into<String>, now: Instant, ttl: Duration) -> Self {
        Self {
            value: value.into(),
            expires_at: deadline(now, ttl),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// A `DashMap`-backed store with per-key TTLs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Slot>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots currently held, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no slots at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired slot. Returns how many were evicted.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, slot| !slot.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    /// Spawn a task that periodically evicts expired slots.
    ///
    /// The task holds only a weak reference and exits once the store is
    /// dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                let evicted = store.purge_expired();
                if evicted > 0 {
                    debug!(evicted = evicted, remaining = store.len(), "Swept expired store entries");
                }
            }
        })
    }

    fn live_value(&self, key: &str, now: Instant) -> Option<Slot> {
        self.entries
            .get(key)
            .filter(|slot| !slot.is_expired(now))
            .map(|slot| slot.value().clone())
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn increment(&self, key: &str, ttl: Duration) -> StoreResult<i64> {
        let now = Instant::now();
        let mut slot = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Slot::new("0", now, ttl));

        if slot.is_expired(now) {
            *slot = Slot::new("0", now, ttl);
        }

        let current: i64 = slot.value.parse().map_err(|_| StoreError::Corrupt {
            key: key.to_string(),
            reason: format!("not an integer: {:?}", slot.value),
        })?;
        let next = current.saturating_add(1);

        slot.value = next.to_string();
        slot.expires_at = deadline(now, ttl);

        trace!(key = %key, value = next, "Incremented counter");
        Ok(next)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let now = Instant::now();
        self.entries
            .insert(key.to_string(), Slot::new(value, now, ttl));
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.live_value(key, Instant::now()).map(|slot| slot.value))
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let now = Instant::now();
        Ok(self
            .entries
            .remove(key)
            .map(|(_, slot)| !slot.is_expired(now))
            .unwrap_or(false))
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.live_value(key, Instant::now()).is_some())
    }

    async fn ttl_remaining(&self, key: &str) -> StoreResult<Duration> {
        let now = Instant::now();
        Ok(self
            .live_value(key, now)
            .map(|slot| slot.expires_at.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO))
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
        ttl: Duration,
    ) -> StoreResult<bool> {
        let now = Instant::now();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let matches = {
                    let slot = occupied.get();
                    let current = (!slot.is_expired(now)).then_some(slot.value.as_str());
                    current == expected
                };
                if matches {
                    occupied.insert(Slot::new(new, now, ttl));
                }
                Ok(matches)
            }
            Entry::Vacant(vacant) => {
                if expected.is_some() {
                    return Ok(false);
                }
                vacant.insert(Slot::new(new, now, ttl));
                Ok(true)
            }
        }
    }
}
