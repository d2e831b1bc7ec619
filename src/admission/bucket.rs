//! Token bucket arithmetic and persisted bucket state.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Persisted state of one client's bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BucketState {
    /// Tokens currently available
    pub tokens: f64,
    /// When tokens were last credited (epoch milliseconds)
    pub last_refill_ms: i64,
}

impl BucketState {
    /// Encode for storage.
    pub fn encode(&self) -> String {
        // Serializing two finite numbers cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Decode from storage.
    pub fn decode(raw: &str) -> Option<Self> {
        serde_json::from_str::<Self>(raw)
            .ok()
            .filter(|state| state.tokens.is_finite() && state.tokens >= 0.0)
    }
}

/// Result of trying to take tokens from a bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Consumption {
    /// Tokens were taken; this is the state to persist.
    Granted(BucketState),
    /// Not enough tokens; the bucket is left as it was.
    Denied { retry_after_secs: u64 },
}

/// Capacity and refill rate shared by every client bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
}

impl TokenBucket {
    /// Create a bucket shape. Both values must be positive.
    pub fn new(capacity: u64, refill_per_sec: f64) -> Self {
        Self {
            capacity: capacity as f64,
            refill_per_sec,
        }
    }

    /// Maximum tokens a bucket can hold.
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Tokens restored per second.
    pub fn refill_per_sec(&self) -> f64 {
        self.refill_per_sec
    }

    /// A freshly materialized, full bucket.
    pub fn full(&self, now_ms: i64) -> BucketState {
        BucketState {
            tokens: self.capacity,
            last_refill_ms: now_ms,
        }
    }

    /// Credit tokens for the time elapsed since the last refill.
    ///
    /// A clock that moved backwards credits nothing and keeps the later
    /// timestamp.
    pub fn refill(&self, state: BucketState, now_ms: i64) -> BucketState {
        let elapsed_ms = now_ms.saturating_sub(state.last_refill_ms).max(0) as f64;
        let credited = elapsed_ms * self.refill_per_sec / 1000.0;
        BucketState {
            tokens: (state.tokens + credited).min(self.capacity),
            last_refill_ms: now_ms.max(state.last_refill_ms),
        }
    }

    /// Take `cost` tokens from an already refilled bucket.
    pub fn try_consume(&self, state: BucketState, cost: u64) -> Consumption {
        let cost = cost as f64;
        if state.tokens >= cost {
            return Consumption::Granted(BucketState {
                tokens: state.tokens - cost,
                ..state
            });
        }
        Consumption::Denied {
            retry_after_secs: self.wait_secs(cost - state.tokens),
        }
    }

    /// Whole seconds until `tokens` more have been credited, at least 1.
    pub fn wait_secs(&self, tokens: f64) -> u64 {
        (tokens / self.refill_per_sec).ceil().max(1.0) as u64
    }

    /// Time for an empty bucket to fill completely, saturating at
    /// [`Duration::MAX`] for very slow refill rates.
    pub fn time_to_full(&self) -> Duration {
        Duration::try_from_secs_f64(self.capacity / self.refill_per_sec).unwrap_or(Duration::MAX)
    }
}
