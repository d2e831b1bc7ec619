//! Per-client admission control backed by the shared counter store.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, trace, warn};

use super::bucket::{BucketState, Consumption, TokenBucket};
use super::clock::{Clock, SystemClock};
use super::paths::ExcludedPaths;
use crate::config::AdmissionConfig;
use crate::error::{GatehouseError, Result, StoreError};
use crate::store::{CounterStore, StoreKey};

/// Give up on a bucket after this many lost compare-and-swap races.
const MAX_CAS_ATTEMPTS: u32 = 16;

/// Answer to a single consume request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionDecision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Seconds until the requested tokens are available (0 when allowed)
    pub retry_after_secs: u64,
    /// Whole tokens left after this decision
    pub remaining_tokens: u64,
}

/// What the request pipeline should do with one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The path is exempt; no tokens were spent.
    Bypassed,
    /// Admitted.
    Allowed { remaining_tokens: u64 },
    /// Over quota.
    Limited { retry_after_secs: u64 },
    /// The store could not answer; the request is refused.
    Unavailable,
}

/// Distributed token bucket limiter keyed by client.
///
/// The refill-then-consume step is a compare-and-swap loop against the
/// shared store, so concurrent requests from one client (on any instance)
/// can never both spend the same token.
pub struct AdmissionController {
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    bucket: TokenBucket,
    excluded: ExcludedPaths,
    bucket_ttl: Duration,
}

impl AdmissionController {
    /// Create a controller using the system clock.
    pub fn new(store: Arc<dyn CounterStore>, config: &AdmissionConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// Create a controller with an explicit clock.
    pub fn with_clock(
        store: Arc<dyn CounterStore>,
        config: &AdmissionConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let bucket = TokenBucket::new(config.bucket_capacity, config.bucket_refill_per_second);
        // An evicted bucket comes back full, so it must not vanish before it
        // would have refilled anyway.
        let bucket_ttl = Duration::from_secs(config.bucket_idle_ttl_secs).max(bucket.time_to_full());
        Self {
            store,
            clock,
            bucket,
            excluded: ExcludedPaths::new(config.excluded_path_prefixes.iter().cloned()),
            bucket_ttl,
        }
    }

    /// The bucket shape applied to every client.
    pub fn bucket(&self) -> &TokenBucket {
        &self.bucket
    }

    /// Whether `path` bypasses admission control.
    pub fn is_excluded(&self, path: &str) -> bool {
        self.excluded.matches(path)
    }

    /// Try to spend `cost` tokens from `client_key`'s bucket.
    pub async fn try_consume(&self, client_key: &str, cost: u64) -> Result<AdmissionDecision> {
        let key = StoreKey::Bucket(client_key.to_string()).to_store_key();

        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let raw = self.store.get(&key).await?;
            let now = self.clock.now_millis();

            let current = match raw.as_deref() {
                None => self.bucket.full(now),
                Some(encoded) => match BucketState::decode(encoded) {
                    Some(state) => self.bucket.refill(state, now),
                    None => {
                        warn!(key = %key, value = %encoded, "Resetting undecodable bucket state");
                        self.bucket.full(now)
                    }
                },
            };

            let next = match self.bucket.try_consume(current, cost) {
                Consumption::Granted(next) => next,
                Consumption::Denied { retry_after_secs } => {
                    debug!(
                        client = %client_key,
                        tokens = current.tokens,
                        retry_after_secs = retry_after_secs,
                        "Admission denied"
                    );
                    return Ok(AdmissionDecision {
                        allowed: false,
                        retry_after_secs,
                        remaining_tokens: current.tokens.floor() as u64,
                    });
                }
            };

            let swapped = self
                .store
                .compare_and_swap(&key, raw.as_deref(), &next.encode(), self.bucket_ttl)
                .await?;
            if swapped {
                trace!(client = %client_key, tokens = next.tokens, "Admission granted");
                return Ok(AdmissionDecision {
                    allowed: true,
                    retry_after_secs: 0,
                    remaining_tokens: next.tokens.floor() as u64,
                });
            }
            trace!(client = %client_key, attempt = attempt, "Bucket changed underneath, retrying");
        }

        Err(StoreError::Contention {
            key,
            attempts: MAX_CAS_ATTEMPTS,
        }
        .into())
    }

    /// Decide one request: bypass exempt paths, spend one token otherwise,
    /// and fail closed when the store cannot answer.
    pub async fn admit(&self, client_key: &str, path: &str) -> Admission {
        if self.is_excluded(path) {
            return Admission::Bypassed;
        }
        match self.try_consume(client_key, 1).await {
            Ok(decision) if decision.allowed => Admission::Allowed {
                remaining_tokens: decision.remaining_tokens,
            },
            Ok(decision) => Admission::Limited {
                retry_after_secs: decision.retry_after_secs,
            },
            Err(GatehouseError::StoreUnavailable(StoreError::Contention { attempts, .. })) => {
                let retry_after_secs = self.bucket.wait_secs(1.0);
                warn!(
                    client = %client_key,
                    attempts = attempts,
                    retry_after_secs = retry_after_secs,
                    "Bucket too contended, limiting request"
                );
                Admission::Limited { retry_after_secs }
            }
            Err(e) => {
                error!(client = %client_key, error = %e, "Admission store unavailable, rejecting request");
                Admission::Unavailable
            }
        }
    }
}
