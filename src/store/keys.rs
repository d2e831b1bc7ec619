//! Store key namespace.
//!
//! The rendered key strings are part of the operational surface (dashboards
//! and manual inspection rely on them), so the prefixes must not change.

use std::fmt;

const ATTEMPTS_PREFIX: &str = "login:attempts:";
const LOCKED_PREFIX: &str = "login:locked:";
const DELAY_PREFIX: &str = "login:delay:";
const BUCKET_PREFIX: &str = "ratelimit:bucket:";

/// A key identifying one record in the shared counter store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreKey {
    /// Failed-attempt counter for an identity.
    Attempts(String),
    /// Lock flag for an identity.
    Locked(String),
    /// Progressive delay value for an identity.
    Delay(String),
    /// Token bucket state for a client key.
    Bucket(String),
}

impl StoreKey {
    /// The three login records for one identity, in deletion order.
    pub fn login_records(identity: &str) -> [StoreKey; 3] {
        [
            StoreKey::Attempts(identity.to_string()),
            StoreKey::Locked(identity.to_string()),
            StoreKey::Delay(identity.to_string()),
        ]
    }

    /// Render the key in its stored form.
    pub fn to_store_key(&self) -> String {
        let (prefix, subject) = self.parts();
        format!("{}{}", prefix, subject)
    }

    /// Parse a stored key back into its logical form.
    ///
    /// The subject keeps everything after the prefix, so identities that
    /// contain `:` survive the round trip.
    pub fn from_store_key(key: &str) -> Option<Self> {
        let subject = |prefix: &str| {
            key.strip_prefix(prefix)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        if let Some(id) = subject(ATTEMPTS_PREFIX) {
            Some(StoreKey::Attempts(id))
        } else if let Some(id) = subject(LOCKED_PREFIX) {
            Some(StoreKey::Locked(id))
        } else if let Some(id) = subject(DELAY_PREFIX) {
            Some(StoreKey::Delay(id))
        } else {
            subject(BUCKET_PREFIX).map(StoreKey::Bucket)
        }
    }

    fn parts(&self) -> (&'static str, &str) {
        match self {
            StoreKey::Attempts(id) => (ATTEMPTS_PREFIX, id),
            StoreKey::Locked(id) => (LOCKED_PREFIX, id),
            StoreKey::Delay(id) => (DELAY_PREFIX, id),
            StoreKey::Bucket(client) => (BUCKET_PREFIX, client),
        }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_store_key())
    }
}
