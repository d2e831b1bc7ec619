//! Credential verification seam.

use std::collections::HashMap;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use rand::rngs::OsRng;
use tracing::warn;

use crate::error::{GatehouseError, Result};

/// Trait for whatever actually checks a password.
///
/// Returns `Ok(false)` for wrong credentials; `Err` is reserved for faults
/// that say nothing about the credentials themselves.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Check `password` for `identity`.
    async fn verify(&self, identity: &str, password: &str) -> Result<bool>;
}

/// Password checked against the decoy hash for unknown identities.
const DECOY_PASSWORD: &str = "gatehouse-decoy";

/// Verifies against a fixed table of argon2 password hashes.
///
/// Unknown identities are checked against a decoy hash so that a miss costs
/// the same as a wrong password.
pub struct StaticCredentials {
    hashes: HashMap<String, String>,
    decoy: Option<String>,
}

impl StaticCredentials {
    /// Build from identity -> PHC hash string pairs.
    pub fn new(hashes: HashMap<String, String>) -> Self {
        for (identity, hash) in &hashes {
            if PasswordHash::new(hash).is_err() {
                warn!(identity = %identity, "Configured password hash is not a valid PHC string");
            }
        }
        let decoy = match hash_password(DECOY_PASSWORD) {
            Ok(hash) => Some(hash),
            Err(e) => {
                warn!(error = %e, "Could not build decoy hash; unknown identities will fail fast");
                None
            }
        };
        Self { hashes, decoy }
    }

    /// Number of known identities.
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    /// Whether no identities are configured.
    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

#[async_trait]
impl CredentialVerifier for StaticCredentials {
    async fn verify(&self, identity: &str, password: &str) -> Result<bool> {
        let (hash, known) = match self.hashes.get(identity) {
            Some(hash) => (hash.clone(), true),
            None => match &self.decoy {
                Some(decoy) => (decoy.clone(), false),
                None => return Ok(false),
            },
        };
        let password = password.to_string();

        // Hashing is deliberately slow; keep it off the async workers.
        let matched = tokio::task::spawn_blocking(move || verify_password(&hash, &password))
            .await
            .map_err(|e| GatehouseError::Credentials(format!("verifier task failed: {}", e)))??;
        Ok(known && matched)
    }
}

/// Check a password against an argon2 PHC hash.
pub fn verify_password(hash: &str, password: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| GatehouseError::Credentials(format!("invalid password hash: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Produce an argon2 PHC hash for `password`.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| GatehouseError::Credentials(format!("failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}
