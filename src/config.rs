//! Configuration management for Gatehouse.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GatehouseError, Result};

/// Environment prefix for configuration overrides, e.g.
/// `GATEHOUSE__LOGIN__MAX_ATTEMPTS=3`.
pub const ENV_PREFIX: &str = "GATEHOUSE";

/// Longest time an empty admission bucket may take to refill (one year).
pub const MAX_BUCKET_REFILL_SECS: f64 = 365.0 * 24.0 * 60.0 * 60.0;

/// Main configuration for the Gatehouse service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatehouseConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Login throttling configuration
    #[serde(default)]
    pub login: LoginConfig,

    /// Admission control configuration
    #[serde(default)]
    pub admission: AdmissionConfig,

    /// Counter store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Known identities and their argon2 password hashes
    #[serde(default)]
    pub users: HashMap<String, String>,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,

    /// Take the client key from the first `X-Forwarded-For` hop
    #[serde(default)]
    pub trust_forwarded_for: bool,

    /// Bearer token required by the admin endpoints, if set
    #[serde(default)]
    pub admin_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            trust_forwarded_for: false,
            admin_token: None,
        }
    }
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

/// What the login path does when the counter store cannot answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Refuse the attempt
    #[default]
    Closed,
    /// Let the attempt proceed unthrottled
    Open,
}

/// Login throttling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginConfig {
    /// Failures that trigger a lock
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Lock duration, also the lifetime of the failure counter
    #[serde(default = "default_lock_duration_minutes")]
    pub lock_duration_minutes: u64,

    /// Delay attempts exponentially after repeated failures
    #[serde(default = "default_true")]
    pub progressive_delay_enabled: bool,

    /// Upper bound for the progressive delay
    #[serde(default = "default_delay_cap_seconds")]
    pub delay_cap_seconds: u64,

    /// Behavior when the counter store is unavailable
    #[serde(default)]
    pub store_failure_policy: FailurePolicy,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            lock_duration_minutes: default_lock_duration_minutes(),
            progressive_delay_enabled: true,
            delay_cap_seconds: default_delay_cap_seconds(),
            store_failure_policy: FailurePolicy::default(),
        }
    }
}

impl LoginConfig {
    /// The lock duration as a `Duration`.
    pub fn lock_duration(&self) -> Duration {
        Duration::from_secs(self.lock_duration_minutes * 60)
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_lock_duration_minutes() -> u64 {
    15
}

fn default_delay_cap_seconds() -> u64 {
    8
}

fn default_true() -> bool {
    true
}

/// Admission control configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Whether the token bucket gates requests at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum tokens a client can hold
    #[serde(default = "default_bucket_capacity")]
    pub bucket_capacity: u64,

    /// Tokens restored per second
    #[serde(default = "default_bucket_refill_per_second")]
    pub bucket_refill_per_second: f64,

    /// Request path prefixes that bypass admission control
    #[serde(default = "default_excluded_path_prefixes")]
    pub excluded_path_prefixes: Vec<String>,

    /// Idle time after which an untouched bucket is evicted
    #[serde(default = "default_bucket_idle_ttl_secs")]
    pub bucket_idle_ttl_secs: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bucket_capacity: default_bucket_capacity(),
            bucket_refill_per_second: default_bucket_refill_per_second(),
            excluded_path_prefixes: default_excluded_path_prefixes(),
            bucket_idle_ttl_secs: default_bucket_idle_ttl_secs(),
        }
    }
}

fn default_bucket_capacity() -> u64 {
    100
}

fn default_bucket_refill_per_second() -> f64 {
    10.0
}

fn default_excluded_path_prefixes() -> Vec<String> {
    vec!["/health".to_string(), "/docs".to_string()]
}

fn default_bucket_idle_ttl_secs() -> u64 {
    600
}

/// Counter store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Upper bound on any single store operation
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,

    /// How often expired entries are evicted
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            operation_timeout_ms: default_operation_timeout_ms(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_operation_timeout_ms() -> u64 {
    250
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl GatehouseConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: GatehouseConfig =
            serde_yaml::from_str(yaml).map_err(|e| GatehouseError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an optional file, then apply
    /// `GATEHOUSE__*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("admission.excluded_path_prefixes"),
        );

        let config: GatehouseConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| GatehouseError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the throttling logic cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.login.max_attempts == 0 {
            return Err(GatehouseError::Config(
                "login.max_attempts must be at least 1".into(),
            ));
        }
        if self.login.lock_duration_minutes == 0 {
            return Err(GatehouseError::Config(
                "login.lock_duration_minutes must be at least 1".into(),
            ));
        }
        if self.admission.bucket_capacity == 0 {
            return Err(GatehouseError::Config(
                "admission.bucket_capacity must be at least 1".into(),
            ));
        }
        let rate = self.admission.bucket_refill_per_second;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(GatehouseError::Config(format!(
                "admission.bucket_refill_per_second must be positive, got {}",
                rate
            )));
        }
        let refill_secs = self.admission.bucket_capacity as f64 / rate;
        if refill_secs > MAX_BUCKET_REFILL_SECS {
            return Err(GatehouseError::Config(format!(
                "admission bucket takes {:.0}s to refill, more than the {}s limit; \
                 raise bucket_refill_per_second",
                refill_secs, MAX_BUCKET_REFILL_SECS
            )));
        }
        if self.store.operation_timeout_ms == 0 {
            return Err(GatehouseError::Config(
                "store.operation_timeout_ms must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatehouseConfig::default();

        assert_eq!(config.login.max_attempts, 5);
        assert_eq!(config.login.lock_duration(), Duration::from_secs(900));
        assert!(config.login.progressive_delay_enabled);
        assert_eq!(config.login.delay_cap_seconds, 8);
        assert_eq!(config.login.store_failure_policy, FailurePolicy::Closed);
        assert_eq!(config.server.http_addr.port(), 8080);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
login:
  max_attempts: 3
  store_failure_policy: open
admission:
  bucket_capacity: 10
  bucket_refill_per_second: 1
  excluded_path_prefixes: ["/health"]
users:
  alice: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA"
"#;
        let config = GatehouseConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.login.max_attempts, 3);
        assert_eq!(config.login.lock_duration_minutes, 15);
        assert_eq!(config.login.store_failure_policy, FailurePolicy::Open);
        assert_eq!(config.admission.bucket_capacity, 10);
        assert_eq!(config.admission.bucket_refill_per_second, 1.0);
        assert_eq!(config.admission.excluded_path_prefixes, vec!["/health"]);
        assert!(config.users.contains_key("alice"));
    }

    #[test]
    fn test_validate_rejects_unusable_values() {
        let err = GatehouseConfig::from_yaml("login:\n  max_attempts: 0\n").unwrap_err();
        assert!(matches!(err, GatehouseError::Config(_)));

        let err = GatehouseConfig::from_yaml("admission:\n  bucket_refill_per_second: 0\n")
            .unwrap_err();
        assert!(matches!(err, GatehouseError::Config(_)));

        let err = GatehouseConfig::from_yaml("admission:\n  bucket_capacity: 0\n").unwrap_err();
        assert!(matches!(err, GatehouseError::Config(_)));
    }

    #[test]
    fn test_validate_bounds_bucket_refill_time() {
        let err = GatehouseConfig::from_yaml("admission:\n  bucket_refill_per_second: 1.0e-18\n")
            .unwrap_err();
        assert!(matches!(err, GatehouseError::Config(_)));

        // 100 tokens at 0.001/s refill in about 28 hours
        let config =
            GatehouseConfig::from_yaml("admission:\n  bucket_refill_per_second: 0.001\n").unwrap();
        assert_eq!(config.admission.bucket_capacity, 100);
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let err = GatehouseConfig::from_yaml("login: [").unwrap_err();
        assert!(matches!(err, GatehouseError::Config(_)));
    }

    #[test]
    fn test_example_file_loads() {
        let from_file = GatehouseConfig::from_file("gatehouse.example.yaml").unwrap();
        assert_eq!(from_file.server.http_addr, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(from_file.login.store_failure_policy, FailurePolicy::Closed);

        let loaded = GatehouseConfig::load(Some(Path::new("gatehouse.example.yaml"))).unwrap();
        assert_eq!(loaded.admission.excluded_path_prefixes, vec!["/health", "/docs"]);
        assert!(loaded.users.is_empty());
    }
}
