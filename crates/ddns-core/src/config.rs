//! Configuration types for the DDNS system
//!
//! This module defines the configuration structures shared by the engine,
//! the provider factories and the daemon. Loading them (from the
//! environment) is the daemon's job; this module only defines and
//! validates them.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Default reconciliation interval (5 minutes)
pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 300_000;

/// Default number of attempts for an outbound provider call
pub const DEFAULT_RETRY_MAX_ATTEMPTS: usize = 5;

/// Default fixed backoff between provider call attempts
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 5_000;

/// Subdomain value that designates the zone apex
pub const APEX: &str = "@";

/// Main DDNS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DdnsConfig {
    /// The single record this process keeps in sync
    pub endpoint: EndpointConfig,

    /// Retry policy for outbound provider calls
    #[serde(default)]
    pub retry: RetryConfig,
}

impl DdnsConfig {
    /// Create a configuration with default retry settings
    pub fn new(endpoint: EndpointConfig) -> Self {
        Self {
            endpoint,
            retry: RetryConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.endpoint.validate()?;
        self.retry.validate()?;
        Ok(())
    }
}

/// Provider, credentials and record coordinates
///
/// Credential fields are interpreted per provider:
///
/// | provider   | `access_key`   | `secret_key` | `zone_id`            |
/// |------------|----------------|--------------|----------------------|
/// | aliyun     | AccessKeyId    | AccessKeySecret | unused            |
/// | tencent    | SecretId       | SecretKey    | unused               |
/// | cloudflare | API token      | unused       | optional, resolved from `domain` when absent |
///
/// Credential presence is checked by the provider's `initialize()`, not
/// here, because which fields are required depends on the provider.
#[derive(Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Provider identifier (e.g. "aliyun", "tencent", "cloudflare")
    pub provider: String,

    /// Access key, secret id or API token
    #[serde(default)]
    pub access_key: String,

    /// Secret key for signed RPC providers
    #[serde(default)]
    pub secret_key: Option<String>,

    /// Zone identifier for zone-scoped providers
    #[serde(default)]
    pub zone_id: Option<String>,

    /// Registered domain (e.g. "example.com")
    pub domain: String,

    /// Record name under the domain (e.g. "home", or "@" for the apex)
    pub sub_domain: String,

    /// Reconciliation interval in milliseconds
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,

    /// Whether the record is proxied (Cloudflare only)
    #[serde(default)]
    pub proxied: bool,
}

// Credentials stay out of Debug output
impl std::fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("provider", &self.provider)
            .field("access_key", &mask_secret(&self.access_key))
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<REDACTED>"))
            .field("zone_id", &self.zone_id)
            .field("domain", &self.domain)
            .field("sub_domain", &self.sub_domain)
            .field("update_interval_ms", &self.update_interval_ms)
            .field("proxied", &self.proxied)
            .finish()
    }
}

impl EndpointConfig {
    /// Create an endpoint configuration with default interval and flags
    pub fn new(
        provider: impl Into<String>,
        domain: impl Into<String>,
        sub_domain: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            access_key: String::new(),
            secret_key: None,
            zone_id: None,
            domain: domain.into(),
            sub_domain: sub_domain.into(),
            update_interval_ms: DEFAULT_UPDATE_INTERVAL_MS,
            proxied: false,
        }
    }

    /// Set the access key / token
    pub fn with_access_key(mut self, access_key: impl Into<String>) -> Self {
        self.access_key = access_key.into();
        self
    }

    /// Set the secret key
    pub fn with_secret_key(mut self, secret_key: impl Into<String>) -> Self {
        self.secret_key = Some(secret_key.into());
        self
    }

    /// Set the zone id
    pub fn with_zone_id(mut self, zone_id: impl Into<String>) -> Self {
        self.zone_id = Some(zone_id.into());
        self
    }

    /// Set the update interval in milliseconds
    pub fn with_update_interval_ms(mut self, interval_ms: u64) -> Self {
        self.update_interval_ms = interval_ms;
        self
    }

    /// Set the proxied flag
    pub fn with_proxied(mut self, proxied: bool) -> Self {
        self.proxied = proxied;
        self
    }

    /// The fully-qualified record name, e.g. "home.example.com"
    ///
    /// The apex subdomain `@` maps to the bare domain.
    pub fn full_domain(&self) -> String {
        full_domain(&self.domain, &self.sub_domain)
    }

    /// The reconciliation interval as a `Duration`
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    /// Validate the endpoint configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.provider.trim().is_empty() {
            return Err(crate::Error::config("DNS provider must be set"));
        }

        validate_domain_name(&self.domain)?;

        if self.sub_domain != APEX {
            validate_domain_name(&self.sub_domain)?;
        }

        if self.update_interval_ms == 0 {
            return Err(crate::Error::config("Update interval must be > 0"));
        }

        Ok(())
    }
}

/// Retry configuration for outbound provider calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts in total, including the first one
    #[serde(default = "default_retry_max_attempts")]
    pub max_attempts: usize,

    /// Fixed delay between attempts (in milliseconds)
    #[serde(default = "default_retry_backoff_ms")]
    pub backoff_ms: u64,
}

impl RetryConfig {
    /// Validate the retry configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.max_attempts == 0 || self.max_attempts > 10 {
            return Err(crate::Error::config(format!(
                "Retry max attempts must be between 1 and 10. Got: {}",
                self.max_attempts
            )));
        }
        Ok(())
    }

    /// Build the runtime retry policy
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.backoff_ms))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_max_attempts(),
            backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Join a subdomain and domain into a fully-qualified name
pub fn full_domain(domain: &str, sub_domain: &str) -> String {
    if sub_domain == APEX || sub_domain.is_empty() {
        domain.to_string()
    } else {
        format!("{}.{}", sub_domain, domain)
    }
}

/// Mask a credential for logging: first four and last four characters
///
/// Values shorter than eight characters are fully masked.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() < 8 {
        return "***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}***{}", head, tail)
}

/// Validate that a string is a valid domain name
///
/// This implements basic DNS domain name validation per RFC 1035.
/// It's not comprehensive but catches common errors.
pub fn validate_domain_name(domain: &str) -> Result<(), crate::Error> {
    if domain.is_empty() {
        return Err(crate::Error::config("Domain name cannot be empty"));
    }

    // Total length limit (RFC 1035: 253 chars max)
    if domain.len() > 253 {
        return Err(crate::Error::config(format!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        )));
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return Err(crate::Error::config(format!(
                "Domain name has empty label: '{}'",
                domain
            )));
        }

        if label.len() > 63 {
            return Err(crate::Error::config(format!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            )));
        }

        // Wildcard labels are allowed for records like "*.example.com"
        if label == "*" {
            continue;
        }

        if !label.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') {
            return Err(crate::Error::config(format!(
                "Domain label contains invalid characters. Label: '{}'. \
                Valid: alphanumeric, hyphen and underscore only.",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(crate::Error::config(format!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            )));
        }
    }

    Ok(())
}

fn default_update_interval_ms() -> u64 {
    DEFAULT_UPDATE_INTERVAL_MS
}

fn default_retry_max_attempts() -> usize {
    DEFAULT_RETRY_MAX_ATTEMPTS
}

fn default_retry_backoff_ms() -> u64 {
    DEFAULT_RETRY_BACKOFF_MS
}
