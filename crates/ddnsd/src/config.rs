//! Daemon configuration, read once from `DDNS_*` environment variables

use anyhow::{Context, Result};
use ddns_core::config::{
    DEFAULT_RETRY_BACKOFF_MS, DEFAULT_RETRY_MAX_ATTEMPTS, DEFAULT_UPDATE_INTERVAL_MS,
};
use ddns_core::{DdnsConfig, EndpointConfig, ProviderKind, RetryConfig};
use ddns_notify::EmailConfig;
use ddns_notify::email::DEFAULT_SMTP_PORT;
use std::net::SocketAddr;
use std::str::FromStr;
use tracing::Level;

/// Default bind address of the liveness endpoint
pub const DEFAULT_HEALTH_ADDR: &str = "0.0.0.0:8080";

/// Application configuration
#[derive(Debug)]
pub struct Config {
    pub ddns: DdnsConfig,
    pub email: EmailConfig,
    /// `None` disables the liveness endpoint
    pub health_addr: Option<SocketAddr>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &str| -> Result<String> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .with_context(|| format!("{} is required", key))
        };
        let optional = |key: &str| -> Option<String> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut endpoint = EndpointConfig::new(
            require("DDNS_PROVIDER")?.to_lowercase(),
            require("DDNS_DOMAIN")?,
            require("DDNS_SUB_DOMAIN")?,
        )
        .with_access_key(require("DDNS_ACCESS_KEY")?)
        .with_update_interval_ms(parse_or(
            "DDNS_UPDATE_INTERVAL",
            optional("DDNS_UPDATE_INTERVAL"),
            DEFAULT_UPDATE_INTERVAL_MS,
        )?)
        .with_proxied(parse_bool(
            "DDNS_PROXIED",
            optional("DDNS_PROXIED"),
            false,
        )?);

        if let Some(secret_key) = optional("DDNS_SECRET_KEY") {
            endpoint = endpoint.with_secret_key(secret_key);
        }
        if let Some(zone_id) = optional("DDNS_ZONE_ID") {
            endpoint = endpoint.with_zone_id(zone_id);
        }

        let retry = RetryConfig {
            max_attempts: parse_or(
                "DDNS_RETRY_MAX_ATTEMPTS",
                optional("DDNS_RETRY_MAX_ATTEMPTS"),
                DEFAULT_RETRY_MAX_ATTEMPTS,
            )?,
            backoff_ms: parse_or(
                "DDNS_RETRY_BACKOFF_MS",
                optional("DDNS_RETRY_BACKOFF_MS"),
                DEFAULT_RETRY_BACKOFF_MS,
            )?,
        };

        let email = EmailConfig {
            enabled: parse_bool(
                "DDNS_EMAIL_ENABLED",
                optional("DDNS_EMAIL_ENABLED"),
                false,
            )?,
            host: optional("DDNS_EMAIL_HOST").unwrap_or_default(),
            port: parse_or(
                "DDNS_EMAIL_PORT",
                optional("DDNS_EMAIL_PORT"),
                DEFAULT_SMTP_PORT,
            )?,
            username: optional("DDNS_EMAIL_USERNAME").unwrap_or_default(),
            password: optional("DDNS_EMAIL_PASSWORD").unwrap_or_default(),
            from: optional("DDNS_EMAIL_FROM").unwrap_or_default(),
            to: optional("DDNS_EMAIL_TO").unwrap_or_default(),
        };

        // An explicitly empty DDNS_HEALTH_ADDR disables the endpoint
        let health_addr = match lookup("DDNS_HEALTH_ADDR") {
            Some(addr) if addr.trim().is_empty() => None,
            Some(addr) => Some(parse_addr(&addr)?),
            None => Some(parse_addr(DEFAULT_HEALTH_ADDR)?),
        };

        Ok(Self {
            ddns: DdnsConfig { endpoint, retry },
            email,
            health_addr,
            log_level: optional("DDNS_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let endpoint = &self.ddns.endpoint;

        // Reject unknown providers before anything else is checked
        endpoint.provider.parse::<ProviderKind>()?;

        self.ddns.validate()?;
        self.email.validate()?;
        self.log_level()?;

        Ok(())
    }

    /// The tracing level named by `DDNS_LOG_LEVEL`
    pub fn log_level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "DDNS_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e)),
        None => Ok(default),
    }
}

fn parse_bool(key: &str, value: Option<String>, default: bool) -> Result<bool> {
    let Some(raw) = value else {
        return Ok(default);
    };
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("{} must be true or false. Got: {}", key, raw),
    }
}

fn parse_addr(raw: &str) -> Result<SocketAddr> {
    raw.trim()
        .parse()
        .with_context(|| format!("DDNS_HEALTH_ADDR is not a valid socket address: {}", raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    const MINIMAL: &[(&str, &str)] = &[
        ("DDNS_PROVIDER", "Cloudflare"),
        ("DDNS_ACCESS_KEY", "cf-token-0123456789"),
        ("DDNS_DOMAIN", "example.com"),
        ("DDNS_SUB_DOMAIN", "home"),
    ];

    fn with(extra: &[(&'static str, &'static str)]) -> Vec<(&'static str, &'static str)> {
        let mut pairs = MINIMAL.to_vec();
        pairs.extend_from_slice(extra);
        pairs
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_lookup(lookup_from(MINIMAL)).unwrap();
        config.validate().unwrap();

        let endpoint = &config.ddns.endpoint;
        assert_eq!(endpoint.provider, "cloudflare");
        assert_eq!(endpoint.full_domain(), "home.example.com");
        assert_eq!(endpoint.update_interval_ms, 300_000);
        assert!(!endpoint.proxied);
        assert!(endpoint.zone_id.is_none());

        assert_eq!(config.ddns.retry.max_attempts, 5);
        assert_eq!(config.ddns.retry.backoff_ms, 5_000);
        assert!(!config.email.enabled);
        assert_eq!(config.email.port, 465);
        assert_eq!(
            config.health_addr,
            Some("0.0.0.0:8080".parse().unwrap())
        );
        assert_eq!(config.log_level().unwrap(), Level::INFO);
    }

    #[test]
    fn test_missing_required_variable() {
        let pairs: Vec<_> = MINIMAL
            .iter()
            .copied()
            .filter(|(k, _)| *k != "DDNS_DOMAIN")
            .collect();
        let err = Config::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(err.to_string().contains("DDNS_DOMAIN"));
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let mut pairs = MINIMAL.to_vec();
        pairs[0] = ("DDNS_PROVIDER", "route53");
        let config = Config::from_lookup(lookup_from(&pairs)).unwrap();

        let err = config.validate().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("route53"));
        assert!(msg.contains("aliyun, tencent, cloudflare"));
    }

    #[test]
    fn test_optional_values_are_parsed() {
        let config = Config::from_lookup(lookup_from(&with(&[
            ("DDNS_SECRET_KEY", "secret"),
            ("DDNS_ZONE_ID", "zone-123"),
            ("DDNS_UPDATE_INTERVAL", "60000"),
            ("DDNS_PROXIED", "true"),
            ("DDNS_RETRY_MAX_ATTEMPTS", "3"),
            ("DDNS_RETRY_BACKOFF_MS", "250"),
            ("DDNS_HEALTH_ADDR", "127.0.0.1:9090"),
            ("DDNS_LOG_LEVEL", "DEBUG"),
        ])))
        .unwrap();
        config.validate().unwrap();

        let endpoint = &config.ddns.endpoint;
        assert_eq!(endpoint.secret_key.as_deref(), Some("secret"));
        assert_eq!(endpoint.zone_id.as_deref(), Some("zone-123"));
        assert_eq!(endpoint.update_interval_ms, 60_000);
        assert!(endpoint.proxied);
        assert_eq!(config.ddns.retry.max_attempts, 3);
        assert_eq!(config.ddns.retry.backoff_ms, 250);
        assert_eq!(
            config.health_addr,
            Some("127.0.0.1:9090".parse().unwrap())
        );
        assert_eq!(config.log_level().unwrap(), Level::DEBUG);
    }

    #[test]
    fn test_empty_health_addr_disables_endpoint() {
        let config =
            Config::from_lookup(lookup_from(&with(&[("DDNS_HEALTH_ADDR", "")]))).unwrap();
        assert!(config.health_addr.is_none());
    }

    #[test]
    fn test_invalid_numbers_are_errors() {
        let err = Config::from_lookup(lookup_from(&with(&[("DDNS_UPDATE_INTERVAL", "5m")])))
            .unwrap_err();
        assert!(err.to_string().contains("DDNS_UPDATE_INTERVAL"));

        let err = Config::from_lookup(lookup_from(&with(&[("DDNS_PROXIED", "maybe")])))
            .unwrap_err();
        assert!(err.to_string().contains("DDNS_PROXIED"));
    }

    #[test]
    fn test_zero_interval_fails_validation() {
        let config =
            Config::from_lookup(lookup_from(&with(&[("DDNS_UPDATE_INTERVAL", "0")]))).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_apex_subdomain_is_valid() {
        let mut pairs = MINIMAL.to_vec();
        pairs[3] = ("DDNS_SUB_DOMAIN", "@");
        let config = Config::from_lookup(lookup_from(&pairs)).unwrap();
        config.validate().unwrap();
        assert_eq!(config.ddns.endpoint.full_domain(), "example.com");
    }

    #[test]
    fn test_enabled_email_requires_settings() {
        let config =
            Config::from_lookup(lookup_from(&with(&[("DDNS_EMAIL_ENABLED", "1")]))).unwrap();
        assert!(config.validate().is_err());

        let config = Config::from_lookup(lookup_from(&with(&[
            ("DDNS_EMAIL_ENABLED", "true"),
            ("DDNS_EMAIL_HOST", "smtp.example.com"),
            ("DDNS_EMAIL_PORT", "587"),
            ("DDNS_EMAIL_USERNAME", "ddns@example.com"),
            ("DDNS_EMAIL_PASSWORD", "hunter22"),
            ("DDNS_EMAIL_FROM", "ddns@example.com"),
            ("DDNS_EMAIL_TO", "ops@example.com"),
        ])))
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.email.port, 587);
    }

    #[test]
    fn test_invalid_log_level() {
        let config =
            Config::from_lookup(lookup_from(&with(&[("DDNS_LOG_LEVEL", "verbose")]))).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_secrets_not_exposed_in_debug() {
        let config = Config::from_lookup(lookup_from(&with(&[
            ("DDNS_SECRET_KEY", "very-secret-key"),
            ("DDNS_EMAIL_PASSWORD", "hunter22"),
        ])))
        .unwrap();

        let debug_str = format!("{:?}", config);
        assert!(!debug_str.contains("cf-token-0123456789"));
        assert!(!debug_str.contains("very-secret-key"));
        assert!(!debug_str.contains("hunter22"));
    }
}
