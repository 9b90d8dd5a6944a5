//! Provider selector
//!
//! Maps a configured provider identifier to a constructed DNS provider.
//!
//! The set of identifiers is closed ([`ProviderKind`]); which of them are
//! usable depends on which provider crates registered a factory. The two
//! failure modes are reported differently:
//!
//! - an identifier that is not a [`ProviderKind`] at all, and
//! - a recognized identifier whose provider crate is not wired into this
//!   build.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ddns_core::registry::ProviderRegistry;
//!
//! let mut registry = ProviderRegistry::new();
//! ddns_provider_cloudflare::register(&mut registry);
//!
//! let mut provider = registry.select(&config.endpoint, config.retry.policy())?;
//! provider.initialize().await?;
//! ```

use crate::config::EndpointConfig;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::traits::{DnsProvider, DnsProviderFactory};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Every provider this system knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderKind {
    /// Alibaba Cloud DNS (signed key/secret RPC)
    Aliyun,
    /// Tencent Cloud DNSPod (signed key/secret RPC)
    Tencent,
    /// Cloudflare (bearer token, zone-scoped REST)
    Cloudflare,
}

impl ProviderKind {
    /// All recognized kinds, in a stable order
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::Aliyun,
        ProviderKind::Tencent,
        ProviderKind::Cloudflare,
    ];

    /// The configuration identifier for this kind
    pub fn id(&self) -> &'static str {
        match self {
            ProviderKind::Aliyun => "aliyun",
            ProviderKind::Tencent => "tencent",
            ProviderKind::Cloudflare => "cloudflare",
        }
    }

    /// Human-readable provider name
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::Aliyun => "Alibaba Cloud DNS",
            ProviderKind::Tencent => "Tencent Cloud DNSPod",
            ProviderKind::Cloudflare => "Cloudflare",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.id().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                Error::config(format!(
                    "Unsupported DNS provider: '{}'. Recognized providers: {}",
                    wanted,
                    join_ids(ProviderKind::ALL.iter())
                ))
            })
    }
}

/// Registry of provider factories keyed by [`ProviderKind`]
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Box<dyn DnsProviderFactory>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a DNS provider factory
    ///
    /// Registering the same kind twice replaces the earlier factory.
    pub fn register_provider(&mut self, kind: ProviderKind, factory: Box<dyn DnsProviderFactory>) {
        self.providers.insert(kind, factory);
    }

    /// Construct the provider named by `config.provider`
    ///
    /// The returned provider is not initialized yet; call
    /// [`DnsProvider::initialize`] before use.
    ///
    /// # Errors
    ///
    /// - `Error::Config` naming the identifier and the recognized set when
    ///   the identifier is unknown
    /// - `Error::Config` naming the wired set when the identifier is
    ///   recognized but no factory was registered for it
    /// - any error from the factory itself
    pub fn select(
        &self,
        config: &EndpointConfig,
        retry: RetryPolicy,
    ) -> Result<Box<dyn DnsProvider>> {
        let kind: ProviderKind = config.provider.parse()?;

        let factory = self.providers.get(&kind).ok_or_else(|| {
            Error::config(format!(
                "DNS provider '{}' is recognized but not wired into this build. \
                Wired providers: {}",
                kind,
                self.wired_list()
            ))
        })?;

        factory.create(config, retry)
    }

    /// Kinds with a registered factory, in stable order
    pub fn wired(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<ProviderKind> = self.providers.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Recognized kinds without a registered factory
    pub fn missing_kinds(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| !self.providers.contains_key(kind))
            .collect()
    }

    /// Check if a provider kind is registered
    pub fn has_provider(&self, kind: ProviderKind) -> bool {
        self.providers.contains_key(&kind)
    }

    fn wired_list(&self) -> String {
        let wired = self.wired();
        if wired.is_empty() {
            "none".to_string()
        } else {
            join_ids(wired.iter())
        }
    }
}

fn join_ids<'a>(kinds: impl Iterator<Item = &'a ProviderKind>) -> String {
    kinds.map(|k| k.id()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{DnsRecord, RecordType};
    use async_trait::async_trait;

    struct StubProvider;

    #[async_trait]
    impl DnsProvider for StubProvider {
        async fn initialize(&mut self) -> Result<()> {
            Ok(())
        }

        fn is_initialized(&self) -> bool {
            false
        }

        async fn find_record(
            &self,
            _domain: &str,
            _sub_domain: &str,
            _record_type: RecordType,
        ) -> Result<Option<DnsRecord>> {
            Ok(None)
        }

        async fn update_record(
            &self,
            _domain: &str,
            _sub_domain: &str,
            _record_type: RecordType,
            _value: &str,
        ) -> bool {
            false
        }

        fn provider_name(&self) -> &'static str {
            "stub"
        }
    }

    struct StubFactory;

    impl DnsProviderFactory for StubFactory {
        fn create(
            &self,
            _config: &EndpointConfig,
            _retry: RetryPolicy,
        ) -> Result<Box<dyn DnsProvider>> {
            Ok(Box::new(StubProvider))
        }
    }

    fn endpoint(provider: &str) -> EndpointConfig {
        EndpointConfig::new(provider, "example.com", "sub")
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("aliyun".parse::<ProviderKind>().unwrap(), ProviderKind::Aliyun);
        assert_eq!(" Tencent ".parse::<ProviderKind>().unwrap(), ProviderKind::Tencent);
        assert_eq!(
            "CLOUDFLARE".parse::<ProviderKind>().unwrap(),
            ProviderKind::Cloudflare
        );
    }

    #[test]
    fn test_kind_ids_round_trip() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.id().parse::<ProviderKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_registry_registration() {
        let mut registry = ProviderRegistry::new();

        assert!(!registry.has_provider(ProviderKind::Cloudflare));
        assert_eq!(registry.missing_kinds().len(), 3);

        registry.register_provider(ProviderKind::Cloudflare, Box::new(StubFactory));

        assert!(registry.has_provider(ProviderKind::Cloudflare));
        assert_eq!(registry.wired(), vec![ProviderKind::Cloudflare]);
        assert_eq!(
            registry.missing_kinds(),
            vec![ProviderKind::Aliyun, ProviderKind::Tencent]
        );
    }

    #[test]
    fn test_select_registered() {
        let mut registry = ProviderRegistry::new();
        registry.register_provider(ProviderKind::Cloudflare, Box::new(StubFactory));

        let provider = registry
            .select(&endpoint("cloudflare"), RetryPolicy::no_retry())
            .unwrap();
        assert_eq!(provider.provider_name(), "stub");
    }

    #[test]
    fn test_select_unrecognized_identifier() {
        let mut registry = ProviderRegistry::new();
        registry.register_provider(ProviderKind::Cloudflare, Box::new(StubFactory));

        let err = registry
            .select(&endpoint("route53"), RetryPolicy::no_retry())
            .err()
            .unwrap();
        let msg = err.to_string();
        assert!(matches!(err, Error::Config(_)));
        assert!(msg.contains("Unsupported DNS provider: 'route53'"));
        assert!(msg.contains("aliyun, tencent, cloudflare"));
    }

    #[test]
    fn test_select_recognized_but_not_wired() {
        let mut registry = ProviderRegistry::new();
        registry.register_provider(ProviderKind::Cloudflare, Box::new(StubFactory));

        let err = registry
            .select(&endpoint("aliyun"), RetryPolicy::no_retry())
            .err()
            .unwrap();
        let msg = err.to_string();
        assert!(msg.contains("'aliyun' is recognized but not wired"));
        assert!(msg.contains("Wired providers: cloudflare"));
    }

    #[test]
    fn test_select_empty_registry() {
        let registry = ProviderRegistry::new();
        let err = registry
            .select(&endpoint("tencent"), RetryPolicy::no_retry())
            .err()
            .unwrap();
        assert!(err.to_string().contains("Wired providers: none"));
    }
}
