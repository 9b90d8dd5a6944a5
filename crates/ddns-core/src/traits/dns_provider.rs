// # DNS Provider Trait
//
// Defines the interface for reading and writing the managed A record via
// a provider API.
//
// ## Implementations
//
// - Alibaba Cloud DNS: `ddns-provider-aliyun` crate
// - Tencent Cloud DNSPod: `ddns-provider-tencent` crate
// - Cloudflare: `ddns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::{DnsProvider, RecordType};
//
// #[tokio::main]
// async fn main() -> ddns_core::Result<()> {
//     let mut provider = /* DnsProvider implementation */;
//
//     // Two-phase initialization: validation and self-test happen here
//     provider.initialize().await?;
//
//     let current = provider.get_current_record("example.com", "home").await?;
//     if current.as_deref() != Some("203.0.113.7") {
//         provider
//             .update_record("example.com", "home", RecordType::A, "203.0.113.7")
//             .await;
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// DNS record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordType {
    /// A record (IPv4)
    A,
}

impl RecordType {
    /// The wire name used by every provider
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A DNS record as seen by a provider
///
/// The provider is the source of truth; this is a read-only snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    /// Provider-assigned identifier
    pub id: Option<String>,
    /// Record name as the provider reports it (subdomain or FQDN)
    pub name: String,
    /// Record type as reported by the provider ("A", "CNAME", ...)
    pub record_type: String,
    /// Record value (the IP address for A records)
    pub value: String,
    /// Time-to-live for the record
    pub ttl: Option<u32>,
}

/// Pick the record a provider list refers to
///
/// Matches `name` exactly (case-sensitive) and `record_type`. When several
/// records qualify the first one in provider order wins; duplicates are
/// not merged or reconciled.
pub fn select_record<'a>(
    records: &'a [DnsRecord],
    name: &str,
    record_type: RecordType,
) -> Option<&'a DnsRecord> {
    records
        .iter()
        .find(|r| r.name == name && r.record_type == record_type.as_str())
}

/// Trait for DNS provider implementations
///
/// This trait defines the capability set {lookup, create, update} for one
/// provider. Implementations handle the specifics of each provider's API
/// and authentication scheme.
///
/// # Lifecycle
///
/// Construction is a plain value constructor with no I/O. The provider is
/// inactive until [`DnsProvider::initialize`] succeeds; while inactive,
/// `get_current_record` fails with `Error::Unavailable` and
/// `update_record` returns `false`.
///
/// # Retry
///
/// Each outbound HTTP exchange is wrapped with [`crate::retry::retry`] at
/// the call site, using the policy the provider was built with. Soft
/// failures reported inside a successful response are not retried.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Validate credentials, run the connectivity self-test and resolve any
    /// secondary identifiers (zones)
    ///
    /// Called once at startup. Any error here is a fatal configuration
    /// error: the daemon must not start scheduling cycles.
    async fn initialize(&mut self) -> Result<(), crate::Error>;

    /// Whether [`DnsProvider::initialize`] has completed successfully
    fn is_initialized(&self) -> bool;

    /// Look up the record matching `sub_domain` and `record_type`
    ///
    /// # Returns
    ///
    /// - `Ok(Some(record))`: first matching record in provider order
    /// - `Ok(None)`: no such record; this is a normal result
    /// - `Err(Error)`: authentication failure, network failure after
    ///   retries, or a malformed provider response
    async fn find_record(
        &self,
        domain: &str,
        sub_domain: &str,
        record_type: RecordType,
    ) -> Result<Option<DnsRecord>, crate::Error>;

    /// Current value of the A record for `sub_domain` under `domain`
    ///
    /// "Not found" is `Ok(None)`, never an error.
    async fn get_current_record(
        &self,
        domain: &str,
        sub_domain: &str,
    ) -> Result<Option<String>, crate::Error> {
        Ok(self
            .find_record(domain, sub_domain, RecordType::A)
            .await?
            .map(|record| record.value))
    }

    /// Point the record at `value`, creating it if it does not exist
    ///
    /// Looks up the record identifier first; issues an update against it
    /// when found and a create otherwise.
    ///
    /// # Returns
    ///
    /// `true` only when the provider confirmed the write. Every other
    /// outcome, including a failure flagged inside a successful HTTP
    /// response, is `false`. This method never returns an error.
    async fn update_record(
        &self,
        domain: &str,
        sub_domain: &str,
        record_type: RecordType,
        value: &str,
    ) -> bool;

    /// Get the provider name (for logging/debugging)
    ///
    /// # Returns
    ///
    /// A static string identifying the provider (e.g., "cloudflare", "aliyun")
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS providers from configuration
pub trait DnsProviderFactory: Send + Sync {
    /// Create an uninitialized DnsProvider from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Endpoint configuration (credentials, domain, flags)
    /// - `retry`: Retry policy for the provider's outbound calls
    ///
    /// # Returns
    ///
    /// A boxed DnsProvider trait object. No I/O happens here.
    fn create(
        &self,
        config: &crate::config::EndpointConfig,
        retry: crate::retry::RetryPolicy,
    ) -> Result<Box<dyn DnsProvider>, crate::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, name: &str, record_type: &str, value: &str) -> DnsRecord {
        DnsRecord {
            id: Some(id.to_string()),
            name: name.to_string(),
            record_type: record_type.to_string(),
            value: value.to_string(),
            ttl: Some(600),
        }
    }

    #[test]
    fn test_select_record_exact_name_and_type() {
        let records = vec![
            record("1", "home-lab", "A", "10.0.0.1"),
            record("2", "home", "TXT", "v=spf1"),
            record("3", "Home", "A", "10.0.0.2"),
            record("4", "home", "A", "10.0.0.3"),
        ];

        let selected = select_record(&records, "home", RecordType::A).unwrap();
        assert_eq!(selected.id.as_deref(), Some("4"));
    }

    #[test]
    fn test_select_record_first_match_wins() {
        let records = vec![
            record("1", "home", "A", "10.0.0.1"),
            record("2", "home", "A", "10.0.0.2"),
        ];

        let selected = select_record(&records, "home", RecordType::A).unwrap();
        assert_eq!(selected.value, "10.0.0.1");
    }

    #[test]
    fn test_select_record_none() {
        let records = vec![record("1", "www", "A", "10.0.0.1")];
        assert!(select_record(&records, "home", RecordType::A).is_none());
        assert!(select_record(&[], "home", RecordType::A).is_none());
    }

    #[test]
    fn test_record_type_wire_names() {
        assert_eq!(RecordType::A.as_str(), "A");
        assert_eq!(RecordType::A.to_string(), "A");
        assert_eq!(serde_json::to_string(&RecordType::A).unwrap(), "\"A\"");
    }
}
