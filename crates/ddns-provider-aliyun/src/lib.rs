// # Alibaba Cloud DNS Provider
//
// This crate provides an Alibaba Cloud DNS (Alidns) provider for the DDNS
// daemon, speaking the signed RPC API directly.
//
// ## Behavior
//
// - Authenticates every call with an AccessKey pair (HMAC-SHA1 signature)
// - `initialize()` validates the key pair and runs `DescribeDomains` as a
//   connectivity self-test
// - Looks records up with `DescribeDomainRecords`; `RRKeyWord` is a fuzzy
//   filter, so the RR and type are matched exactly on our side
// - Updates with `UpdateDomainRecord` when the record exists, creates with
//   `AddDomainRecord` otherwise; a write counts only when the response
//   carries a `RecordId`
//
// ## Security Requirements
//
// - The AccessKey secret NEVER appears in logs or Debug output
// - The AccessKey id is logged masked
//
// ## API Reference
//
// - https://help.aliyun.com/document_detail/29739.html (RPC signature)
// - Endpoint: https://alidns.aliyuncs.com/, version 2015-01-09

pub mod signature;

use async_trait::async_trait;
use chrono::Utc;
use ddns_core::config::{EndpointConfig, mask_secret};
use ddns_core::registry::{ProviderKind, ProviderRegistry};
use ddns_core::retry::{RetryPolicy, retry};
use ddns_core::traits::{DnsProvider, DnsProviderFactory, DnsRecord, RecordType, select_record};
use ddns_core::{Error, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Alibaba Cloud DNS API endpoint
pub const ALIYUN_DNS_ENDPOINT: &str = "https://alidns.aliyuncs.com";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// TTL for records this provider writes
const RECORD_TTL: &str = "600";

/// Largest page `DescribeDomainRecords` accepts
const RECORD_PAGE_SIZE: &str = "500";

const PROVIDER: &str = "aliyun";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeDomainRecordsResponse {
    #[serde(default)]
    domain_records: Option<DomainRecords>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DomainRecords {
    #[serde(default)]
    record: Vec<AliyunRecord>,
}

#[derive(Debug, Deserialize)]
struct AliyunRecord {
    #[serde(rename = "RecordId")]
    record_id: String,
    #[serde(rename = "RR")]
    rr: String,
    #[serde(rename = "Type")]
    record_type: String,
    #[serde(rename = "Value")]
    value: String,
    #[serde(rename = "TTL")]
    ttl: Option<u32>,
}

impl From<AliyunRecord> for DnsRecord {
    fn from(record: AliyunRecord) -> Self {
        DnsRecord {
            id: Some(record.record_id),
            name: record.rr,
            record_type: record.record_type,
            value: record.value,
            ttl: record.ttl,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RecordIdResponse {
    #[serde(default)]
    record_id: Option<String>,
}

/// Alibaba Cloud DNS provider
///
/// # Security
///
/// The Debug implementation masks the AccessKey id and hides the secret.
pub struct AliyunProvider {
    /// AccessKey id
    access_key_id: String,

    /// AccessKey secret
    /// ⚠️ NEVER log this value
    access_key_secret: String,

    /// API endpoint (overridable for tests)
    endpoint: String,

    /// Retry policy for each HTTP exchange
    retry_policy: RetryPolicy,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Set once `initialize()` succeeds
    initialized: bool,
}

impl std::fmt::Debug for AliyunProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AliyunProvider")
            .field("access_key_id", &mask_secret(&self.access_key_id))
            .field("access_key_secret", &"<REDACTED>")
            .field("endpoint", &self.endpoint)
            .field("initialized", &self.initialized)
            .finish()
    }
}

impl AliyunProvider {
    /// Create a new, uninitialized Alibaba Cloud DNS provider
    pub fn new(access_key_id: impl Into<String>, access_key_secret: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
            endpoint: ALIYUN_DNS_ENDPOINT.to_string(),
            retry_policy: RetryPolicy::default(),
            client,
            initialized: false,
        }
    }

    /// Override the API endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the retry policy
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// One signed RPC call, wrapped in the retry policy
    ///
    /// Every attempt is signed afresh: the API rejects a reused nonce.
    async fn call<T: DeserializeOwned>(&self, action: &str, params: &[(&str, &str)]) -> Result<T> {
        let text = retry(&self.retry_policy, action, || async move {
            let query = signature::signed_query(
                &self.access_key_id,
                &self.access_key_secret,
                action,
                params,
                Utc::now(),
                &Uuid::new_v4().to_string(),
            )?;
            let url = format!("{}/?{}", self.endpoint, query);

            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| Error::http(format!("{} request failed: {}", action, e)))?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| Error::http(format!("{} response unreadable: {}", action, e)))?;

            if !status.is_success() {
                return Err(api_error(status.as_u16(), &text));
            }
            Ok(text)
        })
        .await?;

        Ok(serde_json::from_str(&text)?)
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(Error::unavailable("Alibaba Cloud DNS provider is not initialized"))
        }
    }

    async fn write(
        &self,
        domain: &str,
        sub_domain: &str,
        record_type: RecordType,
        value: &str,
    ) -> Result<String> {
        let existing = self.find_record(domain, sub_domain, record_type).await?;

        let response: RecordIdResponse = match existing.and_then(|r| r.id) {
            Some(record_id) => {
                info!("Updating existing record: recordId={}", record_id);
                self.call(
                    "UpdateDomainRecord",
                    &[
                        ("RecordId", record_id.as_str()),
                        ("RR", sub_domain),
                        ("Type", record_type.as_str()),
                        ("Value", value),
                        ("TTL", RECORD_TTL),
                    ],
                )
                .await?
            }
            None => {
                info!("Creating new record");
                self.call(
                    "AddDomainRecord",
                    &[
                        ("DomainName", domain),
                        ("RR", sub_domain),
                        ("Type", record_type.as_str()),
                        ("Value", value),
                        ("TTL", RECORD_TTL),
                    ],
                )
                .await?
            }
        };

        response
            .record_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::provider(PROVIDER, "Write response carried no RecordId"))
    }
}

/// Map a non-2xx RPC response to an error, keeping the API error code
fn api_error(status: u16, body: &str) -> Error {
    let detail = match serde_json::from_str::<ApiError>(body) {
        Ok(e) if !e.code.is_empty() => format!("{}: {}", e.code, e.message),
        _ => body.to_string(),
    };
    Error::from_status(PROVIDER, status, &detail)
}

#[async_trait]
impl DnsProvider for AliyunProvider {
    async fn initialize(&mut self) -> Result<()> {
        if self.access_key_id.trim().is_empty() {
            return Err(Error::config("Alibaba Cloud AccessKey id must not be empty"));
        }
        if self.access_key_secret.trim().is_empty() {
            return Err(Error::config("Alibaba Cloud AccessKey secret must not be empty"));
        }

        info!(
            "AccessKey: {}, secret length: {}",
            mask_secret(&self.access_key_id),
            self.access_key_secret.len()
        );

        if let Err(e) = self
            .call::<serde_json::Value>("DescribeDomains", &[("PageSize", "1")])
            .await
        {
            error!("Alibaba Cloud DNS connection test failed: {}", e);
            return Err(e);
        }

        info!("Alibaba Cloud DNS provider initialized");
        self.initialized = true;
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    async fn find_record(
        &self,
        domain: &str,
        sub_domain: &str,
        record_type: RecordType,
    ) -> Result<Option<DnsRecord>> {
        self.ensure_initialized()?;
        debug!("Looking up record: domain={}, rr={}", domain, sub_domain);

        let response: DescribeDomainRecordsResponse = self
            .call(
                "DescribeDomainRecords",
                &[
                    ("DomainName", domain),
                    ("RRKeyWord", sub_domain),
                    ("Type", record_type.as_str()),
                    ("PageSize", RECORD_PAGE_SIZE),
                ],
            )
            .await?;

        let records: Vec<DnsRecord> = response
            .domain_records
            .map(|d| d.record)
            .unwrap_or_default()
            .into_iter()
            .map(DnsRecord::from)
            .collect();

        Ok(select_record(&records, sub_domain, record_type).cloned())
    }

    async fn update_record(
        &self,
        domain: &str,
        sub_domain: &str,
        record_type: RecordType,
        value: &str,
    ) -> bool {
        if !self.initialized {
            warn!("Alibaba Cloud DNS provider is not initialized, skipping update");
            return false;
        }

        info!(
            "Updating DNS record: domain={}, rr={}, type={}, value={}",
            domain, sub_domain, record_type, value
        );

        match self.write(domain, sub_domain, record_type, value).await {
            Ok(record_id) => {
                info!("DNS record written: recordId={}", record_id);
                true
            }
            Err(e) => {
                error!("Alibaba Cloud DNS update failed: {}", e);
                false
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Factory for creating Alibaba Cloud DNS providers
pub struct AliyunFactory;

impl DnsProviderFactory for AliyunFactory {
    fn create(&self, config: &EndpointConfig, retry: RetryPolicy) -> Result<Box<dyn DnsProvider>> {
        Ok(Box::new(
            AliyunProvider::new(
                config.access_key.clone(),
                config.secret_key.clone().unwrap_or_default(),
            )
            .with_retry_policy(retry),
        ))
    }
}

/// Register the Alibaba Cloud DNS provider with a registry
pub fn register(registry: &mut ProviderRegistry) {
    registry.register_provider(ProviderKind::Aliyun, Box::new(AliyunFactory));
}
