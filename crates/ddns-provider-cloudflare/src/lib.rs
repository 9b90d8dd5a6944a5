// # Cloudflare DNS Provider
//
// This crate provides a Cloudflare DNS provider implementation for the
// DDNS daemon.
//
// ## Behavior
//
// - Authenticates with a bearer API token
// - Resolves the zone once, at `initialize()`: a configured zone id is
//   verified, otherwise the zone is looked up by domain name
// - Looks records up by fully-qualified name and type
// - Updates with PUT when the record exists, creates with POST otherwise
// - Caches the record id between cycles; a PUT that fails against the
//   cached id clears it, looks the record up again and retries once
// - `success: false` in a 2xx body is a soft failure and is not retried
//
// ## Security Requirements
//
// - API token NEVER appears in logs or Debug output
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - Zone details: GET `/zones/:zone_id`
// - List zones: GET `/zones?name=...`
// - List DNS records: GET `/zones/:zone_id/dns_records?name=...&type=...`
// - Update DNS record: PUT `/zones/:zone_id/dns_records/:record_id`
// - Create DNS record: POST `/zones/:zone_id/dns_records`

use async_trait::async_trait;
use ddns_core::config::{EndpointConfig, full_domain};
use ddns_core::registry::{ProviderKind, ProviderRegistry};
use ddns_core::retry::{RetryPolicy, retry};
use ddns_core::traits::{DnsProvider, DnsProviderFactory, DnsRecord, RecordType, select_record};
use ddns_core::{Error, Result};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// TTL for records this provider writes
const RECORD_TTL: u32 = 3600;

const PROVIDER: &str = "cloudflare";

/// Envelope every Cloudflare v4 response is wrapped in
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

impl<T> ApiResponse<T> {
    /// Render the `errors` array for logs
    fn error_text(&self) -> String {
        if self.errors.is_empty() {
            return "no error details".to_string();
        }
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.code, e.message))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Convert a soft failure into an error
    fn into_result(self, operation: &str) -> Result<Option<T>> {
        if self.success {
            Ok(self.result)
        } else {
            Err(Error::provider(
                PROVIDER,
                format!("{} rejected: {}", operation, self.error_text()),
            ))
        }
    }
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct CloudflareRecord {
    id: String,
    name: String,
    #[serde(rename = "type")]
    record_type: String,
    content: String,
    ttl: Option<u32>,
}

impl From<CloudflareRecord> for DnsRecord {
    fn from(record: CloudflareRecord) -> Self {
        DnsRecord {
            id: Some(record.id),
            name: record.name,
            record_type: record.record_type,
            value: record.content,
            ttl: record.ttl,
        }
    }
}

#[derive(Debug, Serialize)]
struct RecordBody<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    name: &'a str,
    content: &'a str,
    ttl: u32,
    proxied: bool,
}

/// Cloudflare DNS provider
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the API token.
pub struct CloudflareProvider {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// Zone id from configuration, verified at initialization
    configured_zone_id: Option<String>,

    /// Registered domain, used to look the zone up when no id is configured
    domain: String,

    /// Whether written records are proxied through Cloudflare
    proxied: bool,

    /// API base URL (overridable for tests)
    api_base: String,

    /// Retry policy for each HTTP exchange
    retry_policy: RetryPolicy,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Zone id resolved by `initialize()`; `None` until then
    zone_id: Option<String>,

    /// Last known id of the managed record
    record_id: Mutex<Option<String>>,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("configured_zone_id", &self.configured_zone_id)
            .field("domain", &self.domain)
            .field("proxied", &self.proxied)
            .field("api_base", &self.api_base)
            .field("zone_id", &self.zone_id)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new, uninitialized Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:DNS:Edit permissions
    /// - `zone_id`: Optional zone id (looked up from `domain` when absent)
    /// - `domain`: Registered domain the record lives under
    /// - `proxied`: Proxy flag for written records
    pub fn new(
        api_token: impl Into<String>,
        zone_id: Option<String>,
        domain: impl Into<String>,
        proxied: bool,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            api_token: api_token.into(),
            configured_zone_id: zone_id.filter(|z| !z.trim().is_empty()),
            domain: domain.into(),
            proxied,
            api_base: CLOUDFLARE_API_BASE.to_string(),
            retry_policy: RetryPolicy::default(),
            client,
            zone_id: None,
            record_id: Mutex::new(None),
        }
    }

    /// Override the API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the retry policy
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Zone id resolved at initialization
    pub fn zone_id(&self) -> Option<&str> {
        self.zone_id.as_deref()
    }

    fn cached_record_id(&self) -> Option<String> {
        match self.record_id.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set_cached_record_id(&self, id: Option<String>) {
        match self.record_id.lock() {
            Ok(mut guard) => *guard = id,
            Err(poisoned) => *poisoned.into_inner() = id,
        }
    }

    /// One HTTP exchange with the API, wrapped in the retry policy
    ///
    /// Transport errors and non-2xx statuses are retried. The body of the
    /// final 2xx response is decoded; its `success` flag is left to the
    /// caller.
    async fn request<T: DeserializeOwned>(
        &self,
        operation: &str,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&RecordBody<'_>>,
    ) -> Result<ApiResponse<T>> {
        let url = format!("{}{}", self.api_base, path);
        let (url, method) = (&url, &method);

        let text = retry(&self.retry_policy, operation, || async move {
            let mut request = self
                .client
                .request(method.clone(), url.as_str())
                .bearer_auth(&self.api_token);
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request
                .send()
                .await
                .map_err(|e| Error::http(format!("{} request failed: {}", operation, e)))?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| Error::http(format!("{} response unreadable: {}", operation, e)))?;

            if !status.is_success() {
                return Err(Error::from_status(PROVIDER, status.as_u16(), &text));
            }
            Ok(text)
        })
        .await?;

        Ok(serde_json::from_str(&text)?)
    }

    /// Verify or look up the zone id
    async fn resolve_zone(&self) -> Result<String> {
        if let Some(ref zone_id) = self.configured_zone_id {
            debug!("Verifying configured zone ID");
            let zone: Option<Zone> = self
                .request("Zone details", Method::GET, &format!("/zones/{}", zone_id), &[], None)
                .await?
                .into_result("Zone details")?;

            return zone.map(|z| z.id).ok_or_else(|| {
                Error::config(format!("Cloudflare zone {} not found", zone_id))
            });
        }

        debug!("Looking up zone ID for domain: {}", self.domain);
        let zones: Vec<Zone> = self
            .request("Zone lookup", Method::GET, "/zones", &[("name", self.domain.as_str())], None)
            .await?
            .into_result("Zone lookup")?
            .unwrap_or_default();

        let zone = zones
            .into_iter()
            .next()
            .ok_or_else(|| Error::config(format!("No Cloudflare zone found for {}", self.domain)))?;

        debug!("Found zone {} ({})", zone.id, zone.name);
        Ok(zone.id)
    }

    fn active_zone(&self) -> Result<&str> {
        self.zone_id
            .as_deref()
            .ok_or_else(|| Error::unavailable("Cloudflare provider is not initialized"))
    }

    async fn lookup(
        &self,
        zone_id: &str,
        fqdn: &str,
        record_type: RecordType,
    ) -> Result<Option<DnsRecord>> {
        debug!("Looking up record: {} (type: {})", fqdn, record_type);

        let records: Vec<CloudflareRecord> = self
            .request(
                "List DNS records",
                Method::GET,
                &format!("/zones/{}/dns_records", zone_id),
                &[("name", fqdn), ("type", record_type.as_str())],
                None,
            )
            .await?
            .into_result("List DNS records")?
            .unwrap_or_default();

        let records: Vec<DnsRecord> = records.into_iter().map(DnsRecord::from).collect();
        let found = select_record(&records, fqdn, record_type).cloned();

        // A fresh "not found" also drops any id left from an earlier lookup
        self.set_cached_record_id(found.as_ref().and_then(|r| r.id.clone()));
        Ok(found)
    }

    async fn put_record(&self, zone_id: &str, record_id: &str, body: &RecordBody<'_>) -> Result<()> {
        self.request::<serde_json::Value>(
            "Update DNS record",
            Method::PUT,
            &format!("/zones/{}/dns_records/{}", zone_id, record_id),
            &[],
            Some(body),
        )
        .await?
        .into_result("Update DNS record")?;
        Ok(())
    }

    async fn create_record(&self, zone_id: &str, body: &RecordBody<'_>) -> Result<()> {
        let created: Option<CloudflareRecord> = self
            .request(
                "Create DNS record",
                Method::POST,
                &format!("/zones/{}/dns_records", zone_id),
                &[],
                Some(body),
            )
            .await?
            .into_result("Create DNS record")?;

        self.set_cached_record_id(created.map(|r| r.id));
        Ok(())
    }

    async fn write(&self, zone_id: &str, fqdn: &str, record_type: RecordType, value: &str) -> Result<()> {
        let body = RecordBody {
            record_type: record_type.as_str(),
            name: fqdn,
            content: value,
            ttl: RECORD_TTL,
            proxied: self.proxied,
        };

        let record_id = match self.cached_record_id() {
            Some(id) => Some(id),
            None => self
                .lookup(zone_id, fqdn, record_type)
                .await?
                .and_then(|r| r.id),
        };

        let Some(record_id) = record_id else {
            info!("Creating DNS record: {} -> {}", fqdn, value);
            return self.create_record(zone_id, &body).await;
        };

        match self.put_record(zone_id, &record_id, &body).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("Update against record {} failed ({}); looking it up again", record_id, e);
                self.set_cached_record_id(None);

                match self.lookup(zone_id, fqdn, record_type).await?.and_then(|r| r.id) {
                    Some(fresh_id) => self.put_record(zone_id, &fresh_id, &body).await,
                    None => {
                        info!("Creating DNS record: {} -> {}", fqdn, value);
                        self.create_record(zone_id, &body).await
                    }
                }
            }
        }
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    async fn initialize(&mut self) -> Result<()> {
        if self.api_token.trim().is_empty() {
            return Err(Error::config("Cloudflare API token is required"));
        }

        info!("API token length: {}", self.api_token.len());

        let zone_id = self.resolve_zone().await?;
        info!("Cloudflare provider initialized (zone: {})", zone_id);
        self.zone_id = Some(zone_id);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.zone_id.is_some()
    }

    async fn find_record(
        &self,
        domain: &str,
        sub_domain: &str,
        record_type: RecordType,
    ) -> Result<Option<DnsRecord>> {
        let zone_id = self.active_zone()?;
        self.lookup(zone_id, &full_domain(domain, sub_domain), record_type)
            .await
    }

    async fn update_record(
        &self,
        domain: &str,
        sub_domain: &str,
        record_type: RecordType,
        value: &str,
    ) -> bool {
        let Ok(zone_id) = self.active_zone() else {
            warn!("Cloudflare provider is not initialized, skipping update");
            return false;
        };

        let fqdn = full_domain(domain, sub_domain);
        info!("Updating Cloudflare DNS record: {} -> {} ({})", fqdn, value, record_type);

        match self.write(zone_id, &fqdn, record_type, value).await {
            Ok(()) => {
                info!("DNS record updated successfully: {} -> {}", fqdn, value);
                true
            }
            Err(e) => {
                error!("Cloudflare update failed for {}: {}", fqdn, e);
                false
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Factory for creating Cloudflare providers
pub struct CloudflareFactory;

impl DnsProviderFactory for CloudflareFactory {
    fn create(&self, config: &EndpointConfig, retry: RetryPolicy) -> Result<Box<dyn DnsProvider>> {
        Ok(Box::new(
            CloudflareProvider::new(
                config.access_key.clone(),
                config.zone_id.clone(),
                config.domain.clone(),
                config.proxied,
            )
            .with_retry_policy(retry),
        ))
    }
}

/// Register the Cloudflare provider with a registry
///
/// # Example
///
/// ```rust
/// use ddns_core::ProviderRegistry;
///
/// let mut registry = ProviderRegistry::new();
/// ddns_provider_cloudflare::register(&mut registry);
/// ```
pub fn register(registry: &mut ProviderRegistry) {
    registry.register_provider(ProviderKind::Cloudflare, Box::new(CloudflareFactory));
}
