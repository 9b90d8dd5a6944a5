// # Tencent Cloud DNSPod Provider
//
// This crate provides a Tencent Cloud DNSPod provider for the DDNS daemon,
// speaking the Tencent Cloud API 3.0 directly.
//
// ## Behavior
//
// - Authenticates every call with a SecretId/SecretKey pair (TC3-HMAC-SHA256)
// - `initialize()` validates the key pair and runs `DescribeRecordList` on
//   the domain as a connectivity self-test; a domain with no records
//   passes
// - Looks records up with `DescribeRecordList` filtered by subdomain and
//   type; `ResourceNotFound.NoDataOfRecord` means "no record"
// - Updates with `ModifyRecord` when the record exists, creates with
//   `CreateRecord` otherwise, both on the default line
// - An API error inside a 200 response (`Response.Error`) is a soft
//   failure and is not retried
//
// ## Security Requirements
//
// - The SecretKey NEVER appears in logs or Debug output
// - The SecretId is logged masked
//
// ## API Reference
//
// - https://cloud.tencent.com/document/api/1427/56193 (signature v3)
// - Endpoint: https://dnspod.tencentcloudapi.com, version 2021-03-23

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
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// DNSPod API endpoint
pub const DNSPOD_ENDPOINT: &str = "https://dnspod.tencentcloudapi.com";

/// Service name used in the credential scope
const SERVICE: &str = "dnspod";

/// DNSPod API version
const API_VERSION: &str = "2021-03-23";

/// Region sent with every request
const REGION: &str = "ap-guangzhou";

/// Resolution line for written records
const DEFAULT_LINE: &str = "默认";

/// TTL for records this provider writes
const RECORD_TTL: u32 = 600;

/// Error code DNSPod returns when a record list is empty
const NO_DATA_OF_RECORD: &str = "ResourceNotFound.NoDataOfRecord";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER: &str = "tencent";

#[derive(Debug, Clone, Deserialize)]
struct ApiError {
    #[serde(rename = "Code", default)]
    code: String,
    #[serde(rename = "Message", default)]
    message: String,
}

impl ApiError {
    fn into_error(self, action: &str) -> Error {
        let detail = format!("{} rejected: {}: {}", action, self.code, self.message);
        if self.code.starts_with("AuthFailure") {
            Error::auth(detail)
        } else {
            Error::provider(PROVIDER, detail)
        }
    }
}

/// What a 2xx response carried
enum Reply<T> {
    Data(T),
    Rejected(ApiError),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "Response")]
    response: Value,
}

#[derive(Debug, Default, Deserialize)]
struct RecordListResponse {
    #[serde(rename = "RecordList", default)]
    record_list: Vec<DnspodRecord>,
}

#[derive(Debug, Deserialize)]
struct DnspodRecord {
    #[serde(rename = "RecordId")]
    record_id: u64,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Type")]
    record_type: String,
    #[serde(rename = "Value")]
    value: String,
    #[serde(rename = "TTL")]
    ttl: Option<u32>,
}

impl From<DnspodRecord> for DnsRecord {
    fn from(record: DnspodRecord) -> Self {
        DnsRecord {
            id: Some(record.record_id.to_string()),
            name: record.name,
            record_type: record.record_type,
            value: record.value,
            ttl: record.ttl,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RecordIdResponse {
    #[serde(rename = "RecordId")]
    record_id: Option<u64>,
}

/// Tencent Cloud DNSPod provider
///
/// # Security
///
/// The Debug implementation masks the SecretId and hides the SecretKey.
pub struct TencentProvider {
    /// API SecretId
    secret_id: String,

    /// API SecretKey
    /// ⚠️ NEVER log this value
    secret_key: String,

    /// Domain probed by the self-test
    domain: String,

    /// API endpoint (overridable for tests)
    endpoint: String,

    /// Retry policy for each HTTP exchange
    retry_policy: RetryPolicy,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Set once `initialize()` succeeds
    initialized: bool,
}

impl std::fmt::Debug for TencentProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TencentProvider")
            .field("secret_id", &mask_secret(&self.secret_id))
            .field("secret_key", &"<REDACTED>")
            .field("domain", &self.domain)
            .field("endpoint", &self.endpoint)
            .field("initialized", &self.initialized)
            .finish()
    }
}

impl TencentProvider {
    /// Create a new, uninitialized DNSPod provider
    pub fn new(
        secret_id: impl Into<String>,
        secret_key: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            secret_id: secret_id.into(),
            secret_key: secret_key.into(),
            domain: domain.into(),
            endpoint: DNSPOD_ENDPOINT.to_string(),
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

    /// Host part of the endpoint, as it appears in the `Host` header
    fn host(&self) -> Result<String> {
        let url = reqwest::Url::parse(&self.endpoint)
            .map_err(|e| Error::config(format!("Invalid DNSPod endpoint: {}", e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| Error::config("DNSPod endpoint has no host"))?;
        Ok(match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        })
    }

    /// One signed API call, wrapped in the retry policy
    ///
    /// Transport errors and non-2xx statuses are retried; a
    /// `Response.Error` in a 2xx body is returned as [`Reply::Rejected`].
    async fn call<T: DeserializeOwned>(&self, action: &str, payload: &Value) -> Result<Reply<T>> {
        let host = self.host()?;
        let payload = payload.to_string();
        let (host, payload) = (host.as_str(), payload.as_str());

        let text = retry(&self.retry_policy, action, || async move {
            let timestamp = Utc::now().timestamp();
            let authorization = signature::authorization(
                &self.secret_id,
                &self.secret_key,
                SERVICE,
                host,
                action,
                payload,
                timestamp,
            )?;

            let response = self
                .client
                .post(format!("{}/", self.endpoint))
                .header("Authorization", authorization)
                .header("Content-Type", signature::CONTENT_TYPE)
                .header("X-TC-Action", action)
                .header("X-TC-Timestamp", timestamp.to_string())
                .header("X-TC-Version", API_VERSION)
                .header("X-TC-Region", REGION)
                .body(payload.to_string())
                .send()
                .await
                .map_err(|e| Error::http(format!("{} request failed: {}", action, e)))?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| Error::http(format!("{} response unreadable: {}", action, e)))?;

            if !status.is_success() {
                return Err(Error::from_status(PROVIDER, status.as_u16(), &text));
            }
            Ok(text)
        })
        .await?;

        let envelope: Envelope = serde_json::from_str(&text)?;
        if let Some(api_error) = envelope.response.get("Error") {
            let api_error: ApiError = serde_json::from_value(api_error.clone())?;
            return Ok(Reply::Rejected(api_error));
        }
        Ok(Reply::Data(serde_json::from_value(envelope.response)?))
    }

    async fn list_records(&self, payload: &Value) -> Result<Vec<DnspodRecord>> {
        match self.call::<RecordListResponse>("DescribeRecordList", payload).await? {
            Reply::Data(list) => Ok(list.record_list),
            Reply::Rejected(e) if e.code == NO_DATA_OF_RECORD => Ok(Vec::new()),
            Reply::Rejected(e) => Err(e.into_error("DescribeRecordList")),
        }
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(Error::unavailable("Tencent DNSPod provider is not initialized"))
        }
    }

    async fn write(
        &self,
        domain: &str,
        sub_domain: &str,
        record_type: RecordType,
        value: &str,
    ) -> Result<u64> {
        let existing = self.find_record(domain, sub_domain, record_type).await?;

        let (action, payload) = match existing.and_then(|r| r.id) {
            Some(record_id) => {
                let record_id: u64 = record_id
                    .parse()
                    .map_err(|_| Error::invalid_input(format!("Invalid record id: {}", record_id)))?;
                info!("Updating existing record: recordId={}", record_id);
                (
                    "ModifyRecord",
                    json!({
                        "Domain": domain,
                        "SubDomain": sub_domain,
                        "RecordType": record_type.as_str(),
                        "RecordLine": DEFAULT_LINE,
                        "Value": value,
                        "RecordId": record_id,
                        "TTL": RECORD_TTL,
                    }),
                )
            }
            None => {
                info!("Creating new record");
                (
                    "CreateRecord",
                    json!({
                        "Domain": domain,
                        "SubDomain": sub_domain,
                        "RecordType": record_type.as_str(),
                        "RecordLine": DEFAULT_LINE,
                        "Value": value,
                        "TTL": RECORD_TTL,
                    }),
                )
            }
        };

        match self.call::<RecordIdResponse>(action, &payload).await? {
            Reply::Data(RecordIdResponse {
                record_id: Some(id),
            }) => Ok(id),
            Reply::Data(_) => Err(Error::provider(
                PROVIDER,
                format!("{} response carried no RecordId", action),
            )),
            Reply::Rejected(e) => Err(e.into_error(action)),
        }
    }
}

#[async_trait]
impl DnsProvider for TencentProvider {
    async fn initialize(&mut self) -> Result<()> {
        if self.secret_id.trim().is_empty() {
            return Err(Error::config("Tencent Cloud SecretId must not be empty"));
        }
        if self.secret_key.trim().is_empty() {
            return Err(Error::config("Tencent Cloud SecretKey must not be empty"));
        }
        self.host()?;

        info!(
            "SecretId: {}, secret length: {}",
            mask_secret(&self.secret_id),
            self.secret_key.len()
        );

        if let Err(e) = self.list_records(&json!({ "Domain": self.domain })).await {
            error!("Tencent DNSPod connection test failed: {}", e);
            return Err(e);
        }

        info!("Tencent DNSPod provider initialized");
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
        debug!("Looking up record: domain={}, subDomain={}", domain, sub_domain);

        let records: Vec<DnsRecord> = self
            .list_records(&json!({
                "Domain": domain,
                "Subdomain": sub_domain,
                "RecordType": record_type.as_str(),
            }))
            .await?
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
            warn!("Tencent DNSPod provider is not initialized, skipping update");
            return false;
        }

        info!(
            "Updating DNS record: domain={}, subDomain={}, type={}, value={}",
            domain, sub_domain, record_type, value
        );

        match self.write(domain, sub_domain, record_type, value).await {
            Ok(record_id) => {
                info!("DNS record written: recordId={}", record_id);
                true
            }
            Err(e) => {
                error!("Tencent DNSPod update failed: {}", e);
                false
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Factory for creating DNSPod providers
pub struct TencentFactory;

impl DnsProviderFactory for TencentFactory {
    fn create(&self, config: &EndpointConfig, retry: RetryPolicy) -> Result<Box<dyn DnsProvider>> {
        Ok(Box::new(
            TencentProvider::new(
                config.access_key.clone(),
                config.secret_key.clone().unwrap_or_default(),
                config.domain.clone(),
            )
            .with_retry_policy(retry),
        ))
    }
}

/// Register the DNSPod provider with a registry
pub fn register(registry: &mut ProviderRegistry) {
    registry.register_provider(ProviderKind::Tencent, Box::new(TencentFactory));
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> TencentProvider {
        TencentProvider::new("AKIDexampleid1234", "examplesecret", "example.com")
            .with_endpoint(server.uri())
            .with_retry_policy(RetryPolicy::no_retry())
    }

    fn reply(body: Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "Response": body }))
    }

    fn no_data() -> ResponseTemplate {
        reply(json!({
            "Error": { "Code": "ResourceNotFound.NoDataOfRecord", "Message": "记录列表为空。" },
            "RequestId": "req-empty"
        }))
    }

    fn record(id: u64, name: &str, value: &str) -> Value {
        json!({ "RecordId": id, "Name": name, "Type": "A", "Value": value, "TTL": 600, "Line": "默认" })
    }

    async fn initialized(server: &MockServer) -> TencentProvider {
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "DescribeRecordList"))
            .and(body_partial_json(json!({ "Domain": "example.com" })))
            .respond_with(no_data())
            .up_to_n_times(1)
            .mount(server)
            .await;

        let mut provider = provider(server);
        provider.initialize().await.unwrap();
        provider
    }

    #[tokio::test]
    async fn test_initialize_accepts_empty_domain() {
        let server = MockServer::start().await;
        let provider = initialized(&server).await;
        assert!(provider.is_initialized());
    }

    #[tokio::test]
    async fn test_requests_are_signed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("Content-Type", "application/json; charset=utf-8"))
            .and(header("X-TC-Version", "2021-03-23"))
            .and(header("X-TC-Region", "ap-guangzhou"))
            .and(header_exists("X-TC-Timestamp"))
            .and(header_exists("Authorization"))
            .respond_with(reply(json!({ "RecordList": [], "RequestId": "r" })))
            .expect(1)
            .mount(&server)
            .await;

        let mut provider = provider(&server);
        provider.initialize().await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let auth = requests[0]
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string();
        assert!(auth.starts_with("TC3-HMAC-SHA256 Credential=AKIDexampleid1234/"));
        assert!(auth.contains("/dnspod/tc3_request, SignedHeaders=content-type;host;x-tc-action"));
    }

    #[tokio::test]
    async fn test_initialize_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(reply(json!({
                "Error": { "Code": "AuthFailure.SignatureFailure", "Message": "The provided credentials could not be validated." },
                "RequestId": "r"
            })))
            .mount(&server)
            .await;

        let mut provider = provider(&server);
        assert!(matches!(
            provider.initialize().await,
            Err(Error::Authentication(_))
        ));
        assert!(!provider.is_initialized());
    }

    #[tokio::test]
    async fn test_initialize_rejects_blank_credentials() {
        let server = MockServer::start().await;
        let mut provider = TencentProvider::new("AKIDexampleid1234", "", "example.com")
            .with_endpoint(server.uri());

        assert!(matches!(provider.initialize().await, Err(Error::Config(_))));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_uninitialized_provider_is_inactive() {
        let server = MockServer::start().await;
        let provider = provider(&server);

        assert!(matches!(
            provider.get_current_record("example.com", "sub").await,
            Err(Error::Unavailable(_))
        ));
        assert!(
            !provider
                .update_record("example.com", "sub", RecordType::A, "203.0.113.7")
                .await
        );
    }

    #[tokio::test]
    async fn test_current_record_lookup() {
        let server = MockServer::start().await;
        let provider = initialized(&server).await;

        Mock::given(method("POST"))
            .and(header("X-TC-Action", "DescribeRecordList"))
            .and(body_partial_json(json!({
                "Domain": "example.com",
                "Subdomain": "sub",
                "RecordType": "A"
            })))
            .respond_with(reply(json!({
                "RecordList": [
                    record(1, "www", "10.0.0.1"),
                    record(2, "sub", "203.0.113.5"),
                    record(3, "sub", "203.0.113.6")
                ],
                "RequestId": "r"
            })))
            .mount(&server)
            .await;

        let current = provider.get_current_record("example.com", "sub").await.unwrap();
        assert_eq!(current.as_deref(), Some("203.0.113.5"));
    }

    #[tokio::test]
    async fn test_no_data_means_not_found() {
        let server = MockServer::start().await;
        let provider = initialized(&server).await;

        Mock::given(method("POST"))
            .and(header("X-TC-Action", "DescribeRecordList"))
            .respond_with(no_data())
            .mount(&server)
            .await;

        assert_eq!(provider.get_current_record("example.com", "sub").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_existing_record() {
        let server = MockServer::start().await;
        let provider = initialized(&server).await;

        Mock::given(method("POST"))
            .and(header("X-TC-Action", "DescribeRecordList"))
            .respond_with(reply(json!({ "RecordList": [record(1234, "sub", "203.0.113.5")] })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "ModifyRecord"))
            .and(body_partial_json(json!({
                "Domain": "example.com",
                "SubDomain": "sub",
                "RecordType": "A",
                "RecordLine": "默认",
                "Value": "203.0.113.7",
                "RecordId": 1234,
                "TTL": 600
            })))
            .respond_with(reply(json!({ "RecordId": 1234, "RequestId": "r" })))
            .expect(1)
            .mount(&server)
            .await;

        assert!(
            provider
                .update_record("example.com", "sub", RecordType::A, "203.0.113.7")
                .await
        );
    }

    #[tokio::test]
    async fn test_create_missing_record() {
        let server = MockServer::start().await;
        let provider = initialized(&server).await;

        Mock::given(method("POST"))
            .and(header("X-TC-Action", "DescribeRecordList"))
            .respond_with(no_data())
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "CreateRecord"))
            .and(body_partial_json(json!({ "SubDomain": "@", "Value": "203.0.113.7" })))
            .respond_with(reply(json!({ "RecordId": 99, "RequestId": "r" })))
            .expect(1)
            .mount(&server)
            .await;

        assert!(
            provider
                .update_record("example.com", "@", RecordType::A, "203.0.113.7")
                .await
        );
    }

    #[tokio::test]
    async fn test_soft_failure_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "DescribeRecordList"))
            .respond_with(no_data())
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header("X-TC-Action", "CreateRecord"))
            .respond_with(reply(json!({
                "Error": { "Code": "InvalidParameter.DomainRecordExist", "Message": "记录已经存在。" },
                "RequestId": "r"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut provider = TencentProvider::new("AKIDexampleid1234", "examplesecret", "example.com")
            .with_endpoint(server.uri())
            .with_retry_policy(RetryPolicy::new(3, Duration::ZERO));
        provider.initialize().await.unwrap();

        assert!(
            !provider
                .update_record("example.com", "sub", RecordType::A, "203.0.113.7")
                .await
        );
    }

    #[test]
    fn test_factory_and_register() {
        let config = EndpointConfig::new("tencent", "example.com", "sub")
            .with_access_key("AKIDexampleid1234")
            .with_secret_key("examplesecret");

        let provider = TencentFactory.create(&config, RetryPolicy::no_retry()).unwrap();
        assert_eq!(provider.provider_name(), "tencent");
        assert!(!provider.is_initialized());

        let mut registry = ProviderRegistry::new();
        register(&mut registry);
        assert!(registry.has_provider(ProviderKind::Tencent));
    }

    #[test]
    fn test_secret_not_exposed_in_debug() {
        let provider = TencentProvider::new("AKIDexampleid1234", "examplesecret", "example.com");
        let debug_str = format!("{:?}", provider);

        assert!(!debug_str.contains("examplesecret"));
        assert!(debug_str.contains("AKID***1234"));
    }
}
