// # HTTP IP Resolver
//
// Discovers the host's public IPv4 address by asking external echo
// services, one after another, until one answers with a valid address.
//
// ## Architecture
//
// - Services are tried in a fixed order; the first valid answer wins
// - A failing service (timeout, non-2xx, garbage) is skipped with a warning
// - Nothing is retried: the next service in the list is the fallback
// - The last good address is cached for change logging only

use ddns_core::traits::IpResolver;
use ddns_core::{Error, Result};

use std::net::Ipv4Addr;
use std::sync::Mutex;
use std::time::Duration;

use tracing::{debug, info, warn};

/// Default echo services, in lookup order
pub const DEFAULT_IP_SERVICES: &[&str] = &[
    "http://checkip.amazonaws.com",
    "http://icanhazip.com",
    "http://ifconfig.me/ip",
    "http://ipinfo.io/ip",
];

/// Time allowed to establish a connection to one service
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Time allowed between reads once connected to one service
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Check that `s` is a dotted-quad IPv4 address
///
/// Exactly four segments, each one to three ASCII digits with a value of
/// at most 255. Leading zeros are accepted ("010.0.0.1").
pub fn is_valid_ipv4(s: &str) -> bool {
    parse_ipv4(s).is_some()
}

fn parse_ipv4(s: &str) -> Option<Ipv4Addr> {
    let mut octets = [0u8; 4];
    let mut segments = s.split('.');

    for octet in octets.iter_mut() {
        let segment = segments.next()?;
        if segment.is_empty() || segment.len() > 3 || !segment.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        *octet = segment.parse::<u16>().ok().and_then(|v| u8::try_from(v).ok())?;
    }

    if segments.next().is_some() {
        return None;
    }

    Some(Ipv4Addr::from(octets))
}

/// IP resolver backed by HTTP echo services
pub struct HttpIpResolver {
    /// Service URLs, in lookup order
    services: Vec<String>,

    /// Last address any service returned
    cached: Mutex<Option<Ipv4Addr>>,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpIpResolver {
    /// Create a resolver over [`DEFAULT_IP_SERVICES`]
    pub fn new() -> Result<Self> {
        Self::with_services(DEFAULT_IP_SERVICES.iter().map(|s| s.to_string()).collect())
    }

    /// Create a resolver over a custom service list
    pub fn with_services(services: Vec<String>) -> Result<Self> {
        if services.is_empty() {
            return Err(Error::config("At least one IP echo service is required"));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(READ_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            services,
            cached: Mutex::new(None),
            client,
        })
    }

    /// The configured service list
    pub fn services(&self) -> &[String] {
        &self.services
    }

    /// Query a single service
    async fn query(&self, url: &str) -> Result<Ipv4Addr> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::ip_resolution(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::ip_resolution(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::ip_resolution(format!("Failed to read response: {}", e)))?;

        let first_line = body.lines().next().unwrap_or("").trim();

        parse_ipv4(first_line).ok_or_else(|| {
            Error::ip_resolution(format!("Invalid IPv4 address: '{}'", first_line))
        })
    }

    fn remember(&self, ip: Ipv4Addr) {
        let mut cached = match self.cached.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        match *cached {
            Some(previous) if previous == ip => {}
            Some(previous) => info!("Public IP changed: {} -> {}", previous, ip),
            None => info!("Public IP detected: {}", ip),
        }

        *cached = Some(ip);
    }
}

#[async_trait::async_trait]
impl IpResolver for HttpIpResolver {
    async fn resolve_public_ip(&self) -> Option<Ipv4Addr> {
        for url in &self.services {
            match self.query(url).await {
                Ok(ip) => {
                    debug!("Public IP {} from {}", ip, url);
                    self.remember(ip);
                    return Some(ip);
                }
                Err(e) => {
                    warn!("IP service {} failed: {}", url, e);
                }
            }
        }

        warn!("All {} IP services failed", self.services.len());
        None
    }

    fn cached_ip(&self) -> Option<Ipv4Addr> {
        match self.cached.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
