// # IP Resolver Trait
//
// Defines the interface for discovering the host's public IPv4 address.
//
// ## Implementations
//
// - HTTP echo services with fallback: `ddns-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::IpResolver;
//
// async fn check(resolver: &dyn IpResolver) {
//     match resolver.resolve_public_ip().await {
//         Some(ip) => println!("public IP: {}", ip),
//         None => println!("indeterminate"),
//     }
// }
// ```

use async_trait::async_trait;
use std::net::Ipv4Addr;

/// Trait for public IP resolver implementations
///
/// A resolver answers one question per reconciliation cycle: what is the
/// host's public IPv4 address right now?
///
/// # Contract
///
/// - Returns `Some(ip)` only for a fully validated dotted-quad address.
/// - Returns `None` when every lookup failed. Callers must treat `None` as
///   "indeterminate", never as "unchanged".
/// - Never returns an error and never panics; per-service failures are
///   logged and skipped inside the implementation.
///
/// # Cache
///
/// Implementations keep the last resolved address for change logging.
/// The cache is informational: it must never be used to skip a provider
/// lookup, and each resolver instance owns its own cache.
#[async_trait]
pub trait IpResolver: Send + Sync {
    /// Resolve the current public IPv4 address
    async fn resolve_public_ip(&self) -> Option<Ipv4Addr>;

    /// The last address this resolver returned, if any
    fn cached_ip(&self) -> Option<Ipv4Addr>;
}
