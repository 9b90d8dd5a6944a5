//! Core traits for the DDNS system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`IpResolver`]: Discover the host's public IPv4 address
//! - [`DnsProvider`]: Read and write the A record via a provider API
//! - [`Notifier`]: Deliver the outcome of a reconciliation cycle

pub mod ip_resolver;
pub mod dns_provider;
pub mod notifier;

pub use ip_resolver::IpResolver;
pub use dns_provider::{DnsProvider, DnsProviderFactory, DnsRecord, RecordType, select_record};
pub use notifier::{CycleOutcome, Notifier, UNKNOWN_VALUE};
