// # ddns-core
//
// Core library for the DDNS reconciliation daemon.
//
// ## Architecture Overview
//
// This library provides the provider-agnostic half of dynamic DNS:
// - **IpResolver**: Trait for discovering the public IPv4 address
// - **DnsProvider**: Trait for reading and writing the A record via provider APIs
// - **Notifier**: Trait for reporting cycle outcomes to an operator
// - **DdnsEngine**: The scheduled reconciliation loop (resolve → compare → update → notify)
// - **ProviderRegistry**: Provider selector over the closed set of provider kinds
// - **retry**: Fixed-backoff retry wrapper used around every provider call
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from provider implementations
// 2. **Explicit Composition**: Retry is a visible wrapper at each call site
// 3. **Two-Phase Initialization**: Providers are constructed, then initialized
// 4. **Contained Failures**: Per-cycle errors never reach the scheduler
// 5. **Library-First**: All core functionality can be used as a library

pub mod traits;
pub mod engine;
pub mod registry;
pub mod config;
pub mod error;
pub mod retry;

// Re-export core types for convenience
pub use traits::{CycleOutcome, DnsProvider, DnsRecord, IpResolver, Notifier, RecordType};
pub use engine::{CycleState, DdnsEngine};
pub use registry::{ProviderKind, ProviderRegistry};
pub use config::{DdnsConfig, EndpointConfig, RetryConfig};
pub use error::{Error, Result};
pub use retry::{RetryPolicy, retry};
