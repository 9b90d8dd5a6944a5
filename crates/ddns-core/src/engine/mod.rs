//! Core DDNS engine
//!
//! The DdnsEngine is the reconciliation loop. On every tick it:
//! - Resolves the public IP via the IpResolver
//! - Reads the current record value via the DnsProvider
//! - Writes the record when the two differ
//! - Reports the outcome of any write attempt to the Notifier
//!
//! ## Architecture
//!
//! ```text
//!                  ┌──────────────┐
//!      tick ──────▶│ DdnsEngine   │
//!                  └──────────────┘
//!                         │
//!     ┌───────────────────┼───────────────────┐
//!     │                   │                   │
//!     ▼                   ▼                   ▼
//! ┌────────────┐   ┌──────────────┐   ┌─────────────┐
//! │ IpResolver │   │ DnsProvider  │   │  Notifier   │
//! │ (read IP)  │   │ (read/write) │   │  (outcome)  │
//! └────────────┘   └──────────────┘   └─────────────┘
//! ```
//!
//! ## Cycle Flow
//!
//! 1. Resolve public IP. None → failure outcome, cycle ends (Indeterminate)
//! 2. Read current record. Not found is a normal `None`
//! 3. Equal → log, no write, no notification (Unchanged)
//! 4. Different → `update_record`, then notify success or failure
//!
//! Every error is contained in its cycle. Nothing a cycle does can stop
//! the scheduler.

use crate::config::{EndpointConfig, full_domain};
use crate::error::Result;
use crate::traits::{CycleOutcome, DnsProvider, IpResolver, Notifier, RecordType, UNKNOWN_VALUE};
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Operator-facing message when no IP service answered
pub const IP_RESOLUTION_FAILED: &str = "Unable to determine public IP address";

/// Operator-facing message when the current record could not be read
pub const RECORD_LOOKUP_FAILED: &str = "DNS record lookup failed";

/// Operator-facing message when the provider did not confirm the write
pub const UPDATE_FAILED: &str = "DNS API call failed";

/// Where a single reconciliation cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    /// Record already matched the public IP; nothing written or notified
    Unchanged,
    /// Record was written and the provider confirmed it
    Updated,
    /// Record lookup or write failed
    Failed,
    /// Public IP could not be determined
    Indeterminate,
    /// Another cycle was still running; this one did nothing
    Skipped,
}

/// Core DDNS engine
///
/// ## Lifecycle
///
/// 1. Initialize the provider (`DnsProvider::initialize`)
/// 2. Create with [`DdnsEngine::new()`]
/// 3. Start with [`DdnsEngine::run()`] or [`DdnsEngine::run_until()`]
///
/// ## Concurrency
///
/// At most one cycle runs at a time. The scheduler awaits each cycle
/// inline and skips ticks missed while it ran; a direct call to
/// [`DdnsEngine::run_cycle()`] while another cycle holds the guard returns
/// [`CycleState::Skipped`] instead of queueing.
pub struct DdnsEngine {
    /// IP resolver for the public address
    resolver: Box<dyn IpResolver>,

    /// DNS provider for reading and writing the record
    provider: Box<dyn DnsProvider>,

    /// Outcome sink
    notifier: Box<dyn Notifier>,

    /// Registered domain
    domain: String,

    /// Record name under `domain`
    sub_domain: String,

    /// Time between cycle starts
    interval: Duration,

    /// Held for the duration of a cycle
    cycle_guard: Mutex<()>,
}

impl DdnsEngine {
    /// Create a new DDNS engine
    ///
    /// # Parameters
    ///
    /// - `resolver`: IP resolver implementation
    /// - `provider`: initialized DNS provider implementation
    /// - `notifier`: outcome notifier
    /// - `config`: endpoint configuration (domain, subdomain, interval)
    pub fn new(
        resolver: Box<dyn IpResolver>,
        provider: Box<dyn DnsProvider>,
        notifier: Box<dyn Notifier>,
        config: &EndpointConfig,
    ) -> Result<Self> {
        config.validate()?;

        if !provider.is_initialized() {
            warn!(
                "Provider {} is not initialized; every cycle will fail until it is",
                provider.provider_name()
            );
        }

        Ok(Self {
            resolver,
            provider,
            notifier,
            domain: config.domain.clone(),
            sub_domain: config.sub_domain.clone(),
            interval: config.update_interval(),
            cycle_guard: Mutex::new(()),
        })
    }

    /// The fully-qualified record name this engine manages
    pub fn full_domain(&self) -> String {
        full_domain(&self.domain, &self.sub_domain)
    }

    /// Run the engine until Ctrl-C
    pub async fn run(&self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run the engine until `shutdown` completes
    ///
    /// The first cycle starts immediately. Shutdown is only observed
    /// between cycles: a running cycle always completes.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!(
            "Starting reconciliation loop for {} (interval: {:?}, provider: {})",
            self.full_domain(),
            self.interval,
            self.provider.provider_name()
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received, reconciliation loop stopped");
                    break;
                }

                _ = ticker.tick() => {
                    let state = self.run_cycle().await;
                    debug!("Cycle finished: {:?}", state);
                }
            }
        }

        Ok(())
    }

    /// Run one reconciliation cycle
    ///
    /// Returns [`CycleState::Skipped`] without doing anything when another
    /// cycle is in flight.
    pub async fn run_cycle(&self) -> CycleState {
        let Ok(_guard) = self.cycle_guard.try_lock() else {
            warn!("Previous cycle still running, skipping this tick");
            return CycleState::Skipped;
        };

        self.reconcile().await
    }

    async fn reconcile(&self) -> CycleState {
        let fqdn = self.full_domain();

        let Some(ip) = self.resolver.resolve_public_ip().await else {
            error!("{}", IP_RESOLUTION_FAILED);
            self.notifier
                .notify(&CycleOutcome::failure(
                    &fqdn,
                    Some(UNKNOWN_VALUE.to_string()),
                    UNKNOWN_VALUE,
                    IP_RESOLUTION_FAILED,
                ))
                .await;
            return CycleState::Indeterminate;
        };
        let current_ip = ip.to_string();

        let current_record = match self
            .provider
            .get_current_record(&self.domain, &self.sub_domain)
            .await
        {
            Ok(record) => record,
            Err(e) => {
                error!("Failed to read DNS record {}: {}", fqdn, e);
                self.notifier
                    .notify(&CycleOutcome::failure(
                        &fqdn,
                        Some(UNKNOWN_VALUE.to_string()),
                        &current_ip,
                        RECORD_LOOKUP_FAILED,
                    ))
                    .await;
                return CycleState::Failed;
            }
        };

        info!(
            "Checking DNS record {}: public IP {}, record {}",
            fqdn,
            current_ip,
            current_record.as_deref().unwrap_or("<none>")
        );

        if current_record.as_deref() == Some(current_ip.as_str()) {
            info!("IP address unchanged, no update needed");
            return CycleState::Unchanged;
        }

        info!("IP address changed, updating DNS record");
        let confirmed = self
            .provider
            .update_record(&self.domain, &self.sub_domain, RecordType::A, &current_ip)
            .await;

        if confirmed {
            info!(
                "DNS record updated: {} -> {} (was: {})",
                fqdn,
                current_ip,
                current_record.as_deref().unwrap_or("<none>")
            );
            self.notifier
                .notify(&CycleOutcome::success(&fqdn, current_record, &current_ip))
                .await;
            CycleState::Updated
        } else {
            error!(
                "DNS record update failed: {} -> {} (current: {})",
                fqdn,
                current_ip,
                current_record.as_deref().unwrap_or("<none>")
            );
            self.notifier
                .notify(&CycleOutcome::failure(
                    &fqdn,
                    current_record,
                    &current_ip,
                    UPDATE_FAILED,
                ))
                .await;
            CycleState::Failed
        }
    }
}
