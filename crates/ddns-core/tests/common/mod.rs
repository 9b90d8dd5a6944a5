//! Test doubles and common utilities for engine contract tests
//!
//! Each double keeps its observable state behind an `Arc` so a test can
//! hand the double to the engine (which takes ownership) and still inspect
//! what happened through the shared handle.

#![allow(dead_code)]

use ddns_core::config::EndpointConfig;
use ddns_core::error::{Error, Result};
use ddns_core::traits::{CycleOutcome, DnsProvider, DnsRecord, IpResolver, Notifier, RecordType};
use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// An IpResolver that replays a script of answers, then repeats the last
pub struct ScriptedIpResolver {
    state: Arc<ResolverState>,
}

pub struct ResolverState {
    answers: Mutex<VecDeque<Option<Ipv4Addr>>>,
    last: Mutex<Option<Ipv4Addr>>,
    calls: AtomicUsize,
}

impl ResolverState {
    /// Number of times resolve_public_ip() was called
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ScriptedIpResolver {
    /// Always answer with `ip`
    pub fn fixed(ip: Ipv4Addr) -> (Self, Arc<ResolverState>) {
        Self::scripted(vec![Some(ip)])
    }

    /// Never find an address
    pub fn failing() -> (Self, Arc<ResolverState>) {
        Self::scripted(vec![None])
    }

    /// Answer from `answers` in order; the final answer repeats
    pub fn scripted(answers: Vec<Option<Ipv4Addr>>) -> (Self, Arc<ResolverState>) {
        let state = Arc::new(ResolverState {
            answers: Mutex::new(answers.into()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
        });
        (
            Self {
                state: Arc::clone(&state),
            },
            state,
        )
    }
}

#[async_trait::async_trait]
impl IpResolver for ScriptedIpResolver {
    async fn resolve_public_ip(&self) -> Option<Ipv4Addr> {
        self.state.calls.fetch_add(1, Ordering::SeqCst);

        let mut answers = self.state.answers.lock().unwrap();
        let answer = if answers.len() > 1 {
            answers.pop_front().flatten()
        } else {
            answers.front().copied().flatten()
        };

        if answer.is_some() {
            *self.state.last.lock().unwrap() = answer;
        }
        answer
    }

    fn cached_ip(&self) -> Option<Ipv4Addr> {
        *self.state.last.lock().unwrap()
    }
}

/// An in-memory DnsProvider that tracks calls
pub struct MockDnsProvider {
    state: Arc<ProviderState>,
}

pub struct ProviderState {
    record: Mutex<Option<String>>,
    update_succeeds: AtomicBool,
    lookup_fails: AtomicBool,
    lookup_delay: Mutex<Duration>,
    get_calls: AtomicUsize,
    update_calls: AtomicUsize,
    updates: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ProviderState {
    /// Number of times get_current_record()/find_record() was called
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Number of times update_record() was called
    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    /// Values passed to update_record(), in call order
    pub fn updates(&self) -> Vec<String> {
        self.updates.lock().unwrap().clone()
    }

    /// Current record value held by the fake provider
    pub fn record(&self) -> Option<String> {
        self.record.lock().unwrap().clone()
    }

    /// Highest number of concurrent lookups observed
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn set_update_succeeds(&self, succeeds: bool) {
        self.update_succeeds.store(succeeds, Ordering::SeqCst);
    }

    pub fn set_lookup_fails(&self, fails: bool) {
        self.lookup_fails.store(fails, Ordering::SeqCst);
    }

    pub fn set_lookup_delay(&self, delay: Duration) {
        *self.lookup_delay.lock().unwrap() = delay;
    }
}

impl MockDnsProvider {
    /// A provider whose record currently holds `record`
    pub fn with_record(record: Option<&str>) -> (Self, Arc<ProviderState>) {
        let state = Arc::new(ProviderState {
            record: Mutex::new(record.map(str::to_string)),
            update_succeeds: AtomicBool::new(true),
            lookup_fails: AtomicBool::new(false),
            lookup_delay: Mutex::new(Duration::ZERO),
            get_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
            updates: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        });
        (
            Self {
                state: Arc::clone(&state),
            },
            state,
        )
    }
}

#[async_trait::async_trait]
impl DnsProvider for MockDnsProvider {
    async fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        true
    }

    async fn find_record(
        &self,
        _domain: &str,
        sub_domain: &str,
        record_type: RecordType,
    ) -> Result<Option<DnsRecord>> {
        self.state.get_calls.fetch_add(1, Ordering::SeqCst);

        let now = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.state.lookup_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.state.lookup_fails.load(Ordering::SeqCst) {
            return Err(Error::http("connection refused"));
        }

        Ok(self.state.record().map(|value| DnsRecord {
            id: Some("record-1".to_string()),
            name: sub_domain.to_string(),
            record_type: record_type.as_str().to_string(),
            value,
            ttl: Some(600),
        }))
    }

    async fn update_record(
        &self,
        _domain: &str,
        _sub_domain: &str,
        _record_type: RecordType,
        value: &str,
    ) -> bool {
        self.state.update_calls.fetch_add(1, Ordering::SeqCst);
        self.state.updates.lock().unwrap().push(value.to_string());

        let succeeds = self.state.update_succeeds.load(Ordering::SeqCst);
        if succeeds {
            *self.state.record.lock().unwrap() = Some(value.to_string());
        }
        succeeds
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// A Notifier that records every outcome it receives
pub struct RecordingNotifier {
    outcomes: Arc<Mutex<Vec<CycleOutcome>>>,
}

impl RecordingNotifier {
    pub fn new() -> (Self, Arc<Mutex<Vec<CycleOutcome>>>) {
        let outcomes = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                outcomes: Arc::clone(&outcomes),
            },
            outcomes,
        )
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, outcome: &CycleOutcome) {
        self.outcomes.lock().unwrap().push(outcome.clone());
    }
}

/// Outcome fields in the order the notifier interface lists them
pub fn outcome_tuple(
    outcome: &CycleOutcome,
) -> (bool, String, Option<String>, String, Option<String>) {
    (
        outcome.success,
        outcome.domain.clone(),
        outcome.old_value.clone(),
        outcome.new_value.clone(),
        outcome.error.clone(),
    )
}

/// Helper to create a minimal endpoint for "sub.example.com"
pub fn minimal_endpoint() -> EndpointConfig {
    EndpointConfig::new("cloudflare", "example.com", "sub")
        .with_access_key("test-token")
        .with_update_interval_ms(1_000)
}
