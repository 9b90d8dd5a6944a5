// # Outcome Notifiers
//
// Implementations of `ddns_core::Notifier`.
//
// - `LogNotifier`: one tracing event per outcome
// - `EmailNotifier`: plain-text mail over SMTP (implicit TLS on 465,
//   STARTTLS otherwise)
//
// Notifiers never fail the cycle that produced the outcome: delivery
// errors are logged and dropped.

pub mod email;

pub use email::{EmailConfig, EmailNotifier};

use async_trait::async_trait;
use ddns_core::traits::{CycleOutcome, Notifier};
use tracing::{error, info};

/// Notifier that only writes the outcome to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, outcome: &CycleOutcome) {
        let old_value = outcome.old_value.as_deref().unwrap_or("none");
        if outcome.success {
            info!(
                domain = %outcome.domain,
                old = %old_value,
                new = %outcome.new_value,
                "{}",
                outcome.subject()
            );
        } else {
            error!(
                domain = %outcome.domain,
                current = %old_value,
                target = %outcome.new_value,
                error = outcome.error.as_deref().unwrap_or("unknown error"),
                "{}",
                outcome.subject()
            );
        }
    }
}
