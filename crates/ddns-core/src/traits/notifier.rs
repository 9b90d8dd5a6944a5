// # Notifier Trait
//
// Defines how the outcome of a reconciliation cycle leaves the process.
//
// ## Implementations
//
// - Log line only: `ddns_notify::LogNotifier`
// - SMTP email: `ddns_notify::EmailNotifier`

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Placeholder used for values that could not be determined in a cycle
pub const UNKNOWN_VALUE: &str = "unknown";

/// The outcome of one reconciliation cycle that changed, or tried to
/// change, the record
///
/// Produced once per notifying cycle, handed to the notifier, then dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    /// Whether the record now points at `new_value`
    pub success: bool,
    /// Fully-qualified record name, e.g. "home.example.com"
    pub domain: String,
    /// Record value before the cycle (`None` when no record existed)
    pub old_value: Option<String>,
    /// Target value of the cycle
    pub new_value: String,
    /// Short operator-facing error description
    pub error: Option<String>,
    /// When the outcome was produced
    pub at: DateTime<Utc>,
}

impl CycleOutcome {
    /// A successful update from `old_value` to `new_value`
    pub fn success(
        domain: impl Into<String>,
        old_value: Option<String>,
        new_value: impl Into<String>,
    ) -> Self {
        Self {
            success: true,
            domain: domain.into(),
            old_value,
            new_value: new_value.into(),
            error: None,
            at: Utc::now(),
        }
    }

    /// A failed cycle
    pub fn failure(
        domain: impl Into<String>,
        old_value: Option<String>,
        new_value: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            domain: domain.into(),
            old_value,
            new_value: new_value.into(),
            error: Some(error.into()),
            at: Utc::now(),
        }
    }

    /// Subject line for notification channels
    pub fn subject(&self) -> String {
        if self.success {
            format!("DDNS update succeeded - {}", self.domain)
        } else {
            format!("DDNS update failed - {}", self.domain)
        }
    }

    /// Plain-text body for notification channels
    pub fn body(&self) -> String {
        let old_value = self.old_value.as_deref().unwrap_or("none");
        if self.success {
            format!(
                "DDNS record updated.\n\n\
                 Domain: {}\n\
                 Old IP: {}\n\
                 New IP: {}\n\
                 Time:   {}\n\n\
                 This message was sent automatically.\n",
                self.domain,
                old_value,
                self.new_value,
                self.at.to_rfc3339()
            )
        } else {
            format!(
                "DDNS record update failed.\n\n\
                 Domain:     {}\n\
                 Current IP: {}\n\
                 Target IP:  {}\n\
                 Error:      {}\n\
                 Time:       {}\n\n\
                 Check the daemon logs for details.\n\
                 This message was sent automatically.\n",
                self.domain,
                old_value,
                self.new_value,
                self.error.as_deref().unwrap_or("unknown error"),
                self.at.to_rfc3339()
            )
        }
    }
}

/// Trait for outcome notifiers
///
/// Delivery is fire-and-forget from the engine's point of view: `notify`
/// returns nothing, and implementations catch and log their own failures.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one cycle outcome
    async fn notify(&self, outcome: &CycleOutcome);
}
