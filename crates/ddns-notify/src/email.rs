//! SMTP email notifier
//!
//! Sends one plain-text message per outcome. Port 465 uses implicit TLS
//! (SMTPS); any other port upgrades with STARTTLS.

use async_trait::async_trait;
use ddns_core::traits::{CycleOutcome, Notifier};
use ddns_core::{Error, Result};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

/// Default SMTPS port
pub const DEFAULT_SMTP_PORT: u16 = 465;

/// Email notification settings
#[derive(Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Whether email notification is enabled
    #[serde(default)]
    pub enabled: bool,

    /// SMTP server host
    #[serde(default)]
    pub host: String,

    /// SMTP server port
    #[serde(default = "default_smtp_port")]
    pub port: u16,

    /// SMTP login
    #[serde(default)]
    pub username: String,

    /// SMTP password
    /// ⚠️ NEVER log this value
    #[serde(default)]
    pub password: String,

    /// Sender address
    #[serde(default)]
    pub from: String,

    /// Recipient address
    #[serde(default)]
    pub to: String,
}

fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: String::new(),
            port: DEFAULT_SMTP_PORT,
            username: String::new(),
            password: String::new(),
            from: String::new(),
            to: String::new(),
        }
    }
}

// Custom Debug implementation that hides the SMTP password
impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("enabled", &self.enabled)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

impl EmailConfig {
    /// Validate the settings; a disabled config is always valid
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let required = [
            ("host", &self.host),
            ("username", &self.username),
            ("password", &self.password),
            ("from", &self.from),
            ("to", &self.to),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(Error::config(format!(
                    "Email notification is enabled but {} is not set",
                    name
                )));
            }
        }

        if self.port == 0 {
            return Err(Error::config("Email port must be > 0"));
        }

        parse_mailbox("from", &self.from)?;
        parse_mailbox("to", &self.to)?;
        Ok(())
    }
}

fn parse_mailbox(field: &str, address: &str) -> Result<Mailbox> {
    address
        .parse::<Mailbox>()
        .map_err(|e| Error::config(format!("Invalid email {} address '{}': {}", field, address, e)))
}

/// Notifier that sends outcome emails over SMTP
pub struct EmailNotifier {
    config: EmailConfig,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl std::fmt::Debug for EmailNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailNotifier")
            .field("config", &self.config)
            .field("active", &self.transport.is_some())
            .finish()
    }
}

impl EmailNotifier {
    /// Create a notifier; no connection is made until the first send
    ///
    /// A disabled config yields a notifier whose `notify` does nothing.
    pub fn new(config: EmailConfig) -> Result<Self> {
        config.validate()?;

        if !config.enabled {
            return Ok(Self {
                config,
                transport: None,
            });
        }

        let builder = if config.port == DEFAULT_SMTP_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .map_err(|e| Error::config(format!("Invalid SMTP host '{}': {}", config.host, e)))?;

        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self {
            config,
            transport: Some(transport),
        })
    }

    /// Whether this notifier will actually send mail
    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    /// Build the message for one outcome
    pub fn build_message(&self, outcome: &CycleOutcome) -> Result<Message> {
        Message::builder()
            .from(parse_mailbox("from", &self.config.from)?)
            .to(parse_mailbox("to", &self.config.to)?)
            .subject(outcome.subject())
            .header(ContentType::TEXT_PLAIN)
            .body(outcome.body())
            .map_err(|e| Error::notify(format!("Failed to build email: {}", e)))
    }

    async fn send(
        &self,
        transport: &AsyncSmtpTransport<Tokio1Executor>,
        outcome: &CycleOutcome,
    ) -> Result<()> {
        let message = self.build_message(outcome)?;
        transport
            .send(message)
            .await
            .map_err(|e| Error::notify(format!("SMTP send failed: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify(&self, outcome: &CycleOutcome) {
        let Some(ref transport) = self.transport else {
            debug!("Email notification disabled, skipping");
            return;
        };

        match self.send(transport, outcome).await {
            Ok(()) => info!("Notification email sent to {}", self.config.to),
            Err(e) => error!("Failed to send notification email: {}", e),
        }
    }
}
