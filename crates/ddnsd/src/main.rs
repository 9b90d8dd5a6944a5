// # ddnsd - DDNS Daemon
//
// Thin integration layer over ddns-core. All reconciliation, retry and
// provider logic lives in the library crates.
//
// The ddnsd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Registering the compiled-in providers and selecting one
// 3. Initializing the provider (credentials, self-test, zone resolution)
// 4. Serving the liveness endpoint
// 5. Running the reconciliation loop until SIGINT/SIGTERM
//
// ## Configuration
//
// ### Provider
// - `DDNS_PROVIDER`: aliyun, tencent or cloudflare (required)
// - `DDNS_ACCESS_KEY`: AccessKeyId, SecretId or API token (required)
// - `DDNS_SECRET_KEY`: AccessKeySecret / SecretKey (aliyun, tencent)
// - `DDNS_ZONE_ID`: zone id (cloudflare, optional)
// - `DDNS_PROXIED`: proxy the record (cloudflare, default false)
//
// ### Record
// - `DDNS_DOMAIN`: registered domain (required)
// - `DDNS_SUB_DOMAIN`: record name, `@` for the apex (required)
// - `DDNS_UPDATE_INTERVAL`: interval in milliseconds (default 300000)
//
// ### Retry
// - `DDNS_RETRY_MAX_ATTEMPTS`: attempts per provider call (default 5)
// - `DDNS_RETRY_BACKOFF_MS`: delay between attempts (default 5000)
//
// ### Notification
// - `DDNS_EMAIL_ENABLED`, `DDNS_EMAIL_HOST`, `DDNS_EMAIL_PORT` (default 465),
//   `DDNS_EMAIL_USERNAME`, `DDNS_EMAIL_PASSWORD`, `DDNS_EMAIL_FROM`,
//   `DDNS_EMAIL_TO`
//
// ### Daemon
// - `DDNS_HEALTH_ADDR`: liveness endpoint address (default 0.0.0.0:8080,
//   empty disables it)
// - `DDNS_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export DDNS_PROVIDER=cloudflare
// export DDNS_ACCESS_KEY=your_token
// export DDNS_DOMAIN=example.com
// export DDNS_SUB_DOMAIN=home
//
// ddnsd
// ```

mod config;
mod health;

use anyhow::Result;
use config::Config;
use ddns_core::{DdnsEngine, DnsProvider, Notifier, ProviderRegistry};
use ddns_ip_http::HttpIpResolver;
use ddns_notify::{EmailNotifier, LogNotifier};
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    let log_level = match config.log_level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration validation error: {}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    log_banner(&config);

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        let engine = match start(&config).await {
            Ok(engine) => engine,
            Err(e) => {
                error!("Startup failed: {:#}", e);
                return DdnsExitCode::ConfigError;
            }
        };

        match run(&engine).await {
            Ok(()) => {
                info!("Shutting down daemon");
                DdnsExitCode::CleanShutdown
            }
            Err(e) => {
                error!("Daemon error: {:#}", e);
                DdnsExitCode::RuntimeError
            }
        }
    });

    code.into()
}

fn log_banner(config: &Config) {
    let endpoint = &config.ddns.endpoint;

    info!("Starting ddnsd daemon");
    info!("Provider: {}", endpoint.provider);
    info!("Record: {}", endpoint.full_domain());
    info!("Update interval: {} ms", endpoint.update_interval_ms);
    info!(
        "Retry: {} attempts, {} ms backoff",
        config.ddns.retry.max_attempts, config.ddns.retry.backoff_ms
    );

    if config.email.enabled {
        info!(
            "Email notification: enabled ({}:{}, {} -> {})",
            config.email.host, config.email.port, config.email.from, config.email.to
        );
    } else {
        info!("Email notification: disabled");
    }
}

/// Registry with every provider compiled into this build
fn build_registry() -> ProviderRegistry {
    #[allow(unused_mut)]
    let mut registry = ProviderRegistry::new();

    #[cfg(feature = "aliyun")]
    ddns_provider_aliyun::register(&mut registry);

    #[cfg(feature = "tencent")]
    ddns_provider_tencent::register(&mut registry);

    #[cfg(feature = "cloudflare")]
    ddns_provider_cloudflare::register(&mut registry);

    registry
}

/// Construct and initialize a provider for this configuration
async fn select_provider(
    registry: &ProviderRegistry,
    config: &Config,
) -> Result<Box<dyn DnsProvider>> {
    let mut provider = registry.select(&config.ddns.endpoint, config.ddns.retry.policy())?;
    provider.initialize().await?;
    info!("Provider {} initialized", provider.provider_name());
    Ok(provider)
}

fn build_notifier(config: &Config) -> Result<Box<dyn Notifier>> {
    if config.email.enabled {
        Ok(Box::new(EmailNotifier::new(config.email.clone())?))
    } else {
        Ok(Box::new(LogNotifier::new()))
    }
}

/// Everything up to the first cycle; any failure here is a startup error
async fn start(config: &Config) -> Result<DdnsEngine> {
    let registry = build_registry();

    for kind in registry.missing_kinds() {
        warn!(
            "Provider {} ({}) is not compiled into this build",
            kind,
            kind.display_name()
        );
    }

    let provider = select_provider(&registry, config).await?;
    let resolver = HttpIpResolver::new()?;
    let notifier = build_notifier(config)?;

    if let Some(addr) = config.health_addr {
        health::spawn(addr).await?;
    } else {
        info!("Health endpoint disabled");
    }

    let engine = DdnsEngine::new(
        Box::new(resolver),
        provider,
        notifier,
        &config.ddns.endpoint,
    )?;

    Ok(engine)
}

/// Run the reconciliation loop until a shutdown signal arrives
#[cfg(unix)]
async fn run(engine: &DdnsEngine) -> Result<()> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    engine
        .run_until(async move {
            let received = tokio::select! {
                _ = sigterm.recv() => "SIGTERM",
                _ = sigint.recv() => "SIGINT",
            };
            info!("Received shutdown signal: {}", received);
        })
        .await?;

    Ok(())
}

/// Run the reconciliation loop until CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn run(engine: &DdnsEngine) -> Result<()> {
    engine.run().await?;
    Ok(())
}
