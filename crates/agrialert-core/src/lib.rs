pub mod config;
pub mod error;
pub mod retry;

pub use config::{
    AlertsConfig, Config, DefaultLocation, ServerConfig, SmsConfig, ValidationResult,
    WeatherConfig,
};
pub use error::{ConfigError, NetworkError, ReqwestErrorExt};
pub use retry::{with_retry, RetryConfig};

use anyhow::Result;

/// Initialize logging.
///
/// `RUST_LOG` takes precedence; otherwise `default_level` is used.
pub fn init(default_level: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    tracing::info!("AgriAlert core initialized");
    Ok(())
}
