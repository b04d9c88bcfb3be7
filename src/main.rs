use agrialert_core::Config;
use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let (config, validation) = Config::load_validated()?;
    agrialert_core::init(&config.server.log_level)?;

    for warning in &validation.warnings {
        tracing::warn!("Config warning: {}", warning);
    }

    tracing::info!("Starting AgriAlert weather alert service");
    agrialert_server::run(config).await
}
