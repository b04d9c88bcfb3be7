use std::sync::Arc;

use agrialert_alerts::{
    AlertDispatcher, AlertPipeline, AlertScheduler, Clock, LocationCheck, SubscriptionService,
    SubscriptionSettings, SubscriptionStore, SystemClock,
};
use agrialert_core::{Config, ConfigError};
use agrialert_sms::{LoggingTransport, SmsTransport, TwilioClient};
use agrialert_weather::{OpenWeatherProvider, WeatherProvider};

/// Shared handles for request handlers
#[derive(Clone)]
pub struct AppState {
    pub subscriptions: Arc<SubscriptionService>,
    pub scheduler: Arc<AlertScheduler>,
    pub pipeline: Arc<dyn LocationCheck>,
    pub dispatcher: Arc<AlertDispatcher>,
    pub radius: f64,
    /// Interval for jobs scheduled without one, in minutes
    pub default_interval_minutes: u32,
}

impl AppState {
    /// Wire the alert components around the given providers
    pub fn new(
        config: &Config,
        provider: Arc<dyn WeatherProvider>,
        transport: Arc<dyn SmsTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let radius = config.alerts.radius_degrees;
        let store = Arc::new(SubscriptionStore::new());
        let dispatcher = Arc::new(AlertDispatcher::new(store.clone(), transport.clone()));
        let pipeline: Arc<dyn LocationCheck> = Arc::new(
            AlertPipeline::new(provider, dispatcher.clone())
                .with_forecast_hours(config.weather.forecast_hours)
                .with_radius(radius),
        );
        let scheduler = Arc::new(AlertScheduler::with_clock(pipeline.clone(), clock.clone()));
        let subscriptions = Arc::new(SubscriptionService::new(
            store,
            scheduler.clone(),
            transport,
            clock,
            SubscriptionSettings::from_config(&config.alerts),
        ));

        Self {
            subscriptions,
            scheduler,
            pipeline,
            dispatcher,
            radius,
            default_interval_minutes: config.alerts.default_interval_minutes,
        }
    }

    /// Build real providers from configuration.
    ///
    /// Without SMS credentials messages are only logged.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        if !config.weather.is_configured() {
            tracing::warn!("OPENWEATHER_API_KEY not set; alert checks will fail until configured");
        }
        let provider = OpenWeatherProvider::from_config(&config.weather)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let transport: Arc<dyn SmsTransport> = if config.sms.is_configured() {
            let client = TwilioClient::from_config(&config.sms)?;
            if client.supports_verification() {
                tracing::info!("Using Twilio Verify for verification codes");
            }
            Arc::new(client)
        } else {
            tracing::warn!("Twilio credentials not set; SMS messages will only be logged");
            Arc::new(LoggingTransport::new())
        };

        Ok(Self::new(
            config,
            Arc::new(provider),
            transport,
            Arc::new(SystemClock),
        ))
    }
}
