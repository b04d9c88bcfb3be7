use std::sync::Arc;

use agrialert_weather::{
    evaluate, AlertCondition, Coordinates, ForecastExtremes, WeatherProvider,
};
use async_trait::async_trait;
use serde::Serialize;

use crate::dispatcher::AlertDispatcher;
use crate::error::AlertError;
use crate::geo::DEFAULT_RADIUS_DEGREES;

pub const DEFAULT_FORECAST_HOURS: u32 = 24;

/// Outcome of one evaluate-then-dispatch cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutcome {
    /// Whether any threshold condition fired
    pub alerts_detected: bool,
    /// Notifications sent for threshold conditions
    pub alerts_sent: usize,
    pub alerts: Vec<AlertCondition>,
    /// Notifications sent for provider-issued alerts
    pub api_alerts_processed: usize,
    pub total_alerts_sent: usize,
    pub failed_sends: usize,
}

/// One tick's worth of work for a location
#[async_trait]
pub trait LocationCheck: Send + Sync {
    async fn check_location(&self, at: Coordinates) -> Result<CheckOutcome, AlertError>;
}

/// Fetches weather, evaluates thresholds and dispatches to nearby subscribers
pub struct AlertPipeline {
    provider: Arc<dyn WeatherProvider>,
    dispatcher: Arc<AlertDispatcher>,
    forecast_hours: u32,
    radius: f64,
}

impl AlertPipeline {
    pub fn new(provider: Arc<dyn WeatherProvider>, dispatcher: Arc<AlertDispatcher>) -> Self {
        Self {
            provider,
            dispatcher,
            forecast_hours: DEFAULT_FORECAST_HOURS,
            radius: DEFAULT_RADIUS_DEGREES,
        }
    }

    pub fn with_forecast_hours(mut self, hours: u32) -> Self {
        self.forecast_hours = hours;
        self
    }

    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }
}

#[async_trait]
impl LocationCheck for AlertPipeline {
    #[tracing::instrument(skip(self), fields(location = %at))]
    async fn check_location(&self, at: Coordinates) -> Result<CheckOutcome, AlertError> {
        let (current, forecast, provider_alerts) = tokio::join!(
            self.provider.current_conditions(at),
            self.provider.hourly_forecast(at, self.forecast_hours),
            self.provider.severe_alerts(at),
        );

        let current = current?;
        let forecast = forecast?;
        let provider_alerts = provider_alerts.unwrap_or_else(|e| {
            tracing::warn!("Could not fetch severe weather alerts: {}", e);
            Vec::new()
        });

        let extremes = ForecastExtremes::from_forecast(&forecast);
        let conditions = evaluate(&current, &extremes);

        let threshold_report = self.dispatcher.dispatch(&conditions, at, self.radius).await;

        let provider_conditions: Vec<AlertCondition> =
            provider_alerts.iter().map(AlertCondition::from).collect();
        let provider_report = self
            .dispatcher
            .dispatch(&provider_conditions, at, self.radius)
            .await;

        let outcome = CheckOutcome {
            alerts_detected: !conditions.is_empty(),
            alerts_sent: threshold_report.alerts_sent,
            alerts: conditions,
            api_alerts_processed: provider_report.alerts_sent,
            total_alerts_sent: threshold_report.alerts_sent + provider_report.alerts_sent,
            failed_sends: threshold_report.failed + provider_report.failed,
        };

        tracing::info!(
            alerts_detected = outcome.alerts_detected,
            alerts_sent = outcome.alerts_sent,
            api_alerts_processed = outcome.api_alerts_processed,
            total_alerts_sent = outcome.total_alerts_sent,
            "Alert check complete"
        );

        Ok(outcome)
    }
}
