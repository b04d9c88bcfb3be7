//! Threshold evaluation of weather snapshots into farming alert conditions.
//!
//! Thresholds are fixed. Every condition is evaluated independently, so a
//! single snapshot can raise several at once. Evaluation is pure: nothing is
//! remembered between calls.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::types::{CurrentConditions, ForecastExtremes, ProviderAlert};

pub const HEAVY_RAIN_MM: f64 = 20.0;
pub const HIGH_WIND_KMH: f64 = 30.0;
pub const FROST_C: f64 = 2.0;
pub const HEAT_WAVE_C: f64 = 35.0;
pub const DROUGHT_MAX_HUMIDITY_PCT: u8 = 30;
pub const DROUGHT_MIN_TEMPERATURE_C: f64 = 28.0;
pub const DROUGHT_MAX_CURRENT_PRECIP_MM: f64 = 1.0;
pub const DROUGHT_MAX_FORECAST_PRECIP_MM: f64 = 5.0;

const PROVIDER_DEFAULT_EVENT: &str = "Weather Alert";
const PROVIDER_DEFAULT_MESSAGE: &str = "Weather alert issued by meteorological service.";

/// Category of concerning weather
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AlertKind {
    HeavyRain,
    HighWind,
    Frost,
    HeatWave,
    Drought,
    /// Provider-issued alert, carrying the provider's event name
    Provider(String),
}

impl AlertKind {
    /// Label used in notifications
    pub fn label(&self) -> &str {
        match self {
            Self::HeavyRain => "Heavy Rain Alert",
            Self::HighWind => "High Wind Alert",
            Self::Frost => "Frost Alert",
            Self::HeatWave => "Heat Wave Alert",
            Self::Drought => "Drought Alert",
            Self::Provider(event) => event,
        }
    }

    fn guidance(&self) -> &'static str {
        match self {
            Self::HeavyRain => {
                "Heavy rain forecasted. Consider protecting delicate crops and ensuring proper drainage."
            }
            Self::HighWind => {
                "High winds forecasted. Secure loose items, protect young plants, and consider delaying spraying activities."
            }
            Self::Frost => {
                "Frost conditions forecasted. Protect sensitive crops with covers or other frost protection methods."
            }
            Self::HeatWave => {
                "Heat wave conditions forecasted. Ensure adequate irrigation, consider adding shade for sensitive crops, and watch for heat stress."
            }
            Self::Drought => {
                "Drought conditions developing. Consider implementing water conservation measures and prioritize irrigation."
            }
            Self::Provider(_) => PROVIDER_DEFAULT_MESSAGE,
        }
    }
}

/// A detected condition with its guidance text
#[derive(Debug, Clone, PartialEq)]
pub struct AlertCondition {
    pub kind: AlertKind,
    pub message: String,
}

impl AlertCondition {
    fn from_kind(kind: AlertKind) -> Self {
        let message = kind.guidance().to_string();
        Self { kind, message }
    }

    /// Text of the SMS sent to each subscriber
    pub fn notification_body(&self) -> String {
        format_alert_body(self.kind.label(), &self.message)
    }
}

/// `WEATHER ALERT: <type> - <message>`
pub fn format_alert_body(alert_type: &str, message: &str) -> String {
    format!("WEATHER ALERT: {} - {}", alert_type, message)
}

impl From<&ProviderAlert> for AlertCondition {
    fn from(alert: &ProviderAlert) -> Self {
        let event = alert
            .event
            .clone()
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| PROVIDER_DEFAULT_EVENT.to_string());
        let message = alert
            .description
            .clone()
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| PROVIDER_DEFAULT_MESSAGE.to_string());

        Self {
            kind: AlertKind::Provider(event),
            message,
        }
    }
}

impl Serialize for AlertCondition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("AlertCondition", 2)?;
        state.serialize_field("type", self.kind.label())?;
        state.serialize_field("message", &self.message)?;
        state.end()
    }
}

/// Evaluate a snapshot and forecast extremes against the fixed thresholds.
///
/// An empty result is the common case, not an error.
pub fn evaluate(current: &CurrentConditions, forecast: &ForecastExtremes) -> Vec<AlertCondition> {
    let checks = [
        (
            AlertKind::HeavyRain,
            current.precipitation > HEAVY_RAIN_MM || forecast.max_precipitation > HEAVY_RAIN_MM,
        ),
        (
            AlertKind::HighWind,
            current.wind_speed > HIGH_WIND_KMH || forecast.max_wind_speed > HIGH_WIND_KMH,
        ),
        (
            AlertKind::Frost,
            current.temperature < FROST_C || forecast.min_temperature < FROST_C,
        ),
        (AlertKind::HeatWave, current.temperature > HEAT_WAVE_C),
        (
            AlertKind::Drought,
            current.humidity < DROUGHT_MAX_HUMIDITY_PCT
                && current.temperature > DROUGHT_MIN_TEMPERATURE_C
                && current.precipitation < DROUGHT_MAX_CURRENT_PRECIP_MM
                && forecast.max_precipitation < DROUGHT_MAX_FORECAST_PRECIP_MM,
        ),
    ];

    checks
        .into_iter()
        .filter(|(_, fired)| *fired)
        .map(|(kind, _)| AlertCondition::from_kind(kind))
        .collect()
}
