use agrialert_core::NetworkError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Geographic coordinates in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Finite and within latitude/longitude bounds
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.lat, self.lng)
    }
}

/// Place the provider resolved the coordinates to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    pub country: Option<String>,
}

/// Current weather conditions.
///
/// Temperatures in °C, wind in km/h, precipitation in mm over the last hour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentConditions {
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: u8,
    pub pressure: f64,
    pub wind_speed: f64,
    pub wind_direction: Option<f64>,
    pub description: String,
    pub icon: String,
    pub precipitation: f64,
    pub place: Option<Place>,
    pub observed_at: DateTime<Utc>,
}

/// One forecast step (the provider uses 3-hour steps).
///
/// Precipitation is mm over the step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyForecast {
    pub time: DateTime<Utc>,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: u8,
    pub wind_speed: f64,
    pub description: String,
    pub precipitation: f64,
}

/// Severe weather alert issued by the provider's meteorological sources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderAlert {
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start: Option<i64>,
    #[serde(default)]
    pub end: Option<i64>,
}

/// Extremes over a forecast window, used for look-ahead thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastExtremes {
    pub max_precipitation: f64,
    pub max_wind_speed: f64,
    /// `f64::INFINITY` for an empty window, so it never trips a low bound
    pub min_temperature: f64,
}

impl ForecastExtremes {
    pub fn from_forecast(forecast: &[HourlyForecast]) -> Self {
        forecast.iter().fold(Self::default(), |acc, step| Self {
            max_precipitation: acc.max_precipitation.max(step.precipitation),
            max_wind_speed: acc.max_wind_speed.max(step.wind_speed),
            min_temperature: acc.min_temperature.min(step.temperature),
        })
    }
}

impl Default for ForecastExtremes {
    fn default() -> Self {
        Self {
            max_precipitation: 0.0,
            max_wind_speed: 0.0,
            min_temperature: f64::INFINITY,
        }
    }
}

/// Weather provider errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Weather API key not configured")]
    MissingApiKey,
    #[error("Invalid API key")]
    InvalidApiKey,
    #[error("Access denied: {0}")]
    Forbidden(String),
    #[error("Location not found: {0}")]
    LocationNotFound(Coordinates),
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),
    #[error("Parse error: {0}")]
    Parse(String),
}

impl WeatherError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::MissingApiKey | Self::InvalidApiKey => {
                "Weather service is not configured correctly."
            }
            Self::Forbidden(_) => "Weather data is not available for this account.",
            Self::LocationNotFound(_) => "No weather data for this location.",
            Self::RateLimited(_) => "Weather service is busy. Please try again later.",
            Self::Network(e) => e.user_message(),
            Self::Parse(_) => "Weather service returned unexpected data.",
        }
    }
}
