use std::time::Duration;

use agrialert_core::{with_retry, ReqwestErrorExt, RetryConfig, WeatherConfig};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::instrument;

use crate::types::{
    Coordinates, CurrentConditions, HourlyForecast, Place, ProviderAlert, WeatherError,
};

const REQUEST_TIMEOUT_SECS: u64 = 10;
const FORECAST_STEP_HOURS: u32 = 3;
/// m/s to km/h
const MS_TO_KMH: f64 = 3.6;

/// Source of weather data for a location
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current_conditions(&self, at: Coordinates) -> Result<CurrentConditions, WeatherError>;

    /// Forecast steps covering roughly the next `hours` hours
    async fn hourly_forecast(
        &self,
        at: Coordinates,
        hours: u32,
    ) -> Result<Vec<HourlyForecast>, WeatherError>;

    /// Alerts issued by meteorological services for the location
    async fn severe_alerts(&self, at: Coordinates) -> Result<Vec<ProviderAlert>, WeatherError>;
}

/// OpenWeather client (metric units)
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    retry: RetryConfig,
}

impl OpenWeatherProvider {
    pub fn new(api_key: Option<String>, base_url: impl Into<String>) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| WeatherError::Network(e.into_network_error()))?;

        Ok(Self {
            client,
            api_key: api_key.filter(|k| !k.is_empty()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry: RetryConfig::default(),
        })
    }

    pub fn from_config(config: &WeatherConfig) -> Result<Self, WeatherError> {
        Self::new(config.api_key.clone(), config.base_url.clone())
    }

    /// Override the retry policy (tests use `RetryConfig::none()`)
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn api_key(&self) -> Result<&str, WeatherError> {
        self.api_key.as_deref().ok_or(WeatherError::MissingApiKey)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        at: Coordinates,
        extra: &[(&str, String)],
    ) -> Result<T, WeatherError> {
        let api_key = self.api_key()?;
        let url = format!("{}/{}", self.base_url, endpoint);

        let mut query: Vec<(&str, String)> = vec![
            ("lat", at.lat.to_string()),
            ("lon", at.lng.to_string()),
            ("appid", api_key.to_string()),
            ("units", "metric".to_string()),
        ];
        query.extend(extra.iter().cloned());

        tracing::debug!("GET {} for {}", endpoint, at);

        let response = with_retry(&self.retry, endpoint, || {
            self.client.get(&url).query(&query).send()
        })
        .await?;

        self.handle_response(response, at).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: Response,
        at: Coordinates,
    ) -> Result<T, WeatherError> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| WeatherError::Parse(e.to_string()))
        } else if status == StatusCode::UNAUTHORIZED {
            Err(WeatherError::InvalidApiKey)
        } else if status == StatusCode::FORBIDDEN {
            let text = response.text().await.unwrap_or_default();
            Err(WeatherError::Forbidden(text))
        } else if status == StatusCode::NOT_FOUND {
            Err(WeatherError::LocationNotFound(at))
        } else if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            Err(WeatherError::RateLimited(retry_after))
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(WeatherError::Network(agrialert_core::NetworkError::ServerError {
                status: status.as_u16(),
                message: text,
            }))
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    #[instrument(skip(self), level = "info")]
    async fn current_conditions(&self, at: Coordinates) -> Result<CurrentConditions, WeatherError> {
        let raw: RawCurrent = self.get_json("weather", at, &[]).await?;
        Ok(raw.into_conditions())
    }

    #[instrument(skip(self), level = "info")]
    async fn hourly_forecast(
        &self,
        at: Coordinates,
        hours: u32,
    ) -> Result<Vec<HourlyForecast>, WeatherError> {
        let steps = hours.div_ceil(FORECAST_STEP_HOURS).max(1);
        let raw: RawForecast = self
            .get_json("forecast", at, &[("cnt", steps.to_string())])
            .await?;
        Ok(raw.list.into_iter().map(RawForecastStep::into_forecast).collect())
    }

    #[instrument(skip(self), level = "info")]
    async fn severe_alerts(&self, at: Coordinates) -> Result<Vec<ProviderAlert>, WeatherError> {
        let result: Result<RawOneCall, WeatherError> = self
            .get_json(
                "onecall",
                at,
                &[("exclude", "minutely,hourly,daily".to_string())],
            )
            .await;

        match result {
            Ok(raw) => Ok(raw.alerts),
            Err(e @ (WeatherError::InvalidApiKey | WeatherError::Forbidden(_))) => {
                tracing::warn!(
                    "Severe alerts unavailable for {} ({}); the One Call endpoint may require a paid plan",
                    at,
                    e
                );
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}

// OpenWeather wire format

#[derive(Debug, Deserialize)]
struct RawCurrent {
    #[serde(default)]
    weather: Vec<RawDescription>,
    main: RawMain,
    #[serde(default)]
    wind: RawWind,
    #[serde(default)]
    rain: Option<RawRain>,
    dt: i64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    sys: Option<RawSys>,
}

#[derive(Debug, Deserialize)]
struct RawDescription {
    description: String,
    #[serde(default)]
    icon: String,
}

#[derive(Debug, Deserialize)]
struct RawMain {
    temp: f64,
    feels_like: f64,
    #[serde(default)]
    pressure: f64,
    humidity: u8,
}

#[derive(Debug, Default, Deserialize)]
struct RawWind {
    #[serde(default)]
    speed: f64,
    #[serde(default)]
    deg: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawRain {
    #[serde(rename = "1h", default)]
    one_hour: Option<f64>,
    #[serde(rename = "3h", default)]
    three_hours: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawSys {
    #[serde(default)]
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawForecast {
    #[serde(default)]
    list: Vec<RawForecastStep>,
}

#[derive(Debug, Deserialize)]
struct RawForecastStep {
    dt: i64,
    main: RawMain,
    #[serde(default)]
    weather: Vec<RawDescription>,
    #[serde(default)]
    wind: RawWind,
    #[serde(default)]
    rain: Option<RawRain>,
}

#[derive(Debug, Deserialize)]
struct RawOneCall {
    #[serde(default)]
    alerts: Vec<ProviderAlert>,
}

fn timestamp(dt: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(dt, 0).unwrap_or_else(Utc::now)
}

fn first_description(weather: &[RawDescription]) -> (String, String) {
    weather
        .first()
        .map(|w| (w.description.clone(), w.icon.clone()))
        .unwrap_or_default()
}

impl RawCurrent {
    fn into_conditions(self) -> CurrentConditions {
        let (description, icon) = first_description(&self.weather);
        let place = self.name.filter(|n| !n.is_empty()).map(|name| Place {
            name,
            country: self.sys.and_then(|s| s.country),
        });

        CurrentConditions {
            temperature: self.main.temp,
            feels_like: self.main.feels_like,
            humidity: self.main.humidity,
            pressure: self.main.pressure,
            wind_speed: self.wind.speed * MS_TO_KMH,
            wind_direction: self.wind.deg,
            description,
            icon,
            precipitation: self.rain.and_then(|r| r.one_hour).unwrap_or(0.0),
            place,
            observed_at: timestamp(self.dt),
        }
    }
}

impl RawForecastStep {
    fn into_forecast(self) -> HourlyForecast {
        let (description, _) = first_description(&self.weather);

        HourlyForecast {
            time: timestamp(self.dt),
            temperature: self.main.temp,
            feels_like: self.main.feels_like,
            humidity: self.main.humidity,
            wind_speed: self.wind.speed * MS_TO_KMH,
            description,
            precipitation: self.rain.and_then(|r| r.three_hours).unwrap_or(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_conversion() {
        let raw: RawCurrent = serde_json::from_value(serde_json::json!({
            "weather": [{"description": "light rain", "icon": "10d"}],
            "main": {"temp": 14.2, "feels_like": 13.1, "pressure": 1009, "humidity": 81},
            "wind": {"speed": 10.0, "deg": 250},
            "rain": {"1h": 2.5},
            "dt": 1_700_000_000,
            "name": "Nakuru",
            "sys": {"country": "KE"}
        }))
        .unwrap();

        let current = raw.into_conditions();
        assert_eq!(current.wind_speed, 36.0);
        assert_eq!(current.precipitation, 2.5);
        assert_eq!(current.humidity, 81);
        assert_eq!(current.description, "light rain");
        assert_eq!(current.place.unwrap().country.as_deref(), Some("KE"));
        assert_eq!(current.observed_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_missing_rain_is_zero() {
        let raw: RawForecastStep = serde_json::from_value(serde_json::json!({
            "dt": 1_700_000_000,
            "main": {"temp": 3.0, "feels_like": 1.0, "humidity": 90},
            "weather": [],
            "wind": {"speed": 1.0}
        }))
        .unwrap();

        let step = raw.into_forecast();
        assert_eq!(step.precipitation, 0.0);
        assert_eq!(step.description, "");
        assert!((step.wind_speed - 3.6).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let provider = OpenWeatherProvider::new(None, "http://127.0.0.1:9").unwrap();
        let err = provider
            .current_conditions(Coordinates::new(1.0, 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, WeatherError::MissingApiKey));
    }

    #[test]
    fn test_empty_api_key_counts_as_missing() {
        let provider = OpenWeatherProvider::new(Some(String::new()), "http://x/").unwrap();
        assert!(provider.api_key().is_err());
        assert_eq!(provider.base_url, "http://x");
    }
}
