//! Weather data for AgriAlert
//!
//! Fetches current conditions, a short hourly forecast and provider-issued
//! severe alerts from OpenWeather, and turns them into farming alert
//! conditions.

pub mod conditions;
pub mod provider;
pub mod types;

pub use conditions::{evaluate, AlertCondition, AlertKind};
pub use provider::{OpenWeatherProvider, WeatherProvider};
pub use types::*;
