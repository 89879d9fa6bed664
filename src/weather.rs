//! Weather for the idle screen.
//!
//! The idle screen shows the local time, temperature, and a one-word
//! condition. Provider transport is external to the core; the hub consumes
//! the [`WeatherProvider`] seam and falls back to a static provider when no
//! API key is configured, so the idle screen never goes blank.

use crate::config::WeatherConfig;
use async_trait::async_trait;
use chrono::{Local, Timelike};
use tracing::warn;

/// What the idle screen needs to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherReport {
    /// Temperature in Fahrenheit, rounded.
    pub temp_f: i64,
    /// One-word display condition ("Sunny", "Cloudy", ...).
    pub condition: String,
    /// Formatted local time, e.g. "3:42 PM".
    pub clock: String,
}

/// Weather backend contract. `None` means no report is available; the
/// orchestrator renders the plain idle screen instead.
#[async_trait]
pub trait WeatherProvider: Send {
    async fn current(&self) -> Option<WeatherReport>;
}

/// Formatted local clock for the idle screen.
#[must_use]
pub fn local_clock() -> String {
    Local::now().format("%-I:%M %p").to_string()
}

/// Map provider condition names onto the short display vocabulary.
#[must_use]
pub fn display_condition(condition: &str) -> &str {
    match condition {
        "Clear" => "Sunny",
        "Clouds" => "Cloudy",
        "Rain" => "Rainy",
        "Thunderstorm" => "Stormy",
        "Snow" => "Snowy",
        "Mist" => "Misty",
        "Fog" => "Foggy",
        "Haze" => "Hazy",
        other => other,
    }
}

/// Static fallback: plausible numbers that vary by time of day.
pub struct StaticWeather;

#[async_trait]
impl WeatherProvider for StaticWeather {
    async fn current(&self) -> Option<WeatherReport> {
        let hour = Local::now().hour();
        let (temp_f, condition) = match hour {
            6..=11 => (72, "Sunny"),
            12..=17 => (85, "Sunny"),
            18..=21 => (78, "Cloudy"),
            _ => (65, "Clear"),
        };
        Some(WeatherReport {
            temp_f,
            condition: condition.to_owned(),
            clock: local_clock(),
        })
    }
}

/// OpenWeatherMap current-conditions client.
pub struct OpenWeather {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    latitude: f64,
    longitude: f64,
}

impl OpenWeather {
    /// Build a client from `OPENWEATHER_API_KEY`, or `None` when no key is
    /// configured.
    #[must_use]
    pub fn from_env(config: &WeatherConfig) -> Option<Self> {
        let api_key = std::env::var("OPENWEATHER_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        Some(Self {
            http: reqwest::Client::new(),
            api_key,
            endpoint: "http://api.openweathermap.org/data/2.5/weather".to_owned(),
            latitude: config.latitude,
            longitude: config.longitude,
        })
    }

    /// Point the client at a different endpoint (tests).
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_owned();
        self
    }
}

#[async_trait]
impl WeatherProvider for OpenWeather {
    async fn current(&self) -> Option<WeatherReport> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("lat", self.latitude.to_string()),
                ("lon", self.longitude.to_string()),
                ("appid", self.api_key.clone()),
                ("units", "imperial".to_owned()),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                warn!("weather request failed: {e}");
                return None;
            }
        };

        let body: serde_json::Value = match response.json().await {
            Ok(b) => b,
            Err(e) => {
                warn!("weather response unreadable: {e}");
                return None;
            }
        };

        let temp_f = body.get("main")?.get("temp")?.as_f64()?.round() as i64;
        let condition = body
            .get("weather")?
            .get(0)?
            .get("main")?
            .as_str()
            .map(display_condition)?
            .to_owned();

        Some(WeatherReport {
            temp_f,
            condition,
            clock: local_clock(),
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn condition_mapping() {
        assert_eq!(display_condition("Clear"), "Sunny");
        assert_eq!(display_condition("Clouds"), "Cloudy");
        assert_eq!(display_condition("Thunderstorm"), "Stormy");
        // Unknown conditions pass through untouched.
        assert_eq!(display_condition("Sandstorm"), "Sandstorm");
    }

    #[tokio::test]
    async fn static_weather_always_reports() {
        let report = StaticWeather.current().await.unwrap();
        assert!(report.temp_f > 0);
        assert!(!report.condition.is_empty());
        assert!(!report.clock.is_empty());
    }
}
