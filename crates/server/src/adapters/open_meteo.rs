//! Weather source backed by the Open-Meteo daily forecast API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use krishi_core::adapters::{PrecipUnit, RawWeather, TemperatureUnit};
use krishi_core::{
    AdapterFailure, AdapterResponse, AdapterResult, FetchContext, RawPayload, Region, SourceId,
    WeatherSource,
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::warn;

const SOURCE_CONFIDENCE: f64 = 0.8;
const RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// (name, latitude, longitude) for the cities the interpreter knows.
const CITY_COORDINATES: &[(&str, f64, f64)] = &[
    ("Delhi", 28.6139, 77.2090),
    ("Mumbai", 19.0760, 72.8777),
    ("Pune", 18.5204, 73.8567),
    ("Nashik", 19.9975, 73.7898),
    ("Nagpur", 21.1458, 79.0882),
    ("Bengaluru", 12.9716, 77.5946),
    ("Chennai", 13.0827, 80.2707),
    ("Coimbatore", 11.0168, 76.9558),
    ("Kolkata", 22.5726, 88.3639),
    ("Hyderabad", 17.3850, 78.4867),
    ("Ahmedabad", 23.0225, 72.5714),
    ("Lucknow", 26.8467, 80.9462),
    ("Patna", 25.5941, 85.1376),
    ("Ludhiana", 30.9010, 75.8573),
    ("Amritsar", 31.6340, 74.8723),
    ("Chandigarh", 30.7333, 76.7794),
    ("Karnal", 29.6857, 76.9905),
    ("Jaipur", 26.9124, 75.7873),
    ("Bhopal", 23.2599, 77.4126),
    ("Indore", 22.7196, 75.8577),
];

/// State-level queries fall back to an agricultural district in that state.
const STATE_COORDINATES: &[(&str, f64, f64)] = &[
    ("Punjab", 30.9010, 75.8573),
    ("Haryana", 29.6857, 76.9905),
    ("Uttar Pradesh", 26.8467, 80.9462),
    ("West Bengal", 22.5726, 88.3639),
    ("Bihar", 25.5941, 85.1376),
    ("Gujarat", 23.0225, 72.5714),
    ("Maharashtra", 18.5204, 73.8567),
    ("Karnataka", 12.9716, 77.5946),
    ("Tamil Nadu", 11.0168, 76.9558),
    ("Andhra Pradesh", 16.5062, 80.6480),
    ("Telangana", 17.3850, 78.4867),
    ("Madhya Pradesh", 23.2599, 77.4126),
    ("Rajasthan", 26.9124, 75.7873),
    ("Delhi", 28.6139, 77.2090),
];

pub fn coordinates(region: &Region) -> Option<(f64, f64)> {
    let lookup = |table: &[(&str, f64, f64)], name: &str| {
        table
            .iter()
            .find(|(known, _, _)| known.eq_ignore_ascii_case(name))
            .map(|(_, latitude, longitude)| (*latitude, *longitude))
    };
    region
        .city
        .as_deref()
        .and_then(|city| lookup(CITY_COORDINATES, city))
        .or_else(|| lookup(STATE_COORDINATES, &region.state))
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    daily: DailyForecast,
    #[serde(default)]
    current: Option<CurrentConditions>,
}

#[derive(Debug, Deserialize)]
struct DailyForecast {
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_sum: Vec<Option<f64>>,
    #[serde(default)]
    weather_code: Vec<Option<u8>>,
}

#[derive(Debug, Deserialize)]
struct CurrentConditions {
    relative_humidity_2m: Option<f64>,
}

/// WMO weather interpretation codes, collapsed to farmer-facing words.
fn condition(code: u8) -> &'static str {
    match code {
        0 => "Clear",
        1..=3 => "Partly cloudy",
        45 | 48 => "Fog",
        51..=57 => "Drizzle",
        61..=67 | 80..=82 => "Rain",
        71..=77 | 85 | 86 => "Snow",
        95..=99 => "Thunderstorm",
        _ => "Unknown",
    }
}

fn first<T: Copy>(values: &[Option<T>]) -> Option<T> {
    values.first().copied().flatten()
}

fn to_raw_weather(response: ForecastResponse) -> RawWeather {
    RawWeather {
        temperature: first(&response.daily.temperature_2m_max),
        temperature_unit: TemperatureUnit::Celsius,
        precipitation: first(&response.daily.precipitation_sum),
        precipitation_unit: PrecipUnit::Millimetre,
        condition: first(&response.daily.weather_code).map(|code| condition(code).to_string()),
        humidity_pct: response.current.and_then(|current| current.relative_humidity_2m),
    }
}

pub struct OpenMeteoWeather {
    client: Client,
    base_url: String,
}

impl OpenMeteoWeather {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into().trim_end_matches('/').to_string() }
    }

    async fn request(&self, latitude: f64, longitude: f64, ctx: &FetchContext) -> AdapterResult {
        let date = ctx.date.format("%Y-%m-%d").to_string();
        let response = self
            .client
            .get(format!("{}/forecast", self.base_url))
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("daily", "temperature_2m_max,precipitation_sum,weather_code".to_string()),
                ("current", "relative_humidity_2m".to_string()),
                ("timezone", "Asia/Kolkata".to_string()),
                ("start_date", date.clone()),
                ("end_date", date),
            ])
            .send()
            .await
            .map_err(|error| self.transport_failure(error))?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST {
            return Err(AdapterFailure::invalid_key(
                self.source_id(),
                format!("forecast rejected the location ({status})"),
            ));
        }
        if !status.is_success() {
            return Err(AdapterFailure::unavailable(
                self.source_id(),
                format!("forecast endpoint returned {status}"),
            ));
        }

        let forecast: ForecastResponse = response.json().await.map_err(|error| {
            AdapterFailure::unavailable(self.source_id(), format!("malformed forecast: {error}"))
        })?;

        Ok(AdapterResponse {
            source_id: self.source_id(),
            confidence: SOURCE_CONFIDENCE,
            observed_at: Some(Utc::now()),
            payload: RawPayload::Weather(to_raw_weather(forecast)),
        })
    }

    fn transport_failure(&self, error: reqwest::Error) -> AdapterFailure {
        if error.is_timeout() {
            AdapterFailure::timeout(self.source_id(), error.to_string())
        } else {
            AdapterFailure::unavailable(self.source_id(), error.to_string())
        }
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoWeather {
    fn source_id(&self) -> SourceId {
        SourceId::new("open-meteo")
    }

    async fn fetch(&self, region: &Region, ctx: &FetchContext) -> AdapterResult {
        let Some((latitude, longitude)) = coordinates(region) else {
            return Err(AdapterFailure::invalid_key(
                self.source_id(),
                format!("no coordinates for {}", region.display_name()),
            ));
        };

        let mut attempt = 0;
        loop {
            match self.request(latitude, longitude, ctx).await {
                Err(failure)
                    if failure.kind != krishi_core::AdapterFailureKind::InvalidKey
                        && attempt < ctx.retry_budget
                        && !ctx.is_cancelled() =>
                {
                    attempt += 1;
                    warn!(
                        event_name = "server.weather.retry",
                        source_id = %failure.source_id,
                        attempt,
                        detail = %failure.detail,
                        "weather request failed, retrying"
                    );
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
                result => return result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use krishi_core::Region;

    use super::{condition, coordinates, to_raw_weather, ForecastResponse};

    #[test]
    fn city_coordinates_win_over_state_fallback() {
        assert_eq!(coordinates(&Region::city("Amritsar", "Punjab")), Some((31.6340, 74.8723)));
        assert_eq!(coordinates(&Region::state("Punjab")), Some((30.9010, 75.8573)));
        assert_eq!(coordinates(&Region::state("Atlantis")), None);
    }

    #[test]
    fn forecast_payload_maps_to_raw_weather() {
        let forecast: ForecastResponse = serde_json::from_str(
            r#"{
                "latitude": 25.6, "longitude": 85.1,
                "current": {"time": "2026-07-10T09:00", "relative_humidity_2m": 91},
                "daily": {
                    "time": ["2026-07-10"],
                    "temperature_2m_max": [31.4],
                    "precipitation_sum": [82.5],
                    "weather_code": [65]
                }
            }"#,
        )
        .expect("forecast fixture parses");

        let raw = to_raw_weather(forecast);

        assert_eq!(raw.temperature, Some(31.4));
        assert_eq!(raw.precipitation, Some(82.5));
        assert_eq!(raw.condition.as_deref(), Some("Rain"));
        assert_eq!(raw.humidity_pct, Some(91.0));
    }

    #[test]
    fn missing_daily_values_stay_missing() {
        let forecast: ForecastResponse =
            serde_json::from_str(r#"{"daily": {"temperature_2m_max": [null]}}"#)
                .expect("sparse fixture parses");

        let raw = to_raw_weather(forecast);

        assert_eq!(raw.temperature, None);
        assert_eq!(raw.precipitation, None);
        assert_eq!(raw.condition, None);
        assert_eq!(condition(3), "Partly cloudy");
    }
}
