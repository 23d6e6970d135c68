use std::{fmt::Debug, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use super::{cities::GeoCoordinates, report::Units};
use crate::truncate_body;

pub const DEFAULT_BASE_URL: &str = "https://api.open-meteo.com/v1/forecast";

const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,rain,weather_code";
const HOURLY_FIELDS: &str = "temperature_2m,precipitation_probability,weather_code";

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("weather request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("weather API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to parse weather response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("weather response has no `{0}` block")]
    MissingBlock(&'static str),
}

impl WeatherError {
    /// Missing data is reported to the user differently from transport failures.
    pub fn is_missing_data(&self) -> bool {
        matches!(self, WeatherError::MissingBlock(_))
    }
}

/// Snapshot from the `current` block.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CurrentConditions {
    pub temperature_2m: f64,
    pub relative_humidity_2m: f64,
    pub rain: f64,
    pub weather_code: Option<u16>,
}

/// Aligned arrays from the `hourly` block, indexed by forecast step.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HourlyConditions {
    pub time: Vec<String>,
    pub temperature_2m: Vec<f64>,
    #[serde(default)]
    pub precipitation_probability: Vec<Option<f64>>,
    pub weather_code: Vec<Option<u16>>,
}

impl HourlyConditions {
    /// Number of steps for which every array has a value.
    pub fn steps(&self) -> usize {
        self.time
            .len()
            .min(self.temperature_2m.len())
            .min(self.weather_code.len())
    }
}

#[async_trait]
pub trait WeatherSource: Send + Sync + Debug {
    async fn current(
        &self,
        coords: GeoCoordinates,
        units: Units,
    ) -> Result<CurrentConditions, WeatherError>;

    async fn hourly(
        &self,
        coords: GeoCoordinates,
        units: Units,
    ) -> Result<HourlyConditions, WeatherError>;
}

#[derive(Debug, Deserialize)]
struct OmResponse {
    current: Option<CurrentConditions>,
    hourly: Option<HourlyConditions>,
    /// Set on Open-Meteo's JSON error objects.
    reason: Option<String>,
}

/// Turns a raw reply into a response.
///
/// Error statuses carrying a JSON body decode like any other reply, so the
/// missing block is reported as missing data. Only non-JSON bodies become
/// [`WeatherError::Status`].
fn decode_body(status: StatusCode, body: &str) -> Result<OmResponse, WeatherError> {
    if status.is_success() {
        return Ok(serde_json::from_str(body)?);
    }

    match serde_json::from_str::<OmResponse>(body) {
        Ok(parsed) => {
            warn!(
                status = status.as_u16(),
                reason = parsed.reason.as_deref().unwrap_or("unknown"),
                "Open-Meteo rejected the request"
            );
            Ok(parsed)
        }
        Err(_) => Err(WeatherError::Status {
            status: status.as_u16(),
            body: truncate_body(body),
        }),
    }
}

#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    base_url: String,
    http: Client,
}

impl OpenMeteoClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, WeatherError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into(),
            http,
        })
    }

    async fn fetch(
        &self,
        coords: GeoCoordinates,
        units: Units,
        block: &'static str,
        fields: &'static str,
    ) -> Result<OmResponse, WeatherError> {
        let mut query = vec![
            ("latitude", coords.latitude.to_string()),
            ("longitude", coords.longitude.to_string()),
            (block, fields.to_string()),
        ];
        if units == Units::Imperial {
            query.push(("temperature_unit", "fahrenheit".to_string()));
        }

        debug!(
            block,
            lat = coords.latitude,
            lon = coords.longitude,
            "requesting Open-Meteo"
        );

        let res = self.http.get(&self.base_url).query(&query).send().await?;

        let status = res.status();
        let body = res.text().await?;

        decode_body(status, &body)
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoClient {
    async fn current(
        &self,
        coords: GeoCoordinates,
        units: Units,
    ) -> Result<CurrentConditions, WeatherError> {
        self.fetch(coords, units, "current", CURRENT_FIELDS)
            .await?
            .current
            .ok_or(WeatherError::MissingBlock("current"))
    }

    async fn hourly(
        &self,
        coords: GeoCoordinates,
        units: Units,
    ) -> Result<HourlyConditions, WeatherError> {
        self.fetch(coords, units, "hourly", HOURLY_FIELDS)
            .await?
            .hourly
            .ok_or(WeatherError::MissingBlock("hourly"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_current_block() {
        let json = r#"{
            "latitude": 35.68,
            "current": {
                "time": "2024-05-01T12:00",
                "temperature_2m": 15,
                "relative_humidity_2m": 60,
                "rain": 0,
                "weather_code": 3
            }
        }"#;
        let parsed: OmResponse = serde_json::from_str(json).unwrap();
        let current = parsed.current.expect("current block");
        assert_eq!(current.temperature_2m, 15.0);
        assert_eq!(current.weather_code, Some(3));
        assert!(parsed.hourly.is_none());
    }

    #[test]
    fn missing_block_is_not_a_parse_error() {
        let parsed: OmResponse = serde_json::from_str(r#"{"error": false}"#).unwrap();
        assert!(parsed.current.is_none());
    }

    #[test]
    fn hourly_nulls_are_tolerated() {
        let json = r#"{
            "hourly": {
                "time": ["2024-05-01T00:00", "2024-05-01T01:00"],
                "temperature_2m": [10.5, 10.1],
                "precipitation_probability": [null, 20],
                "weather_code": [0, null]
            }
        }"#;
        let parsed: OmResponse = serde_json::from_str(json).unwrap();
        let hourly = parsed.hourly.unwrap();
        assert_eq!(hourly.steps(), 2);
        assert_eq!(hourly.precipitation_probability, vec![None, Some(20.0)]);
        assert_eq!(hourly.weather_code, vec![Some(0), None]);
    }

    #[test]
    fn null_current_code_is_tolerated() {
        let json = r#"{"current": {
            "temperature_2m": 9.5,
            "relative_humidity_2m": 70,
            "rain": 0.2,
            "weather_code": null
        }}"#;
        let parsed: OmResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.current.unwrap().weather_code, None);
    }

    #[test]
    fn json_error_reply_reads_as_missing_block() {
        let body = r#"{"error":true,"reason":"Parameter 'current' is invalid"}"#;
        let parsed = decode_body(StatusCode::BAD_REQUEST, body).unwrap();
        assert!(parsed.current.is_none());
        assert_eq!(
            parsed.reason.as_deref(),
            Some("Parameter 'current' is invalid")
        );
    }

    #[test]
    fn non_json_error_reply_keeps_status() {
        let err = decode_body(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, WeatherError::Status { status: 502, .. }));
        assert!(!err.is_missing_data());
    }

    #[test]
    fn malformed_success_reply_is_a_parse_error() {
        let err = decode_body(StatusCode::OK, "not json").unwrap_err();
        assert!(matches!(err, WeatherError::Parse(_)));
    }

    #[test]
    fn client_builds_with_timeout() {
        let client = OpenMeteoClient::new(DEFAULT_BASE_URL, Duration::from_secs(5));
        assert!(client.is_ok());
    }
}
