use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{
    codes::WeatherCodeTable,
    openmeteo::{CurrentConditions, HourlyConditions},
};

/// Temperature unit system requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl Units {
    /// Lenient parse: only "imperial" (any case) selects imperial.
    pub fn parse_lenient(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("imperial") {
            Units::Imperial
        } else {
            Units::Metric
        }
    }

    pub fn temp_unit(&self) -> &'static str {
        match self {
            Units::Metric => "°C",
            Units::Imperial => "°F",
        }
    }
}

/// One user request after city extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherQuery {
    pub raw_prompt: String,
    pub extracted_city: String,
    pub units: Units,
}

impl WeatherQuery {
    pub fn new(raw_prompt: impl Into<String>) -> Self {
        let raw_prompt = raw_prompt.into();
        let extracted_city = super::extract::extract_city(&raw_prompt);
        Self {
            raw_prompt,
            extracted_city,
            units: Units::default(),
        }
    }
}

/// Current conditions for a city, built from an upstream `current` block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherReport {
    pub city: String,
    pub temperature: f64,
    pub temp_unit: &'static str,
    pub description: &'static str,
    pub humidity: f64,
    pub rain_mm: f64,
}

impl WeatherReport {
    pub fn from_current(
        city: &str,
        current: &CurrentConditions,
        units: Units,
        codes: &WeatherCodeTable,
    ) -> Self {
        Self {
            city: city.to_string(),
            temperature: current.temperature_2m,
            temp_unit: units.temp_unit(),
            description: codes.describe_reported(current.weather_code),
            humidity: current.relative_humidity_2m,
            rain_mm: current.rain,
        }
    }
}

impl fmt::Display for WeatherReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "The weather in {} is {}{} with {}. Humidity: {}%, Rain: {}mm.",
            self.city,
            self.temperature,
            self.temp_unit,
            self.description,
            self.humidity,
            self.rain_mm
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastEntry {
    /// Local wall-clock time, `HH:MM`.
    pub time: String,
    pub temperature: f64,
    pub precipitation_probability: f64,
    pub description: &'static str,
}

/// Chronological hourly forecast, at most [`HourlyForecast::MAX_HOURS`] entries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyForecast {
    pub city: String,
    pub temp_unit: &'static str,
    pub entries: Vec<ForecastEntry>,
}

impl HourlyForecast {
    pub const MAX_HOURS: usize = 24;
    pub const DEFAULT_HOURS: usize = 6;

    /// Takes the first `min(hours, 24)` steps in source order.
    pub fn from_hourly(
        city: &str,
        hourly: &HourlyConditions,
        hours: usize,
        units: Units,
        codes: &WeatherCodeTable,
    ) -> Self {
        let limit = hours.min(Self::MAX_HOURS).min(hourly.steps());
        let entries = (0..limit)
            .map(|i| ForecastEntry {
                time: local_time(&hourly.time[i]),
                temperature: hourly.temperature_2m[i],
                precipitation_probability: hourly
                    .precipitation_probability
                    .get(i)
                    .copied()
                    .flatten()
                    .unwrap_or(0.0),
                description: codes.describe_reported(hourly.weather_code[i]),
            })
            .collect();

        Self {
            city: city.to_string(),
            temp_unit: units.temp_unit(),
            entries,
        }
    }
}

/// `2024-05-01T13:00` -> `13:00`; anything unparseable is kept verbatim.
fn local_time(iso: &str) -> String {
    NaiveDateTime::parse_from_str(iso, "%Y-%m-%dT%H:%M")
        .map(|dt| dt.format("%H:%M").to_string())
        .unwrap_or_else(|_| iso.to_string())
}

impl fmt::Display for HourlyForecast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Hourly forecast for {} (next {} hours):",
            self.city,
            self.entries.len()
        )?;
        for entry in &self.entries {
            writeln!(
                f,
                "{}: {}{}, {}, {}% chance of precipitation",
                entry.time,
                entry.temperature,
                self.temp_unit,
                entry.description,
                entry.precipitation_probability
            )?;
        }
        Ok(())
    }
}
