//! WMO weather interpretation codes as reported by Open-Meteo.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Description used for any code missing from the table.
pub const UNKNOWN_CONDITION: &str = "Unknown weather condition";

/// Read-only mapping from weather code to a human description.
#[derive(Debug, Clone)]
pub struct WeatherCodeTable {
    entries: HashMap<u16, &'static str>,
}

impl WeatherCodeTable {
    pub fn new(entries: impl IntoIterator<Item = (u16, &'static str)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Process-wide table covering the codes Open-Meteo emits.
    pub fn standard() -> &'static WeatherCodeTable {
        static TABLE: Lazy<WeatherCodeTable> = Lazy::new(|| {
            WeatherCodeTable::new([
                (0, "Clear sky"),
                (1, "Mainly clear"),
                (2, "Partly cloudy"),
                (3, "Overcast"),
                (45, "Fog"),
                (48, "Depositing rime fog"),
                (51, "Light drizzle"),
                (53, "Moderate drizzle"),
                (55, "Dense drizzle"),
                (61, "Slight rain"),
                (63, "Moderate rain"),
                (65, "Heavy rain"),
                (71, "Slight snowfall"),
                (73, "Moderate snowfall"),
                (75, "Heavy snowfall"),
                (80, "Slight rain showers"),
                (81, "Moderate rain showers"),
                (82, "Violent rain showers"),
                (95, "Thunderstorm"),
                (96, "Thunderstorm with slight hail"),
                (99, "Thunderstorm with heavy hail"),
            ])
        });
        &TABLE
    }

    /// Never fails: unmapped codes yield [`UNKNOWN_CONDITION`].
    pub fn describe(&self, code: u16) -> &'static str {
        self.entries.get(&code).copied().unwrap_or(UNKNOWN_CONDITION)
    }

    /// Upstream may report no code at all; that reads as unknown too.
    pub fn describe_reported(&self, code: Option<u16>) -> &'static str {
        code.map_or(UNKNOWN_CONDITION, |code| self.describe(code))
    }
}
