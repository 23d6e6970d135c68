//! Static city directory used to resolve coordinates without a geocoder.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoCoordinates {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

pub const LONDON: GeoCoordinates = GeoCoordinates::new(51.5074, -0.1278);
const NEW_YORK: GeoCoordinates = GeoCoordinates::new(40.7128, -74.006);
const TOKYO: GeoCoordinates = GeoCoordinates::new(35.6762, 139.6503);
const PARIS: GeoCoordinates = GeoCoordinates::new(48.8566, 2.3522);
const BERLIN: GeoCoordinates = GeoCoordinates::new(52.52, 13.405);
const SYDNEY: GeoCoordinates = GeoCoordinates::new(-33.8688, 151.2093);
const ROME: GeoCoordinates = GeoCoordinates::new(41.9028, 12.4964);
const BEIJING: GeoCoordinates = GeoCoordinates::new(39.9042, 116.4074);
const MOSCOW: GeoCoordinates = GeoCoordinates::new(55.7558, 37.6173);
const CAIRO: GeoCoordinates = GeoCoordinates::new(30.0444, 31.2357);

/// Lookup from lower-cased city name (including foreign-language aliases)
/// to coordinates.
#[derive(Debug, Clone)]
pub struct CityDirectory {
    cities: HashMap<String, GeoCoordinates>,
}

impl CityDirectory {
    /// Keys are lower-cased on insertion.
    pub fn new<K: AsRef<str>>(entries: impl IntoIterator<Item = (K, GeoCoordinates)>) -> Self {
        let cities = entries
            .into_iter()
            .map(|(name, coords)| (name.as_ref().to_lowercase(), coords))
            .collect();
        Self { cities }
    }

    pub fn standard() -> &'static CityDirectory {
        static DIRECTORY: Lazy<CityDirectory> = Lazy::new(|| {
            CityDirectory::new([
                ("london", LONDON),
                ("new york", NEW_YORK),
                ("tokyo", TOKYO),
                ("paris", PARIS),
                ("berlin", BERLIN),
                ("sydney", SYDNEY),
                ("rome", ROME),
                ("beijing", BEIJING),
                ("moscow", MOSCOW),
                ("cairo", CAIRO),
                // aliases
                ("londres", LONDON),
                ("nueva york", NEW_YORK),
                ("tokio", TOKYO),
                ("rom", ROME),
                ("roma", ROME),
                ("pekin", BEIJING),
                ("moscu", MOSCOW),
                ("moscou", MOSCOW),
                ("el cairo", CAIRO),
                ("le caire", CAIRO),
            ])
        });
        &DIRECTORY
    }

    /// Case-insensitive lookup. `None` is a normal outcome for unknown cities.
    pub fn resolve(&self, city: &str) -> Option<GeoCoordinates> {
        self.cities.get(&city.trim().to_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }
}
