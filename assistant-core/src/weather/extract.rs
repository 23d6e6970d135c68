//! Best-effort city extraction from free-form English or French prompts.

use once_cell::sync::Lazy;
use regex::Regex;

/// City used whenever a prompt names none.
pub const DEFAULT_CITY: &str = "London";

static CITY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:à|in|for|weather in|temps à|temps a)\s+([A-Za-zÀ-ÖØ-öø-ÿ\s]+)(?:\?|$|\s)")
        .expect("city pattern must compile")
});

/// Returns the city named after a connector word ("in", "for", "à", ...),
/// or [`DEFAULT_CITY`] when nothing usable is found.
pub fn extract_city(prompt: &str) -> String {
    CITY_PATTERN
        .captures(prompt)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|city| !city.is_empty())
        .unwrap_or(DEFAULT_CITY)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn french_prompt_captures_city() {
        assert_eq!(extract_city("Quel temps fait-il à Paris ?"), "Paris");
        assert_eq!(extract_city("Quel temps fait-il à Londres ?"), "Londres");
    }

    #[test]
    fn english_prompt_captures_city() {
        assert_eq!(extract_city("What's the weather in Tokyo?"), "Tokyo");
        assert_eq!(extract_city("Give me a forecast for Berlin"), "Berlin");
    }

    #[test]
    fn connector_inside_word_is_ignored() {
        assert_eq!(extract_city("Is it raining in Rome?"), "Rome");
    }

    #[test]
    fn multi_word_city_is_kept() {
        assert_eq!(extract_city("weather in New York?"), "New York");
    }

    #[test]
    fn accented_letters_are_part_of_the_name() {
        assert_eq!(extract_city("Il fait beau à Québec ?"), "Québec");
    }

    #[test]
    fn no_connector_defaults_to_london() {
        assert_eq!(extract_city("How hot is it today?"), DEFAULT_CITY);
        assert_eq!(extract_city(""), DEFAULT_CITY);
        assert_eq!(extract_city("Tokyo"), DEFAULT_CITY);
    }

    #[test]
    fn blank_capture_defaults_to_london() {
        assert_eq!(extract_city("weather in   ?"), DEFAULT_CITY);
    }
}
