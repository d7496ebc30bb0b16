//! Shared runtime settings for the geocoders and remote clients.
//!
//! Every field has a working default so library users only override what
//! they need; the CLI fills these from flags and environment variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::postcode;

pub const DEFAULT_MAPIT_URL: &str = "https://mapit.mysociety.org";
pub const DEFAULT_EE_BASE_URL: &str = "https://elections.democracyclub.org.uk/";
pub const DEFAULT_GOOGLE_DIRECTIONS_URL: &str =
    "https://maps.googleapis.com/maps/api/directions/json?mode=walking&units=imperial&origin=";
pub const DEFAULT_ORS_ROUTE_URL_TEMPLATE: &str = "https://openls.geog.uni-heidelberg.de/route?start={start_lon},{start_lat}&end={end_lon},{end_lat}&via=&lang=en&distunit=MI&routepref=Pedestrian&weighting=Shortest&avoidAreas=&useTMC=false&noMotorways=false&noTollways=false&noUnpavedroads=false&noSteps=false&noFerries=false&instructions=false";
pub const DEFAULT_EXAMPLE_POSTCODE: &str = "CF10 5AJ";

/// MapIt area types that identify the council running elections for a postcode.
pub const DEFAULT_COUNCIL_TYPES: &[&str] = &["COI", "DIS", "LBO", "LGD", "MTD", "UTA"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub mapit_url: String,
    /// Sent as `User-Agent` to MapIt when set.
    pub mapit_user_agent: Option<String>,
    pub council_types: Vec<String>,

    /// Every Election API root.
    pub ee_base_url: String,
    /// Sent as `User-Agent` to Every Election when set.
    pub custom_user_agent: Option<String>,

    /// Google Directions URL, up to and including `origin=`.
    pub google_directions_url: String,
    /// OpenRouteService URL with `{start_lon}` `{start_lat}` `{end_lon}` `{end_lat}` placeholders.
    pub ors_route_url_template: String,
    /// Try OpenRouteService once when Google fails.
    pub ors_fallback: bool,
    /// Locale for the walk time/distance unit labels ("en" or "cy").
    pub locale: String,

    #[serde(with = "duration_secs")]
    pub http_timeout: Duration,
    #[serde(with = "duration_secs")]
    pub elections_timeout: Duration,
    /// Pause between geocoding strategies; `None` disables it.
    #[serde(with = "optional_duration_secs")]
    pub geocode_backoff: Option<Duration>,

    pub example_postcode: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mapit_url: DEFAULT_MAPIT_URL.to_string(),
            mapit_user_agent: None,
            council_types: DEFAULT_COUNCIL_TYPES.iter().map(|t| t.to_string()).collect(),
            ee_base_url: DEFAULT_EE_BASE_URL.to_string(),
            custom_user_agent: None,
            google_directions_url: DEFAULT_GOOGLE_DIRECTIONS_URL.to_string(),
            ors_route_url_template: DEFAULT_ORS_ROUTE_URL_TEMPLATE.to_string(),
            ors_fallback: false,
            locale: "en".to_string(),
            http_timeout: Duration::from_secs(10),
            elections_timeout: Duration::from_secs(4),
            geocode_backoff: Some(Duration::from_millis(1300)),
            example_postcode: DEFAULT_EXAMPLE_POSTCODE.to_string(),
        }
    }
}

impl Settings {
    pub fn example_postcode(&self) -> ExamplePostcode {
        ExamplePostcode::new(&self.example_postcode)
    }
}

/// The postcode shown as a hint on the search form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamplePostcode {
    postcode: String,
}

impl ExamplePostcode {
    pub fn new(postcode: &str) -> Self {
        Self {
            postcode: postcode.to_string(),
        }
    }

    /// As configured, e.g. `"CF10 5AJ"`.
    pub fn display(&self) -> &str {
        &self.postcode
    }

    /// Path segment for the postcode page, spaces removed.
    pub fn url(&self) -> String {
        format!("/postcode/{}/", self.postcode.replace(' ', ""))
    }

    /// Normalised form for lookups.
    pub fn normalized(&self) -> String {
        postcode::normalize(&self.postcode)
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

mod optional_duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&d.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<f64>::deserialize(deserializer)?
            .map(|secs| Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_conventions() {
        let settings = Settings::default();
        assert_eq!(settings.geocode_backoff, Some(Duration::from_millis(1300)));
        assert_eq!(settings.elections_timeout, Duration::from_secs(4));
        assert!(!settings.ors_fallback);
        assert!(settings.council_types.iter().any(|t| t == "UTA"));
    }

    #[test]
    fn example_postcode_forms() {
        let example = Settings::default().example_postcode();
        assert_eq!(example.display(), "CF10 5AJ");
        assert_eq!(example.url(), "/postcode/CF105AJ/");
        assert_eq!(example.normalized(), "CF105AJ");
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let settings: Settings = serde_json::from_str(
            r#"{"mapit_url": "http://localhost:8000", "geocode_backoff": null, "http_timeout": 2.5}"#,
        )
        .unwrap();
        assert_eq!(settings.mapit_url, "http://localhost:8000");
        assert_eq!(settings.geocode_backoff, None);
        assert_eq!(settings.http_timeout, Duration::from_millis(2500));
        assert_eq!(settings.ee_base_url, DEFAULT_EE_BASE_URL);
    }
}
