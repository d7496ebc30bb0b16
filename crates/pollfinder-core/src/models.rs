//! Shared record types passed between the stores, the geocoders and the
//! remote enhancement clients.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address_sort::DisplayAddress;

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lon: f64,
    pub lat: f64,
}

impl Point {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// Which geocoding strategy produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeocodeSource {
    /// Local structured-address table (AddressBase + ONSAD codes).
    AddressBase,
    /// MapIt postcode gazetteer.
    Mapit,
}

impl GeocodeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeocodeSource::AddressBase => "addressbase",
            GeocodeSource::Mapit => "mapit",
        }
    }
}

impl fmt::Display for GeocodeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Location and administrative codes for a postcode.
///
/// Point-only lookups leave `council_gss` empty and `gss_codes` empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub source: GeocodeSource,
    pub point: Point,
    pub council_gss: Option<String>,
    pub gss_codes: BTreeSet<String>,
}

impl GeocodeResult {
    pub fn point_only(source: GeocodeSource, point: Point) -> Self {
        Self {
            source,
            point,
            council_gss: None,
            gss_codes: BTreeSet::new(),
        }
    }
}

/// One row of the structured address table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub uprn: String,
    /// Spaced postcode, e.g. `"CF10 5AJ"`.
    pub postcode: String,
    pub location: Point,
}

/// Administrative hierarchy codes for a single UPRN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnsadRecord {
    pub uprn: String,
    /// Local authority district.
    pub lad: String,
    #[serde(default)]
    pub cty: Option<String>,
    #[serde(default)]
    pub ctry: Option<String>,
    #[serde(default)]
    pub rgn: Option<String>,
    #[serde(default)]
    pub eer: Option<String>,
}

impl OnsadRecord {
    /// Every code present on this row, county first.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        [
            self.cty.as_deref(),
            Some(self.lad.as_str()),
            self.ctry.as_deref(),
            self.rgn.as_deref(),
            self.eer.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|code| !code.is_empty())
    }
}

/// An address assigned to a polling station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidentialAddress {
    /// Normalised postcode, e.g. `"CF105AJ"`.
    pub postcode: String,
    pub address: String,
    pub polling_station_id: String,
    pub council_id: String,
    pub slug: String,
}

impl DisplayAddress for ResidentialAddress {
    fn display_address(&self) -> &str {
        &self.address
    }
}

/// A postcode flagged for manual routing, once per local authority it touches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub postcode: String,
    pub lad: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectionsSource {
    Google,
    Ors,
}

impl fmt::Display for DirectionsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DirectionsSource::Google => "google",
            DirectionsSource::Ors => "ors",
        })
    }
}

/// Walking directions from a postcode to a polling station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionsResult {
    pub walk_time: Option<String>,
    pub walk_dist: String,
    pub route: Vec<Point>,
    pub source: DirectionsSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionExplanation {
    pub title: String,
    pub explanation: String,
}

/// Upcoming elections for a postcode, as shown next to the station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionsSummary {
    pub has_election: bool,
    pub explanations: Vec<ElectionExplanation>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address_sort::AddressSorter;

    fn onsad(lad: &str) -> OnsadRecord {
        OnsadRecord {
            uprn: "100".into(),
            lad: lad.into(),
            cty: Some("E10000002".into()),
            ctry: Some("E92000001".into()),
            rgn: None,
            eer: Some(String::new()),
        }
    }

    #[test]
    fn onsad_codes_skip_absent_and_blank() {
        let row = onsad("E07000004");
        let codes: Vec<&str> = row.codes().collect();
        assert_eq!(codes, vec!["E10000002", "E07000004", "E92000001"]);
    }

    #[test]
    fn onsad_json_defaults_optional_codes() {
        let row: OnsadRecord = serde_json::from_str(r#"{"uprn": "1", "lad": "W06000015"}"#).unwrap();
        assert!(row.cty.is_none());
        assert_eq!(row.codes().collect::<Vec<_>>(), vec!["W06000015"]);
    }

    #[test]
    fn geocode_source_serializes_lowercase() {
        let result = GeocodeResult::point_only(GeocodeSource::AddressBase, Point::new(-3.17, 51.48));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["source"], "addressbase");
        assert!(json["council_gss"].is_null());
        assert_eq!(json["gss_codes"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn residential_addresses_sort_by_address_line() {
        let make = |address: &str, slug: &str| ResidentialAddress {
            postcode: "CF105AJ".into(),
            address: address.into(),
            polling_station_id: "1".into(),
            council_id: "W06000015".into(),
            slug: slug.into(),
        };
        let sorted = AddressSorter::new(vec![
            make("10 Museum Place", "ten"),
            make("9 Museum Place", "nine"),
        ])
        .natural_sort();
        assert_eq!(sorted[0].slug, "nine");
        assert_eq!(sorted[1].slug, "ten");
    }
}
