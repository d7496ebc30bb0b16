//! Walking directions from Google, with an optional OpenRouteService fallback.
//!
//! # Algorithm
//!
//! 1. Ask Google Directions for a walking route. Any transport, HTTP or API
//!    failure is logged and treated as "no route".
//! 2. If the OpenRouteService fallback is enabled, ask it once.
//! 3. Return the first route found, or `None`.
//!
//! Unit labels in `walk_time` and `walk_dist` follow the configured locale.

use pollfinder_core::{DirectionsResult, DirectionsSource, Point, Settings};
use serde::Deserialize;
use tracing::{info, warn};

use crate::RemoteError;

const XLS_NS: &str = "http://www.opengis.net/xls";
const GML_NS: &str = "http://www.opengis.net/gml";

/// Localised labels for walk time and distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitLabels {
    pub minute: &'static str,
    pub miles: &'static str,
}

impl UnitLabels {
    pub const EN: UnitLabels = UnitLabels {
        minute: "minute",
        miles: "miles",
    };

    pub const CY: UnitLabels = UnitLabels {
        minute: "munud",
        miles: "milltir",
    };

    /// Labels for a locale code; anything other than Welsh gets English.
    pub fn for_locale(locale: &str) -> Self {
        if locale.eq_ignore_ascii_case("cy") || locale.to_ascii_lowercase().starts_with("cy-") {
            Self::CY
        } else {
            Self::EN
        }
    }
}

pub struct DirectionsProvider {
    client: reqwest::Client,
    google_url: String,
    ors_template: String,
    ors_fallback: bool,
    labels: UnitLabels,
}

// ── Google response ──

#[derive(Deserialize)]
struct GoogleDirections {
    status: String,
    #[serde(default)]
    routes: Vec<GoogleRoute>,
}

#[derive(Deserialize)]
struct GoogleRoute {
    #[serde(default)]
    legs: Vec<GoogleLeg>,
}

#[derive(Deserialize)]
struct GoogleLeg {
    duration: GoogleText,
    distance: GoogleText,
    #[serde(default)]
    steps: Vec<GoogleStep>,
}

#[derive(Deserialize)]
struct GoogleText {
    text: String,
}

#[derive(Deserialize)]
struct GoogleStep {
    start_location: LatLng,
    end_location: LatLng,
}

#[derive(Deserialize, Clone, Copy)]
struct LatLng {
    lat: f64,
    lng: f64,
}

impl From<LatLng> for Point {
    fn from(l: LatLng) -> Self {
        Point::new(l.lng, l.lat)
    }
}

impl DirectionsProvider {
    pub fn new(settings: &Settings) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(settings.http_timeout)
            .build()?;
        Ok(Self {
            client,
            google_url: settings.google_directions_url.clone(),
            ors_template: settings.ors_route_url_template.clone(),
            ors_fallback: settings.ors_fallback,
            labels: UnitLabels::for_locale(&settings.locale),
        })
    }

    pub fn labels(&self) -> UnitLabels {
        self.labels
    }

    /// Walking route from `start` to `end`, or `None` when no provider answers.
    pub async fn get_directions(&self, start: Point, end: Point) -> Option<DirectionsResult> {
        match self.google_route(start, end).await {
            Ok(directions) => return Some(directions),
            Err(e) => warn!(error = %e, "google directions failed"),
        }

        if !self.ors_fallback {
            return None;
        }

        match self.ors_route(start, end).await {
            Ok(directions) => Some(directions),
            Err(e) => {
                warn!(error = %e, "openrouteservice directions failed");
                None
            }
        }
    }

    async fn get_text(&self, url: &str) -> Result<String, RemoteError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RemoteError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.text().await?)
    }

    pub async fn google_route(
        &self,
        start: Point,
        end: Point,
    ) -> Result<DirectionsResult, RemoteError> {
        let url = format!(
            "{}{},{}&destination={},{}",
            self.google_url, start.lat, start.lon, end.lat, end.lon
        );

        info!("requesting google directions");
        let body = self.get_text(&url).await?;
        let directions: GoogleDirections = serde_json::from_str(&body)?;
        if directions.status != "OK" {
            return Err(RemoteError::Api(directions.status));
        }

        let leg = directions
            .routes
            .into_iter()
            .next()
            .and_then(|r| r.legs.into_iter().next())
            .ok_or(RemoteError::MissingField("routes[0].legs[0]"))?;

        let mut route: Vec<Point> = leg.steps.iter().map(|s| s.start_location.into()).collect();
        if let Some(last) = leg.steps.last() {
            route.push(last.end_location.into());
        }

        Ok(DirectionsResult {
            walk_time: Some(leg.duration.text.replace("mins", self.labels.minute)),
            walk_dist: leg.distance.text.replace("mi", self.labels.miles),
            route,
            source: DirectionsSource::Google,
        })
    }

    pub async fn ors_route(
        &self,
        start: Point,
        end: Point,
    ) -> Result<DirectionsResult, RemoteError> {
        let url = self
            .ors_template
            .replace("{start_lon}", &start.lon.to_string())
            .replace("{start_lat}", &start.lat.to_string())
            .replace("{end_lon}", &end.lon.to_string())
            .replace("{end_lat}", &end.lat.to_string());

        info!("requesting openrouteservice directions");
        let body = self.get_text(&url).await?;
        parse_ors_route(&body, self.labels)
    }
}

fn parse_ors_route(body: &str, labels: UnitLabels) -> Result<DirectionsResult, RemoteError> {
    let doc = roxmltree::Document::parse(body)?;

    let route = doc
        .descendants()
        .filter(|n| n.has_tag_name((XLS_NS, "RouteGeometry")))
        .flat_map(|g| g.children().filter(|n| n.has_tag_name((GML_NS, "LineString"))))
        .flat_map(|l| l.children().filter(|n| n.has_tag_name((GML_NS, "pos"))))
        .map(|pos| parse_pos(pos.text().unwrap_or_default()))
        .collect::<Result<Vec<_>, _>>()?;

    let summary = doc
        .descendants()
        .find(|n| n.has_tag_name((XLS_NS, "RouteSummary")))
        .ok_or(RemoteError::MissingField("xls:RouteSummary"))?;

    let distance = summary
        .children()
        .find(|n| n.has_tag_name((XLS_NS, "TotalDistance")))
        .and_then(|n| n.attribute("value"))
        .ok_or(RemoteError::MissingField("xls:TotalDistance/@value"))?;

    let total_time = summary
        .children()
        .find(|n| n.has_tag_name((XLS_NS, "TotalTime")))
        .and_then(|n| n.text())
        .ok_or(RemoteError::MissingField("xls:TotalTime"))?;

    Ok(DirectionsResult {
        walk_time: walk_minutes(total_time.trim()).map(|m| format!("{m} {}", labels.minute)),
        walk_dist: format!("{distance} {}", labels.miles),
        route,
        source: DirectionsSource::Ors,
    })
}

/// `"-3.17 51.48"` (lon lat) to a point.
fn parse_pos(text: &str) -> Result<Point, RemoteError> {
    let mut coords = text.split_whitespace().map(str::parse::<f64>);
    match (coords.next(), coords.next()) {
        (Some(Ok(lon)), Some(Ok(lat))) => Ok(Point::new(lon, lat)),
        _ => Err(RemoteError::Api(format!("malformed gml:pos {text:?}"))),
    }
}

/// Whole minutes from an ISO-8601 `PT<m>M<s>S` duration. Seconds are
/// dropped; any other shape (hours, missing seconds) yields `None`.
fn walk_minutes(total_time: &str) -> Option<&str> {
    let rest = total_time.strip_prefix("PT")?;
    let (minutes, rest) = rest.split_once('M')?;
    let (seconds, _) = rest.split_once('S')?;
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    (digits(minutes) && digits(seconds)).then_some(minutes)
}
