//! Ordered geocoding fallback.
//!
//! # Algorithm
//!
//! 1. Try each [`Strategy`] in priority order: AddressBase, then MapIt.
//! 2. On success, return the result immediately.
//! 3. On failure, ask [`GeocodeError::falls_back`]: absorbed failures move on
//!    to the next strategy after the backoff; everything else is returned
//!    unchanged.
//! 4. When the last strategy fails with an absorbed error, return
//!    [`GeocodeError::Exhausted`], except for
//!    [`GeocodeError::RateLimited`], which is returned as is so callers
//!    can tell "try again later" apart from "no source knows this postcode".

use std::time::Duration;

use pollfinder_core::{GeocodeResult, GeocodeSource, normalize};
use pollfinder_store::AddressBase;
use tracing::{debug, info};

use crate::{AddressBaseGeocoder, GeocodeError, MapitClient, MapitGeocoder};

/// Pause between two strategies; keeps bursts of failed lookups from
/// tripping the MapIt rate limit.
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(1300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeocodeMode {
    /// Point, council and every administrative code.
    Full,
    /// Point only.
    PointOnly,
}

/// One geocoding source, ready to run against a single postcode.
pub enum Strategy<'a, S: AddressBase + ?Sized> {
    AddressBase(AddressBaseGeocoder<'a, S>),
    Mapit(MapitGeocoder<'a>),
}

impl<S: AddressBase + ?Sized> Strategy<'_, S> {
    pub fn source(&self) -> GeocodeSource {
        match self {
            Strategy::AddressBase(_) => GeocodeSource::AddressBase,
            Strategy::Mapit(_) => GeocodeSource::Mapit,
        }
    }

    pub async fn run(&self, mode: GeocodeMode) -> Result<GeocodeResult, GeocodeError> {
        match (self, mode) {
            (Strategy::AddressBase(g), GeocodeMode::Full) => g.geocode(),
            (Strategy::AddressBase(g), GeocodeMode::PointOnly) => g.geocode_point_only(),
            (Strategy::Mapit(g), GeocodeMode::Full) => g.geocode().await,
            (Strategy::Mapit(g), GeocodeMode::PointOnly) => g.geocode_point_only().await,
        }
    }
}

/// Geocodes postcodes through AddressBase with a MapIt fallback.
pub struct GeocodeChain<'a, S: AddressBase + ?Sized> {
    address_base: &'a S,
    mapit: &'a MapitClient,
    backoff: Option<Duration>,
}

impl<'a, S: AddressBase + ?Sized> GeocodeChain<'a, S> {
    pub fn new(address_base: &'a S, mapit: &'a MapitClient) -> Self {
        Self {
            address_base,
            mapit,
            backoff: Some(DEFAULT_BACKOFF),
        }
    }

    /// Override the pause between strategies; `None` disables it.
    pub fn with_backoff(mut self, backoff: Option<Duration>) -> Self {
        self.backoff = backoff;
        self
    }

    /// The strategies for `postcode`, highest priority first.
    pub fn strategies(&self, postcode: &str) -> Vec<Strategy<'a, S>> {
        vec![
            Strategy::AddressBase(AddressBaseGeocoder::new(self.address_base, postcode)),
            Strategy::Mapit(MapitGeocoder::new(self.mapit, postcode)),
        ]
    }

    pub async fn geocode(&self, postcode: &str) -> Result<GeocodeResult, GeocodeError> {
        self.run(postcode, GeocodeMode::Full).await
    }

    pub async fn geocode_point_only(&self, postcode: &str) -> Result<GeocodeResult, GeocodeError> {
        self.run(postcode, GeocodeMode::PointOnly).await
    }

    pub async fn run(
        &self,
        postcode: &str,
        mode: GeocodeMode,
    ) -> Result<GeocodeResult, GeocodeError> {
        let strategies = self.strategies(postcode);
        let last = strategies.len().saturating_sub(1);

        for (i, strategy) in strategies.iter().enumerate() {
            match strategy.run(mode).await {
                Ok(result) => {
                    info!(
                        postcode,
                        source = %result.source,
                        codes = result.gss_codes.len(),
                        "geocoded postcode"
                    );
                    return Ok(result);
                }
                Err(e @ GeocodeError::RateLimited) if i == last => return Err(e),
                Err(e) if e.falls_back() => {
                    debug!(
                        postcode,
                        source = %strategy.source(),
                        error = %e,
                        "geocoder failed, falling back"
                    );
                    if i < last
                        && let Some(delay) = self.backoff
                    {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(GeocodeError::Exhausted {
            postcode: normalize(postcode),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    use pollfinder_core::{AddressRecord, OnsadRecord, Point, Settings};
    use pollfinder_store::MemoryStore;
    use serde_json::{Value, json};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn mapit_body() -> Value {
        json!({
            "wgs84_lon": -3.1766,
            "wgs84_lat": 51.4816,
            "areas": {
                "2": {"type": "UTA", "codes": {"gss": "W06000015"}},
                "5": {"type": "WMC", "codes": {"gss": "W07000050"}}
            }
        })
    }

    fn mapit_client(server: &MockServer) -> MapitClient {
        let settings = Settings {
            mapit_url: server.uri(),
            ..Settings::default()
        };
        MapitClient::new(&settings).unwrap()
    }

    async fn mount_mapit(server: &MockServer, response: ResponseTemplate, times: u64) {
        Mock::given(method("GET"))
            .and(path("/postcode/CF105AJ"))
            .respond_with(response)
            .expect(times)
            .mount(server)
            .await;
    }

    fn address(uprn: &str, lon: f64, lat: f64) -> AddressRecord {
        AddressRecord {
            uprn: uprn.into(),
            postcode: "CF10 5AJ".into(),
            location: Point::new(lon, lat),
        }
    }

    fn onsad(uprn: &str, lad: &str) -> OnsadRecord {
        OnsadRecord {
            uprn: uprn.into(),
            lad: lad.into(),
            cty: None,
            ctry: Some("W92000004".into()),
            rgn: None,
            eer: None,
        }
    }

    #[tokio::test]
    async fn addressbase_hit_never_calls_mapit() {
        let server = MockServer::start().await;
        mount_mapit(&server, ResponseTemplate::new(200), 0).await;
        let client = mapit_client(&server);
        let store = MemoryStore::new()
            .with_address(address("1", -3.0, 51.0))
            .with_onsad(onsad("1", "W06000015"));

        let chain = GeocodeChain::new(&store, &client).with_backoff(None);
        let result = chain.geocode("cf10 5aj").await.unwrap();
        assert_eq!(result.source, GeocodeSource::AddressBase);
        assert_eq!(result.council_gss.as_deref(), Some("W06000015"));
        assert!(result.gss_codes.contains("W92000004"));
    }

    #[tokio::test]
    async fn no_addressbase_rows_consults_mapit_once() {
        let server = MockServer::start().await;
        mount_mapit(
            &server,
            ResponseTemplate::new(200).set_body_json(mapit_body()),
            1,
        )
        .await;
        let client = mapit_client(&server);
        let store = MemoryStore::new();

        let chain = GeocodeChain::new(&store, &client).with_backoff(None);
        let result = chain.geocode("CF10 5AJ").await.unwrap();
        assert_eq!(result.source, GeocodeSource::Mapit);
        assert_eq!(result.council_gss.as_deref(), Some("W06000015"));
    }

    #[tokio::test]
    async fn multiple_councils_propagates_without_mapit() {
        let server = MockServer::start().await;
        mount_mapit(&server, ResponseTemplate::new(200), 0).await;
        let client = mapit_client(&server);
        let store = MemoryStore::new()
            .with_address(address("1", -3.0, 51.0))
            .with_address(address("2", -3.1, 51.1))
            .with_onsad(onsad("1", "W06000015"))
            .with_onsad(onsad("2", "W06000022"));

        let chain = GeocodeChain::new(&store, &client).with_backoff(None);
        let err = chain.geocode("CF105AJ").await.unwrap_err();
        assert!(err.is_multiple_councils());
    }

    #[tokio::test]
    async fn missing_codes_fall_back_in_full_mode_only() {
        let server = MockServer::start().await;
        mount_mapit(
            &server,
            ResponseTemplate::new(200).set_body_json(mapit_body()),
            1,
        )
        .await;
        let client = mapit_client(&server);
        let store = MemoryStore::new().with_address(address("1", -3.0, 51.0));

        let chain = GeocodeChain::new(&store, &client).with_backoff(None);
        let full = chain.geocode("CF105AJ").await.unwrap();
        assert_eq!(full.source, GeocodeSource::Mapit);

        let point = chain.geocode_point_only("CF105AJ").await.unwrap();
        assert_eq!(point.source, GeocodeSource::AddressBase);
        assert_eq!(point.point, Point::new(-3.0, 51.0));
        assert!(point.council_gss.is_none());
    }

    #[tokio::test]
    async fn mapit_not_found_propagates() {
        let server = MockServer::start().await;
        mount_mapit(
            &server,
            ResponseTemplate::new(404).set_body_string("<html></html>"),
            1,
        )
        .await;
        let client = mapit_client(&server);
        let store = MemoryStore::new();

        let chain = GeocodeChain::new(&store, &client).with_backoff(None);
        let err = chain.geocode("CF105AJ").await.unwrap_err();
        assert!(matches!(
            err,
            GeocodeError::NotFound {
                origin: GeocodeSource::Mapit,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn rate_limit_on_last_source_is_surfaced() {
        let server = MockServer::start().await;
        mount_mapit(&server, ResponseTemplate::new(403), 2).await;
        let client = mapit_client(&server);
        let store = MemoryStore::new();

        let chain = GeocodeChain::new(&store, &client).with_backoff(None);
        let err = chain.geocode("cf10 5aj").await.unwrap_err();
        assert!(matches!(err, GeocodeError::RateLimited), "got {err:?}");
        let err = chain.geocode_point_only("cf10 5aj").await.unwrap_err();
        assert!(matches!(err, GeocodeError::RateLimited), "got {err:?}");
    }

    #[tokio::test]
    async fn absorbed_failure_on_last_source_is_exhausted() {
        let server = MockServer::start().await;
        mount_mapit(
            &server,
            ResponseTemplate::new(200).set_body_string("not json"),
            1,
        )
        .await;
        let client = mapit_client(&server);
        let store = MemoryStore::new();

        let chain = GeocodeChain::new(&store, &client).with_backoff(None);
        let err = chain.geocode("cf10 5aj").await.unwrap_err();
        match err {
            GeocodeError::Exhausted { postcode } => assert_eq!(postcode, "CF105AJ"),
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn point_only_without_addressbase_rows_consults_mapit_once() {
        let server = MockServer::start().await;
        mount_mapit(
            &server,
            ResponseTemplate::new(200).set_body_json(mapit_body()),
            1,
        )
        .await;
        let client = mapit_client(&server);
        let store = MemoryStore::new();

        let chain = GeocodeChain::new(&store, &client).with_backoff(None);
        let result = chain.geocode_point_only("CF10 5AJ").await.unwrap();
        assert_eq!(result.source, GeocodeSource::Mapit);
        assert_eq!(result.point, Point::new(-3.1766, 51.4816));
    }

    #[tokio::test]
    async fn service_error_propagates() {
        let server = MockServer::start().await;
        mount_mapit(
            &server,
            ResponseTemplate::new(400).set_body_json(json!({"code": 400, "error": "bad postcode"})),
            1,
        )
        .await;
        let client = mapit_client(&server);
        let store = MemoryStore::new();

        let chain = GeocodeChain::new(&store, &client).with_backoff(None);
        let err = chain.geocode("CF105AJ").await.unwrap_err();
        assert_eq!(err.to_string(), "mapit error 400: bad postcode");
    }

    #[tokio::test]
    async fn backoff_waits_between_strategies() {
        let server = MockServer::start().await;
        mount_mapit(
            &server,
            ResponseTemplate::new(200).set_body_json(mapit_body()),
            1,
        )
        .await;
        let client = mapit_client(&server);
        let store = MemoryStore::new();

        let delay = Duration::from_millis(50);
        let chain = GeocodeChain::new(&store, &client).with_backoff(Some(delay));
        let started = Instant::now();
        chain.geocode("CF105AJ").await.unwrap();
        assert!(started.elapsed() >= delay);
    }

    #[test]
    fn strategies_in_priority_order() {
        let settings = Settings::default();
        let client = MapitClient::new(&settings).unwrap();
        let store = MemoryStore::new();
        let chain = GeocodeChain::new(&store, &client);
        let sources: Vec<GeocodeSource> = chain
            .strategies("CF105AJ")
            .iter()
            .map(|s| s.source())
            .collect();
        assert_eq!(sources, vec![GeocodeSource::AddressBase, GeocodeSource::Mapit]);
    }
}
