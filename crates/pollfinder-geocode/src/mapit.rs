//! MapIt postcode gazetteer client.

use std::collections::{BTreeMap, BTreeSet};

use pollfinder_core::{GeocodeResult, GeocodeSource, Point, Settings, normalize};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info};

use crate::GeocodeError;

/// HTTP client for a MapIt instance, shared by every [`MapitGeocoder`].
pub struct MapitClient {
    client: reqwest::Client,
    base_url: String,
    council_types: Vec<String>,
}

#[derive(Deserialize)]
struct MapitPostcode {
    wgs84_lon: Option<f64>,
    wgs84_lat: Option<f64>,
    #[serde(default)]
    areas: BTreeMap<String, MapitArea>,
}

#[derive(Deserialize)]
struct MapitArea {
    #[serde(rename = "type", default)]
    area_type: String,
    #[serde(default)]
    codes: BTreeMap<String, Value>,
}

#[derive(Deserialize)]
struct MapitErrorBody {
    code: Option<Value>,
    error: String,
}

impl MapitClient {
    /// Build a client from the MapIt URL, user agent, council types and
    /// HTTP timeout in `settings`.
    pub fn new(settings: &Settings) -> Result<Self, GeocodeError> {
        let mut builder = reqwest::Client::builder().timeout(settings.http_timeout);
        if let Some(ua) = &settings.mapit_user_agent {
            builder = builder.user_agent(ua.clone());
        }
        Ok(Self {
            client: builder.build()?,
            base_url: settings.mapit_url.trim_end_matches('/').to_string(),
            council_types: settings.council_types.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn call_mapit(&self, postcode: &str) -> Result<MapitPostcode, GeocodeError> {
        let url = format!("{}/postcode/{}", self.base_url, postcode);

        info!(url = %url, "querying mapit");
        let resp = self.client.get(&url).send().await?;
        let status = resp.status();

        if status == StatusCode::FORBIDDEN {
            error!(postcode, "mapit error 403: rate limit exceeded");
            return Err(GeocodeError::RateLimited);
        }

        if status == StatusCode::NOT_FOUND {
            // MapIt answers 404 with an HTML page, so don't try to parse it.
            return Err(GeocodeError::NotFound {
                origin: GeocodeSource::Mapit,
                postcode: postcode.to_string(),
            });
        }

        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<MapitErrorBody>(&body) {
                Ok(err) => GeocodeError::Service {
                    status: err
                        .code
                        .as_ref()
                        .and_then(Value::as_u64)
                        .and_then(|c| u16::try_from(c).ok())
                        .unwrap_or(status.as_u16()),
                    detail: err.error,
                },
                Err(_) => GeocodeError::Service {
                    status: status.as_u16(),
                    detail: "unknown".to_string(),
                },
            });
        }

        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| GeocodeError::InvalidResponse(e.to_string()))
    }
}

/// Geocodes one postcode through MapIt.
///
/// MapIt accepts the normalised postcode as-is.
pub struct MapitGeocoder<'a> {
    client: &'a MapitClient,
    postcode: String,
}

impl<'a> MapitGeocoder<'a> {
    pub fn new(client: &'a MapitClient, postcode: &str) -> Self {
        Self {
            client,
            postcode: normalize(postcode),
        }
    }

    pub fn postcode(&self) -> &str {
        &self.postcode
    }

    /// Point plus every GSS code MapIt reports; the council is the area whose
    /// type is one of the configured council types.
    pub async fn geocode(&self) -> Result<GeocodeResult, GeocodeError> {
        let res = self.client.call_mapit(&self.postcode).await?;

        let mut gss_codes = BTreeSet::new();
        let mut council_gss = None;
        for area in res.areas.values() {
            let Some(gss) = area.codes.get("gss").and_then(Value::as_str) else {
                continue;
            };
            gss_codes.insert(gss.to_string());
            if self.client.council_types.iter().any(|t| *t == area.area_type) {
                council_gss = Some(gss.to_string());
            }
        }

        let (Some(lon), Some(lat)) = (res.wgs84_lon, res.wgs84_lat) else {
            return Err(GeocodeError::NoLocation {
                postcode: self.postcode.clone(),
            });
        };

        Ok(GeocodeResult {
            source: GeocodeSource::Mapit,
            point: Point::new(lon, lat),
            council_gss,
            gss_codes,
        })
    }

    /// MapIt returns codes with every lookup, so this is the full result.
    pub async fn geocode_point_only(&self) -> Result<GeocodeResult, GeocodeError> {
        self.geocode().await
    }
}
