//! Geocoding against the local AddressBase and ONSAD tables.

use std::collections::BTreeSet;

use pollfinder_core::{AddressRecord, GeocodeResult, GeocodeSource, Point, spaced};
use pollfinder_store::{AddressBase, centre_from_points};
use tracing::debug;

use crate::GeocodeError;

/// Council and code set resolved from the ONSAD rows of a postcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouncilCodes {
    pub council_gss: String,
    pub gss_codes: BTreeSet<String>,
}

/// Geocodes a postcode from structured address points.
///
/// AddressBase stores postcodes spaced ("AA1 1AA"), so the postcode is
/// reformatted on construction.
pub struct AddressBaseGeocoder<'a, S: AddressBase + ?Sized> {
    store: &'a S,
    postcode: String,
}

impl<'a, S: AddressBase + ?Sized> AddressBaseGeocoder<'a, S> {
    pub fn new(store: &'a S, postcode: &str) -> Self {
        Self {
            store,
            postcode: spaced(postcode),
        }
    }

    /// The postcode as queried, e.g. `"CF10 5AJ"`.
    pub fn postcode(&self) -> &str {
        &self.postcode
    }

    fn addresses(&self) -> Result<Vec<AddressRecord>, GeocodeError> {
        let addresses = self.store.addresses(&self.postcode)?;
        if addresses.is_empty() {
            return Err(self.not_found());
        }
        Ok(addresses)
    }

    fn centre(&self, addresses: &[AddressRecord]) -> Result<Point, GeocodeError> {
        centre_from_points(addresses).ok_or_else(|| self.not_found())
    }

    fn not_found(&self) -> GeocodeError {
        GeocodeError::NotFound {
            origin: GeocodeSource::AddressBase,
            postcode: self.postcode.clone(),
        }
    }

    /// Resolve the local authority and every administrative code for a set of UPRNs.
    pub fn get_codes(&self, uprns: &[String]) -> Result<CouncilCodes, GeocodeError> {
        let records = self.store.onsad_records(uprns)?;

        if records.is_empty() {
            return Err(GeocodeError::CodesNotFound {
                postcode: self.postcode.clone(),
            });
        }

        if records.len() != uprns.len() {
            // Partial coverage is tolerated; the codes we do have still apply.
            debug!(
                postcode = %self.postcode,
                found = records.len(),
                expected = uprns.len(),
                "ONSAD covers only some UPRNs in postcode"
            );
        }

        let council_ids: BTreeSet<&str> = records.iter().map(|r| r.lad.as_str()).collect();
        let gss_codes: BTreeSet<String> = records
            .iter()
            .flat_map(|r| r.codes())
            .map(str::to_string)
            .collect();

        let mut councils = council_ids.into_iter();
        match (councils.next(), councils.next()) {
            (Some(council), None) => Ok(CouncilCodes {
                council_gss: council.to_string(),
                gss_codes,
            }),
            _ => Err(GeocodeError::MultipleCouncils {
                postcode: self.postcode.clone(),
            }),
        }
    }

    /// Centroid plus council and codes.
    pub fn geocode(&self) -> Result<GeocodeResult, GeocodeError> {
        let addresses = self.addresses()?;
        let uprns: Vec<String> = addresses.iter().map(|a| a.uprn.clone()).collect();
        let codes = self.get_codes(&uprns)?;
        let point = self.centre(&addresses)?;

        Ok(GeocodeResult {
            source: GeocodeSource::AddressBase,
            point,
            council_gss: Some(codes.council_gss),
            gss_codes: codes.gss_codes,
        })
    }

    /// Centroid only; ONSAD is never consulted.
    pub fn geocode_point_only(&self) -> Result<GeocodeResult, GeocodeError> {
        let addresses = self.addresses()?;
        let point = self.centre(&addresses)?;
        Ok(GeocodeResult::point_only(GeocodeSource::AddressBase, point))
    }
}
