//! Storage layer: read-only lookups behind the geocoders and the routing engine.
//!
//! Four tables back a postcode search:
//!
//! - `addresses`: structured address points keyed by spaced postcode
//! - `onsad`: administrative codes keyed by UPRN
//! - `residential_addresses`: addresses mapped to polling stations, keyed by
//!   normalised postcode
//! - `blacklist`: postcodes that straddle local authority boundaries
//!
//! [`MemoryStore`] serves fixtures and tests; [`DuckStore`] (feature `duckdb`)
//! serves imported data.

mod error;
mod memory;

pub use error::StoreError;
pub use memory::MemoryStore;

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::DuckStore;

use pollfinder_core::{AddressRecord, BlacklistEntry, OnsadRecord, Point, ResidentialAddress};

/// Structured address points plus their administrative codes.
pub trait AddressBase: Send + Sync {
    /// Address rows for a spaced postcode (`"CF10 5AJ"`).
    fn addresses(&self, postcode: &str) -> Result<Vec<AddressRecord>, StoreError>;

    /// ONSAD rows for the given UPRNs. UPRNs without a row are skipped.
    fn onsad_records(&self, uprns: &[String]) -> Result<Vec<OnsadRecord>, StoreError>;
}

pub trait ResidentialAddresses: Send + Sync {
    /// Addresses for a normalised postcode (`"CF105AJ"`), in storage order.
    fn residential_addresses(&self, postcode: &str)
    -> Result<Vec<ResidentialAddress>, StoreError>;
}

pub trait Blacklist: Send + Sync {
    /// Blacklist rows for a normalised postcode; empty when not flagged.
    fn blacklist_entries(&self, postcode: &str) -> Result<Vec<BlacklistEntry>, StoreError>;
}

/// Everything a postcode search reads.
pub trait LookupStore: AddressBase + ResidentialAddresses + Blacklist {}

impl<T: AddressBase + ResidentialAddresses + Blacklist + ?Sized> LookupStore for T {}

/// Centroid of a set of address points (arithmetic mean of lon/lat).
///
/// Returns `None` for an empty set.
pub fn centre_from_points(rows: &[AddressRecord]) -> Option<Point> {
    if rows.is_empty() {
        return None;
    }
    let n = rows.len() as f64;
    let (lon, lat) = rows.iter().fold((0.0, 0.0), |(lon, lat), row| {
        (lon + row.location.lon, lat + row.location.lat)
    });
    Some(Point::new(lon / n, lat / n))
}
