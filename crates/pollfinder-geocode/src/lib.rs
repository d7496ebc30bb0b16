//! Geocoding chain: resolve a postcode to a point and its administrative codes.
//!
//! Sources are tried in a fixed order: the local AddressBase tables first,
//! then the MapIt gazetteer. See [`GeocodeChain`] for the fallback rules.

mod addressbase;
mod chain;
mod error;
mod mapit;

pub use addressbase::{AddressBaseGeocoder, CouncilCodes};
pub use chain::{DEFAULT_BACKOFF, GeocodeChain, GeocodeMode, Strategy};
pub use error::GeocodeError;
pub use mapit::{MapitClient, MapitGeocoder};
