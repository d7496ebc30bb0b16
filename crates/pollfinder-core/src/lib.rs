pub mod address_sort;
pub mod config;
pub mod models;
pub mod postcode;

pub use address_sort::{AddressSorter, DisplayAddress, KeyPart, natural_sort, sort_key};
pub use config::{ExamplePostcode, Settings};
pub use models::{
    AddressRecord, BlacklistEntry, DirectionsResult, DirectionsSource, ElectionExplanation,
    ElectionsSummary, GeocodeResult, GeocodeSource, OnsadRecord, Point, ResidentialAddress,
};
pub use postcode::{Postcode, PostcodeError, Territory, normalize, spaced, territory};
