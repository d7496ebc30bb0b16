//! Soft-enhancement HTTP clients: walking directions and upcoming elections.
//!
//! Neither client lets an error escape its public boundary. Directions
//! degrade to `None`; elections fail open (an election is assumed, with no
//! explanations).

mod directions;
mod elections;
mod error;

pub use directions::{DirectionsProvider, UnitLabels};
pub use elections::ElectionsClient;
pub use error::RemoteError;
