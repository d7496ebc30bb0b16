use pollfinder_core::GeocodeSource;
use pollfinder_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("{origin} has no record for postcode {postcode}")]
    NotFound {
        origin: GeocodeSource,
        postcode: String,
    },

    #[error("found no ONSAD records for the UPRNs in postcode {postcode}")]
    CodesNotFound { postcode: String },

    #[error("postcode {postcode} covers UPRNs in more than one local authority")]
    MultipleCouncils { postcode: String },

    #[error("mapit error 403: rate limit exceeded")]
    RateLimited,

    #[error("mapit error {status}: {detail}")]
    Service { status: u16, detail: String },

    #[error("mapit has no location information for postcode {postcode}")]
    NoLocation { postcode: String },

    #[error("invalid mapit response: {0}")]
    InvalidResponse(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("could not geocode postcode {postcode} from any source")]
    Exhausted { postcode: String },
}

impl GeocodeError {
    /// Whether the chain should move on to the next source.
    ///
    /// Failures that only say one source is missing data or unavailable fall
    /// back. Ambiguity (`MultipleCouncils`) and the gazetteer's verdict on the
    /// postcode itself propagate unchanged.
    pub fn falls_back(&self) -> bool {
        match self {
            GeocodeError::NotFound { origin, .. } => *origin == GeocodeSource::AddressBase,
            GeocodeError::CodesNotFound { .. }
            | GeocodeError::RateLimited
            | GeocodeError::InvalidResponse(_)
            | GeocodeError::Http(_)
            | GeocodeError::Store(_) => true,
            GeocodeError::MultipleCouncils { .. }
            | GeocodeError::Service { .. }
            | GeocodeError::NoLocation { .. }
            | GeocodeError::Exhausted { .. } => false,
        }
    }

    /// The postcode straddles local authorities; callers show a dedicated page.
    pub fn is_multiple_councils(&self) -> bool {
        matches!(self, GeocodeError::MultipleCouncils { .. })
    }
}
