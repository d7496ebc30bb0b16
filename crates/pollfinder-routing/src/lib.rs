//! Routing decision: which page a postcode search should land on.
//!
//! # Algorithm
//!
//! The first matching rule wins:
//!
//! 1. The blacklist names more than one local authority for the postcode:
//!    [`RouteType::MultipleCouncils`].
//! 2. No residential addresses: [`RouteType::Postcode`].
//! 3. Every address maps to the same polling station:
//!    [`RouteType::SingleAddress`], carrying the first address's slug.
//! 4. Otherwise: [`RouteType::MultipleAddresses`].
//!
//! Both stores are read once, when the helper is built.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use pollfinder_core::{AddressSorter, ResidentialAddress, normalize};
use pollfinder_store::{Blacklist, ResidentialAddresses, StoreError};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteType {
    MultipleCouncils,
    SingleAddress,
    MultipleAddresses,
    Postcode,
}

impl RouteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteType::MultipleCouncils => "multiple_councils",
            RouteType::SingleAddress => "single_address",
            RouteType::MultipleAddresses => "multiple_addresses",
            RouteType::Postcode => "postcode",
        }
    }
}

impl fmt::Display for RouteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A route type together with the value its page is keyed on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "route_type", rename_all = "snake_case")]
pub enum RoutingOutcome {
    MultipleCouncils { postcode: String },
    SingleAddress { address_slug: String },
    MultipleAddresses { postcode: String },
    Postcode { postcode: String },
}

impl RoutingOutcome {
    pub fn route_type(&self) -> RouteType {
        match self {
            RoutingOutcome::MultipleCouncils { .. } => RouteType::MultipleCouncils,
            RoutingOutcome::SingleAddress { .. } => RouteType::SingleAddress,
            RoutingOutcome::MultipleAddresses { .. } => RouteType::MultipleAddresses,
            RoutingOutcome::Postcode { .. } => RouteType::Postcode,
        }
    }

    /// The view and keyword argument the web layer renders for this outcome.
    pub fn endpoint(&self) -> Endpoint {
        let (view, key, value) = match self {
            RoutingOutcome::MultipleCouncils { postcode } => {
                ("multiple_councils_view", "postcode", postcode)
            }
            RoutingOutcome::SingleAddress { address_slug } => {
                ("address_view", "address_slug", address_slug)
            }
            RoutingOutcome::MultipleAddresses { postcode } => {
                ("address_select_view", "postcode", postcode)
            }
            RoutingOutcome::Postcode { postcode } => ("postcode_view", "postcode", postcode),
        };
        Endpoint {
            view: view.to_string(),
            kwargs: BTreeMap::from([(key.to_string(), value.clone())]),
        }
    }
}

/// Named view plus its keyword arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub view: String,
    pub kwargs: BTreeMap<String, String>,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.view)?;
        for (i, (k, v)) in self.kwargs.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}={v}")?;
        }
        f.write_str(")")
    }
}

/// Routing state for one normalised postcode.
#[derive(Debug, Clone)]
pub struct RoutingHelper {
    postcode: String,
    addresses: Vec<ResidentialAddress>,
    councils: Vec<String>,
}

impl RoutingHelper {
    /// Read the postcode's residential addresses and blacklist rows.
    pub fn new<R, B>(postcode: &str, residential: &R, blacklist: &B) -> Result<Self, StoreError>
    where
        R: ResidentialAddresses + ?Sized,
        B: Blacklist + ?Sized,
    {
        let postcode = normalize(postcode);
        let addresses = residential.residential_addresses(&postcode)?;
        let councils = blacklist
            .blacklist_entries(&postcode)?
            .into_iter()
            .map(|row| row.lad)
            .collect();
        debug!(postcode = %postcode, addresses = addresses.len(), "loaded routing data");
        Ok(Self {
            postcode,
            addresses,
            councils,
        })
    }

    pub fn postcode(&self) -> &str {
        &self.postcode
    }

    pub fn addresses(&self) -> &[ResidentialAddress] {
        &self.addresses
    }

    /// Local authority codes the blacklist lists for this postcode.
    pub fn councils(&self) -> &[String] {
        &self.councils
    }

    pub fn has_addresses(&self) -> bool {
        !self.addresses.is_empty()
    }

    pub fn has_single_address(&self) -> bool {
        self.addresses.len() == 1
    }

    pub fn addresses_have_single_station(&self) -> bool {
        let stations: BTreeSet<&str> = self
            .addresses
            .iter()
            .map(|a| a.polling_station_id.as_str())
            .collect();
        stations.len() == 1
    }

    fn spans_multiple_councils(&self) -> bool {
        let councils: BTreeSet<&str> = self.councils.iter().map(String::as_str).collect();
        councils.len() > 1
    }

    pub fn route_type(&self) -> RouteType {
        if self.spans_multiple_councils() {
            RouteType::MultipleCouncils
        } else if !self.has_addresses() {
            RouteType::Postcode
        } else if self.addresses_have_single_station() {
            RouteType::SingleAddress
        } else {
            RouteType::MultipleAddresses
        }
    }

    pub fn outcome(&self) -> RoutingOutcome {
        let postcode = self.postcode.clone();
        match self.route_type() {
            RouteType::MultipleCouncils => RoutingOutcome::MultipleCouncils { postcode },
            RouteType::Postcode => RoutingOutcome::Postcode { postcode },
            RouteType::MultipleAddresses => RoutingOutcome::MultipleAddresses { postcode },
            RouteType::SingleAddress => match self.addresses.first() {
                Some(first) => RoutingOutcome::SingleAddress {
                    address_slug: first.slug.clone(),
                },
                None => RoutingOutcome::Postcode { postcode },
            },
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        self.outcome().endpoint()
    }

    /// The postcode's addresses in street-first natural order, for the
    /// address picker.
    pub fn sorted_addresses(&self) -> Vec<&ResidentialAddress> {
        AddressSorter::new(self.addresses.iter().collect()).natural_sort()
    }
}

/// Build a [`RoutingHelper`] and return its outcome.
pub fn decide<R, B>(
    postcode: &str,
    residential: &R,
    blacklist: &B,
) -> Result<RoutingOutcome, StoreError>
where
    R: ResidentialAddresses + ?Sized,
    B: Blacklist + ?Sized,
{
    Ok(RoutingHelper::new(postcode, residential, blacklist)?.outcome())
}
