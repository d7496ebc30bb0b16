//! UK postcode normalisation and territory classification.
//!
//! Two representations matter downstream:
//!
//! - the **normalised** form ("SW1A1AA"): uppercase, every non-alphanumeric
//!   character removed. Used by the routing tables and the gazetteer.
//! - the **spaced** form ("SW1A 1AA"): the normalised form with a single
//!   space before the inward code, as stored in the structured address table.
//!
//! Both are idempotent: feeding either form back in yields the same output.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of the inward code ("1AA") at the end of every full postcode.
const INWARD_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PostcodeError {
    #[error("postcode is empty after normalisation")]
    Empty,
}

/// Uppercase and strip everything that is not an ASCII letter or digit.
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Normalise, then insert a single space before the final three characters.
///
/// Inputs too short to carry an inward code are returned normalised but unspaced.
pub fn spaced(raw: &str) -> String {
    let normalized = normalize(raw);
    if normalized.len() <= INWARD_LEN {
        return normalized;
    }
    let (outward, inward) = normalized.split_at(normalized.len() - INWARD_LEN);
    format!("{outward} {inward}")
}

/// Jurisdiction a postcode belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Territory {
    #[serde(rename = "GB")]
    GreatBritain,
    #[serde(rename = "NI")]
    NorthernIreland,
}

impl Territory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Territory::GreatBritain => "GB",
            Territory::NorthernIreland => "NI",
        }
    }
}

impl fmt::Display for Territory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Northern Irish postcodes all sit in the BT area; everything else is GB.
pub fn territory(postcode: &str) -> Territory {
    if normalize(postcode).starts_with("BT") {
        Territory::NorthernIreland
    } else {
        Territory::GreatBritain
    }
}

/// A postcode as typed by the user, with its normalised form precomputed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Postcode {
    raw: String,
    normalized: String,
}

impl Postcode {
    pub fn parse(raw: &str) -> Result<Self, PostcodeError> {
        let normalized = normalize(raw);
        if normalized.is_empty() {
            return Err(PostcodeError::Empty);
        }
        Ok(Self {
            raw: raw.to_string(),
            normalized,
        })
    }

    /// The input exactly as it was supplied.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Normalised form, e.g. `"CF105AJ"`.
    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    /// Spaced form, e.g. `"CF10 5AJ"`.
    pub fn spaced(&self) -> String {
        spaced(&self.normalized)
    }

    pub fn territory(&self) -> Territory {
        territory(&self.normalized)
    }
}

impl FromStr for Postcode {
    type Err = PostcodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Postcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spaced())
    }
}
