//! In-memory store for fixtures, demos and tests.

use std::io::Read;
use std::path::Path;

use pollfinder_core::{AddressRecord, BlacklistEntry, OnsadRecord, ResidentialAddress};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{AddressBase, Blacklist, ResidentialAddresses, StoreError};

/// Holds every table as a plain vector and filters on exact postcode match.
///
/// Serialises to and from the fixture document
/// `{"addresses": [...], "onsad": [...], "residential_addresses": [...], "blacklist": [...]}`;
/// any table may be omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryStore {
    addresses: Vec<AddressRecord>,
    onsad: Vec<OnsadRecord>,
    residential_addresses: Vec<ResidentialAddress>,
    blacklist: Vec<BlacklistEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a fixture document.
    pub fn from_json<R: Read>(reader: R) -> Result<Self, StoreError> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Load a fixture document from disk.
    pub fn load_json(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Err(StoreError::FileNotFound(path.to_path_buf()));
        }
        let file = std::fs::File::open(path)?;
        let store = Self::from_json(std::io::BufReader::new(file))?;
        info!(
            path = %path.display(),
            addresses = store.addresses.len(),
            onsad = store.onsad.len(),
            residential = store.residential_addresses.len(),
            blacklist = store.blacklist.len(),
            "loaded fixture store"
        );
        Ok(store)
    }

    // ── Builders ──

    pub fn with_address(mut self, record: AddressRecord) -> Self {
        self.addresses.push(record);
        self
    }

    pub fn with_onsad(mut self, record: OnsadRecord) -> Self {
        self.onsad.push(record);
        self
    }

    pub fn with_residential_address(mut self, address: ResidentialAddress) -> Self {
        self.residential_addresses.push(address);
        self
    }

    pub fn with_blacklist_entry(mut self, entry: BlacklistEntry) -> Self {
        self.blacklist.push(entry);
        self
    }
}

impl AddressBase for MemoryStore {
    fn addresses(&self, postcode: &str) -> Result<Vec<AddressRecord>, StoreError> {
        Ok(self
            .addresses
            .iter()
            .filter(|a| a.postcode == postcode)
            .cloned()
            .collect())
    }

    fn onsad_records(&self, uprns: &[String]) -> Result<Vec<OnsadRecord>, StoreError> {
        Ok(self
            .onsad
            .iter()
            .filter(|r| uprns.contains(&r.uprn))
            .cloned()
            .collect())
    }
}

impl ResidentialAddresses for MemoryStore {
    fn residential_addresses(
        &self,
        postcode: &str,
    ) -> Result<Vec<ResidentialAddress>, StoreError> {
        Ok(self
            .residential_addresses
            .iter()
            .filter(|a| a.postcode == postcode)
            .cloned()
            .collect())
    }
}

impl Blacklist for MemoryStore {
    fn blacklist_entries(&self, postcode: &str) -> Result<Vec<BlacklistEntry>, StoreError> {
        Ok(self
            .blacklist
            .iter()
            .filter(|b| b.postcode == postcode)
            .cloned()
            .collect())
    }
}
