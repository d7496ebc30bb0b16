//! DuckDB storage layer for imported address and polling-station data.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use duckdb::{Connection, params_from_iter};
use pollfinder_core::{AddressRecord, BlacklistEntry, OnsadRecord, Point, ResidentialAddress};
use tracing::info;

use crate::{AddressBase, Blacklist, ResidentialAddresses, StoreError};

const TABLES: &[&str] = &["addresses", "onsad", "residential_addresses", "blacklist"];

/// DuckDB store for the four lookup tables.
///
/// Tables are created from CSV exports with explicit column casts, so the
/// query side can rely on fixed types. Supports both in-memory (ephemeral)
/// and persistent (file-backed) modes; use [`open`](Self::open) and
/// [`open_persistent`](Self::open_persistent) respectively.
///
/// The connection sits behind a mutex so one store can be shared across
/// concurrent lookups.
pub struct DuckStore {
    conn: Mutex<Connection>,
}

impl DuckStore {
    /// Open an in-memory DuckDB database.
    pub fn open() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open or create a persistent DuckDB database at the given path.
    ///
    /// Previously imported tables are available immediately; use
    /// [`has_tables`](Self::has_tables) to check whether an import is needed.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Other("duckdb connection lock poisoned".into()))
    }

    /// Check whether all four lookup tables exist.
    pub fn has_tables(&self) -> bool {
        TABLES.iter().all(|t| self.count_table(t).is_ok())
    }

    // ── Import ──

    /// Load `addresses.csv` (`uprn,postcode,lon,lat`).
    pub fn load_addresses(&self, path: &Path) -> Result<usize, StoreError> {
        self.load_csv(
            "addresses",
            path,
            "uprn::VARCHAR AS uprn, postcode::VARCHAR AS postcode, \
             lon::DOUBLE AS lon, lat::DOUBLE AS lat",
        )
    }

    /// Load `onsad.csv` (`uprn,lad,cty,ctry,rgn,eer`).
    pub fn load_onsad(&self, path: &Path) -> Result<usize, StoreError> {
        self.load_csv(
            "onsad",
            path,
            "uprn::VARCHAR AS uprn, lad::VARCHAR AS lad, \
             NULLIF(cty, '') AS cty, NULLIF(ctry, '') AS ctry, \
             NULLIF(rgn, '') AS rgn, NULLIF(eer, '') AS eer",
        )
    }

    /// Load `residential_addresses.csv`
    /// (`postcode,address,polling_station_id,council_id,slug`).
    pub fn load_residential_addresses(&self, path: &Path) -> Result<usize, StoreError> {
        self.load_csv(
            "residential_addresses",
            path,
            "postcode::VARCHAR AS postcode, address::VARCHAR AS address, \
             polling_station_id::VARCHAR AS polling_station_id, \
             council_id::VARCHAR AS council_id, slug::VARCHAR AS slug",
        )
    }

    /// Load `blacklist.csv` (`postcode,lad`).
    pub fn load_blacklist(&self, path: &Path) -> Result<usize, StoreError> {
        self.load_csv(
            "blacklist",
            path,
            "postcode::VARCHAR AS postcode, lad::VARCHAR AS lad",
        )
    }

    /// Load every table from a data directory holding the four CSV files.
    pub fn load_all(&self, data_dir: &Path) -> Result<(), StoreError> {
        self.load_addresses(&data_dir.join("addresses.csv"))?;
        self.load_onsad(&data_dir.join("onsad.csv"))?;
        self.load_residential_addresses(&data_dir.join("residential_addresses.csv"))?;
        self.load_blacklist(&data_dir.join("blacklist.csv"))?;
        Ok(())
    }

    fn load_csv(&self, table: &str, path: &Path, columns: &str) -> Result<usize, StoreError> {
        if !path.exists() {
            return Err(StoreError::FileNotFound(path.to_path_buf()));
        }
        let sql = format!(
            "CREATE OR REPLACE TABLE {table} AS SELECT {columns} \
             FROM read_csv('{}', header = true, all_varchar = true)",
            path.display()
        );
        self.conn()?.execute_batch(&sql)?;
        let count = self.count_table(table)?;
        info!(table, count, "loaded table");
        Ok(count)
    }

    // ── Counts ──

    /// Number of rows in a lookup table.
    pub fn count_table(&self, table: &str) -> Result<usize, StoreError> {
        let sql = format!("SELECT count(*)::BIGINT FROM {table}");
        let count: i64 = self.conn()?.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl AddressBase for DuckStore {
    fn addresses(&self, postcode: &str) -> Result<Vec<AddressRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT uprn, postcode, lon, lat FROM addresses WHERE postcode = ?")?;
        let rows = stmt.query_map([postcode], |row| {
            Ok(AddressRecord {
                uprn: row.get(0)?,
                postcode: row.get(1)?,
                location: Point::new(row.get(2)?, row.get(3)?),
            })
        })?;
        let records = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn onsad_records(&self, uprns: &[String]) -> Result<Vec<OnsadRecord>, StoreError> {
        if uprns.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; uprns.len()].join(", ");
        let sql = format!(
            "SELECT uprn, lad, cty, ctry, rgn, eer FROM onsad WHERE uprn IN ({placeholders})"
        );
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(uprns.iter()), |row| {
            Ok(OnsadRecord {
                uprn: row.get(0)?,
                lad: row.get(1)?,
                cty: row.get(2)?,
                ctry: row.get(3)?,
                rgn: row.get(4)?,
                eer: row.get(5)?,
            })
        })?;
        let records = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

impl ResidentialAddresses for DuckStore {
    fn residential_addresses(
        &self,
        postcode: &str,
    ) -> Result<Vec<ResidentialAddress>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT postcode, address, polling_station_id, council_id, slug \
             FROM residential_addresses WHERE postcode = ?",
        )?;
        let rows = stmt.query_map([postcode], |row| {
            Ok(ResidentialAddress {
                postcode: row.get(0)?,
                address: row.get(1)?,
                polling_station_id: row.get(2)?,
                council_id: row.get(3)?,
                slug: row.get(4)?,
            })
        })?;
        let records = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

impl Blacklist for DuckStore {
    fn blacklist_entries(&self, postcode: &str) -> Result<Vec<BlacklistEntry>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT postcode, lad FROM blacklist WHERE postcode = ?")?;
        let rows = stmt.query_map([postcode], |row| {
            Ok(BlacklistEntry {
                postcode: row.get(0)?,
                lad: row.get(1)?,
            })
        })?;
        let records = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_data_dir(dir: &Path) {
        std::fs::write(
            dir.join("addresses.csv"),
            "uprn,postcode,lon,lat\n\
             10001,CF10 5AJ,-3.18,51.48\n\
             10002,CF10 5AJ,-3.17,51.49\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("onsad.csv"),
            "uprn,lad,cty,ctry,rgn,eer\n\
             10001,W06000015,,W92000004,,W08000001\n\
             10002,W06000015,,W92000004,,W08000001\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("residential_addresses.csv"),
            "postcode,address,polling_station_id,council_id,slug\n\
             CF105AJ,1 Museum Place,A1,W06000015,w06000015-10001\n\
             CF105AJ,2 Museum Place,A1,W06000015,w06000015-10002\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("blacklist.csv"),
            "postcode,lad\nBS305EE,E06000023\nBS305EE,E06000024\n",
        )
        .unwrap();
    }

    fn loaded_store() -> (tempfile::TempDir, DuckStore) {
        let tmp = tempfile::TempDir::new().unwrap();
        write_data_dir(tmp.path());
        let store = DuckStore::open().unwrap();
        store.load_all(tmp.path()).unwrap();
        (tmp, store)
    }

    #[test]
    fn open_in_memory_has_no_tables() {
        let store = DuckStore::open().unwrap();
        assert!(!store.has_tables());
    }

    #[test]
    fn load_missing_file_errors() {
        let store = DuckStore::open().unwrap();
        let result = store.load_addresses(Path::new("/nonexistent/addresses.csv"));
        assert!(matches!(result, Err(StoreError::FileNotFound(_))));
    }

    #[test]
    fn load_all_and_count() {
        let (_tmp, store) = loaded_store();
        assert!(store.has_tables());
        assert_eq!(store.count_table("addresses").unwrap(), 2);
        assert_eq!(store.count_table("blacklist").unwrap(), 2);
    }

    #[test]
    fn addresses_by_spaced_postcode() {
        let (_tmp, store) = loaded_store();
        let rows = store.addresses("CF10 5AJ").unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().any(|r| r.uprn == "10001"));
        assert!(store.addresses("ZZ1 1ZZ").unwrap().is_empty());
    }

    #[test]
    fn onsad_blank_codes_become_none() {
        let (_tmp, store) = loaded_store();
        let rows = store.onsad_records(&["10001".to_string()]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].lad, "W06000015");
        assert!(rows[0].cty.is_none());
        assert_eq!(rows[0].eer.as_deref(), Some("W08000001"));
        assert!(store.onsad_records(&[]).unwrap().is_empty());
    }

    #[test]
    fn residential_and_blacklist_by_normalised_postcode() {
        let (_tmp, store) = loaded_store();
        assert_eq!(store.residential_addresses("CF105AJ").unwrap().len(), 2);
        assert_eq!(store.blacklist_entries("BS305EE").unwrap().len(), 2);
        assert!(store.blacklist_entries("CF105AJ").unwrap().is_empty());
    }

    // ── Persistent storage tests ──

    #[test]
    fn persistent_load_and_reopen() {
        let tmp = tempfile::TempDir::new().unwrap();
        write_data_dir(tmp.path());
        let db_path: PathBuf = tmp.path().join("pollfinder.duckdb");

        let store = DuckStore::open_persistent(&db_path).unwrap();
        assert!(!store.has_tables());
        store.load_all(tmp.path()).unwrap();
        drop(store);

        let store = DuckStore::open_persistent(&db_path).unwrap();
        assert!(store.has_tables());
        assert_eq!(store.residential_addresses("CF105AJ").unwrap().len(), 2);
    }
}
