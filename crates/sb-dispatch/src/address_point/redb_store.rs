//! redb-backed address point storage.
//!
//! A single table maps the address string to the JSON-serialized
//! [`AddressPoint`]. redb serializes write transactions, so the read-then-insert
//! inside one write transaction is the uniqueness check on the address key.

use std::{path::Path, sync::Arc};

use chrono::Utc;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use super::{AddressPoint, AddressPointStore, InsertOutcome, StoreResult};
use crate::geocoder::Geocode;

/// key = address, value = JSON-serialized AddressPoint
const ADDRESS_POINTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("address_points");

#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create the database at the given path.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::init(Database::create(path)?)
    }

    /// Open a database that lives only as long as the returned store.
    pub fn open_in_memory() -> StoreResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StoreResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ADDRESS_POINTS_TABLE)?;
        }
        write_txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }
}

impl AddressPointStore for RedbStore {
    fn get(&self, address: &str) -> StoreResult<Option<AddressPoint>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ADDRESS_POINTS_TABLE)?;

        match table.get(address)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    fn insert_pending(&self, point: AddressPoint) -> StoreResult<InsertOutcome> {
        let write_txn = self.db.begin_write()?;
        let outcome = {
            let mut table = write_txn.open_table(ADDRESS_POINTS_TABLE)?;
            let existing: Option<AddressPoint> = match table.get(point.address.as_str())? {
                Some(value) => Some(serde_json::from_slice(value.value())?),
                None => None,
            };
            match existing {
                Some(existing) => InsertOutcome::Existing(existing),
                None => {
                    let value = serde_json::to_vec(&point)?;
                    table.insert(point.address.as_str(), value.as_slice())?;
                    InsertOutcome::Created
                }
            }
        };
        write_txn.commit()?;
        Ok(outcome)
    }

    fn record_outcome(&self, address: &str, outcome: Geocode) -> StoreResult<Geocode> {
        let write_txn = self.db.begin_write()?;
        let stored = {
            let mut table = write_txn.open_table(ADDRESS_POINTS_TABLE)?;
            let existing: Option<AddressPoint> = match table.get(address)? {
                Some(value) => Some(serde_json::from_slice(value.value())?),
                None => None,
            };
            let mut point = existing.unwrap_or_else(|| AddressPoint::pending(address, Utc::now()));
            match point.outcome() {
                Some(terminal) => terminal,
                None => {
                    point.state = outcome.into();
                    let value = serde_json::to_vec(&point)?;
                    table.insert(address, value.as_slice())?;
                    outcome
                }
            }
        };
        write_txn.commit()?;
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocoder::Coordinates;
    use tempfile::TempDir;

    const ADDRESS: &str = "Москва, ул. Тверская, 7";

    #[test]
    fn insert_pending_then_existing() {
        // Arrange
        let store = RedbStore::open_in_memory().unwrap();
        let point = AddressPoint::pending(ADDRESS, Utc::now());

        // Act
        let created = store.insert_pending(point.clone()).unwrap();
        let repeated = store
            .insert_pending(AddressPoint::pending(ADDRESS, Utc::now()))
            .unwrap();

        // Assert
        assert_eq!(created, InsertOutcome::Created);
        assert_eq!(repeated, InsertOutcome::Existing(point));
    }

    #[test]
    fn record_outcome_keeps_first_terminal_value() {
        // Arrange
        let store = RedbStore::open_in_memory().unwrap();
        store
            .insert_pending(AddressPoint::pending(ADDRESS, Utc::now()))
            .unwrap();

        // Act
        let first = store.record_outcome(ADDRESS, Geocode::Unresolved).unwrap();
        let second = store
            .record_outcome(
                ADDRESS,
                Geocode::Resolved(Coordinates::new(55.76, 37.61).unwrap()),
            )
            .unwrap();

        // Assert
        assert_eq!(first, Geocode::Unresolved);
        assert_eq!(second, Geocode::Unresolved);
        assert_eq!(
            store.get(ADDRESS).unwrap().unwrap().outcome(),
            Some(Geocode::Unresolved)
        );
    }

    #[test]
    fn outcome_survives_reopen() {
        // Arrange
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("points.redb");
        let resolved = Geocode::Resolved(Coordinates::new(55.76, 37.61).unwrap());
        {
            let store = RedbStore::open(&path).unwrap();
            store
                .insert_pending(AddressPoint::pending(ADDRESS, Utc::now()))
                .unwrap();
            store.record_outcome(ADDRESS, resolved).unwrap();
        }

        // Act
        let reopened = RedbStore::open(&path).unwrap();
        let point = reopened.get(ADDRESS).unwrap();

        // Assert
        assert!(point.is_some());
        assert_eq!(point.unwrap().outcome(), Some(resolved));
    }

    #[test]
    fn get_missing_is_none() {
        let store = RedbStore::open_in_memory().unwrap();

        assert!(store.get("nowhere").unwrap().is_none());
    }
}
