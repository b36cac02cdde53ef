use chrono::Utc;
use dashmap::{mapref::entry::Entry, DashMap};
use thiserror::Error;

use super::AddressPoint;
use crate::geocoder::Geocode;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] redb::DatabaseError),
    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),
    #[error("table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of [`AddressPointStore::insert_pending`].
#[derive(Clone, Debug, PartialEq)]
pub enum InsertOutcome {
    /// The record did not exist and the caller now owns the geocoder call.
    Created,
    /// Someone else got there first.
    Existing(AddressPoint),
}

/// Keyed storage for address points. The address string is unique.
pub trait AddressPointStore: Send + Sync {
    fn get(&self, address: &str) -> StoreResult<Option<AddressPoint>>;

    /// Create `point` unless a record with the same address already exists.
    fn insert_pending(&self, point: AddressPoint) -> StoreResult<InsertOutcome>;

    /// Move the record for `address` to a terminal state.
    ///
    /// Only a pending (or missing) record is updated. The returned value is
    /// whatever terminal outcome is stored afterwards, which is the earlier
    /// one if the record was already terminal.
    fn record_outcome(&self, address: &str, outcome: Geocode) -> StoreResult<Geocode>;
}

/// Process-local store, used in tests and for throwaway runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    points: DashMap<String, AddressPoint>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl AddressPointStore for MemoryStore {
    fn get(&self, address: &str) -> StoreResult<Option<AddressPoint>> {
        Ok(self.points.get(address).map(|point| point.clone()))
    }

    fn insert_pending(&self, point: AddressPoint) -> StoreResult<InsertOutcome> {
        match self.points.entry(point.address.clone()) {
            Entry::Occupied(existing) => Ok(InsertOutcome::Existing(existing.get().clone())),
            Entry::Vacant(slot) => {
                slot.insert(point);
                Ok(InsertOutcome::Created)
            }
        }
    }

    fn record_outcome(&self, address: &str, outcome: Geocode) -> StoreResult<Geocode> {
        let mut point = self
            .points
            .entry(address.to_owned())
            .or_insert_with(|| AddressPoint::pending(address, Utc::now()));
        if let Some(existing) = point.outcome() {
            return Ok(existing);
        }
        point.state = outcome.into();
        Ok(outcome)
    }
}
