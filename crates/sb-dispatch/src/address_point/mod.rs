//! Persistent memory of every address the geocoder has been asked about.
//!
//! Each distinct address string gets exactly one [`AddressPoint`]. The record is
//! created `Pending` by whoever claims the address first and is moved to a
//! terminal state once, after the single geocoder call for it.

mod cache;
mod redb_store;
mod store;

pub use cache::{AddressPointCache, CacheConfig, CacheConfigBuilder, CacheConfigBuilderError};
pub use redb_store::RedbStore;
pub use store::{AddressPointStore, InsertOutcome, MemoryStore, StoreError, StoreResult};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geocoder::{Coordinates, Geocode};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PointState {
    /// Claimed by a lookup whose geocoder call has not finished yet.
    Pending,
    Resolved(Coordinates),
    Unresolved,
}

impl From<Geocode> for PointState {
    fn from(geocode: Geocode) -> Self {
        match geocode {
            Geocode::Resolved(coordinates) => PointState::Resolved(coordinates),
            Geocode::Unresolved => PointState::Unresolved,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AddressPoint {
    pub address: String,
    pub state: PointState,
    pub registered_at: DateTime<Utc>,
}

impl AddressPoint {
    pub fn pending(address: &str, registered_at: DateTime<Utc>) -> Self {
        Self {
            address: address.to_owned(),
            state: PointState::Pending,
            registered_at,
        }
    }

    /// The terminal geocoding outcome, or `None` while the record is pending.
    pub fn outcome(&self) -> Option<Geocode> {
        match self.state {
            PointState::Pending => None,
            PointState::Resolved(coordinates) => Some(Geocode::Resolved(coordinates)),
            PointState::Unresolved => Some(Geocode::Unresolved),
        }
    }

    pub fn latitude(&self) -> Option<f64> {
        self.coordinates().map(|c| c.latitude)
    }

    pub fn longitude(&self) -> Option<f64> {
        self.coordinates().map(|c| c.longitude)
    }

    fn coordinates(&self) -> Option<Coordinates> {
        self.outcome().and_then(|geocode| geocode.coordinates())
    }
}
