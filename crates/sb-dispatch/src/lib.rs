pub mod address_point;
mod api_interfaces;
mod api_key;
pub mod constants;
pub mod distance;
pub mod error;
pub mod geocoder;
pub mod menu;
#[cfg(test)]
mod mock;
pub mod order;
pub mod resolver;
pub mod restaurant;
pub mod snapshot;
mod util;

pub use address_point::{AddressPointCache, CacheConfig};
pub use api_key::{ApiKey, ApiKeyError};
pub use geocoder::{Coordinates, Geocode, Geocoder, YandexGeocoder};
pub use menu::MenuIndex;
pub use resolver::{AvailabilityResolver, Candidate, OrderWithCandidates};
pub use snapshot::Snapshot;
pub use util::default_http_client;
