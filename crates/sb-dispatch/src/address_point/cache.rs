use std::{sync::Arc, time::Duration};

use chrono::Utc;
use derive_builder::Builder;
use moka::future::Cache;
use tracing::{debug, instrument, warn};

use super::{AddressPoint, AddressPointStore, InsertOutcome, StoreError};
use crate::geocoder::{Geocode, Geocoder};

#[derive(Clone, Debug, Builder)]
#[builder(default, build_fn(validate = "Self::validate"))]
pub struct CacheConfig {
    /// How many outcomes are kept in memory in front of the store.
    pub max_capacity: u64,
    /// How often a pending record owned by someone else is re-read.
    pub poll_interval: Duration,
    /// Longest a single geocoder call may run. A call cut short is unresolved.
    pub geocode_timeout: Duration,
    /// Age after which a pending record is considered abandoned by its owner.
    /// Must exceed `geocode_timeout`, so the owner's call has ended by then.
    pub pending_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            poll_interval: Duration::from_millis(100),
            geocode_timeout: Duration::from_secs(20),
            pending_timeout: Duration::from_secs(30),
        }
    }
}

impl CacheConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        let defaults = CacheConfig::default();
        let geocode_timeout = self.geocode_timeout.unwrap_or(defaults.geocode_timeout);
        let pending_timeout = self.pending_timeout.unwrap_or(defaults.pending_timeout);
        if geocode_timeout >= pending_timeout {
            return Err(format!(
                "geocode_timeout ({geocode_timeout:?}) must be shorter than pending_timeout ({pending_timeout:?})"
            ));
        }
        Ok(())
    }
}

/// Geocodes each distinct address at most once and remembers the outcome.
///
/// Concurrent lookups of the same address inside this cache share one
/// in-flight computation. Other caches sharing the same store meet at
/// [`AddressPointStore::insert_pending`]: the loser reads the winner's record
/// and, while it is still pending, polls until it is not. [`RedbStore`]
/// locks its file, so sharing across processes needs a store without that
/// limit.
///
/// [`RedbStore`]: super::RedbStore
#[derive(Clone)]
pub struct AddressPointCache {
    store: Arc<dyn AddressPointStore>,
    geocoder: Arc<dyn Geocoder>,
    outcomes: Cache<String, Geocode>,
    config: CacheConfig,
}

impl AddressPointCache {
    pub fn new(store: Arc<dyn AddressPointStore>, geocoder: Arc<dyn Geocoder>) -> Self {
        Self::with_config(store, geocoder, CacheConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn AddressPointStore>,
        geocoder: Arc<dyn Geocoder>,
        config: CacheConfig,
    ) -> Self {
        let outcomes = Cache::builder().max_capacity(config.max_capacity).build();
        Self {
            store,
            geocoder,
            outcomes,
            config,
        }
    }

    /// Coordinates for `address`, degrading store failures to
    /// [`Geocode::Unresolved`]. Degraded results are not persisted.
    pub async fn coordinates(&self, address: &str) -> Geocode {
        match self.try_coordinates(address).await {
            Ok(geocode) => geocode,
            Err(error) => {
                warn!(address, %error, "address point lookup failed");
                Geocode::Unresolved
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn try_coordinates(&self, address: &str) -> Result<Geocode, Arc<StoreError>> {
        if let Some(geocode) = self.outcomes.get(address).await {
            debug!("in-memory hit");
            return Ok(geocode);
        }
        self.outcomes
            .try_get_with(address.to_owned(), self.load_or_geocode(address))
            .await
    }

    async fn load_or_geocode(&self, address: &str) -> Result<Geocode, StoreError> {
        if let Some(point) = self.store.get(address)? {
            debug!("address point found in store");
            return self.settle(point).await;
        }
        match self
            .store
            .insert_pending(AddressPoint::pending(address, Utc::now()))?
        {
            InsertOutcome::Created => {
                let geocode = self.geocode(address).await;
                Ok(self.record(address, geocode))
            }
            InsertOutcome::Existing(point) => {
                debug!("address point created concurrently");
                self.settle(point).await
            }
        }
    }

    /// Wait for a record to become terminal, taking over abandoned ones.
    async fn settle(&self, mut point: AddressPoint) -> Result<Geocode, StoreError> {
        loop {
            if let Some(geocode) = point.outcome() {
                return Ok(geocode);
            }
            if self.is_abandoned(&point) {
                warn!(
                    address = %point.address,
                    registered_at = %point.registered_at,
                    "pending address point abandoned, geocoding again"
                );
                let geocode = self.geocode(&point.address).await;
                return Ok(self.record(&point.address, geocode));
            }
            tokio::time::sleep(self.config.poll_interval).await;
            if let Some(latest) = self.store.get(&point.address)? {
                point = latest;
            }
        }
    }

    async fn geocode(&self, address: &str) -> Geocode {
        match tokio::time::timeout(self.config.geocode_timeout, self.geocoder.resolve(address))
            .await
        {
            Ok(geocode) => geocode,
            Err(_) => {
                warn!(
                    address,
                    timeout = ?self.config.geocode_timeout,
                    "geocoder call timed out"
                );
                Geocode::Unresolved
            }
        }
    }

    /// Persist the outcome of our own geocoder call. The call already
    /// happened, so a failed write still hands the outcome back; it is kept
    /// in memory and the store record stays pending until someone takes it
    /// over.
    fn record(&self, address: &str, geocode: Geocode) -> Geocode {
        match self.store.record_outcome(address, geocode) {
            Ok(stored) => stored,
            Err(error) => {
                warn!(address, %error, "unable to store geocoding outcome");
                geocode
            }
        }
    }

    fn is_abandoned(&self, point: &AddressPoint) -> bool {
        Utc::now()
            .signed_duration_since(point.registered_at)
            .to_std()
            .is_ok_and(|age| age >= self.config.pending_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        address_point::{MemoryStore, StoreResult},
        geocoder::Coordinates,
        mock::MockGeocoder,
    };
    use std::sync::atomic::{AtomicBool, Ordering};

    const KNOWN: &str = "Москва, Тверская улица, 13";
    const UNKNOWN: &str = "Нигде, улица Никакая";

    fn moscow() -> Geocode {
        Geocode::Resolved(Coordinates::new(55.76, 37.61).unwrap())
    }

    fn store_error() -> StoreError {
        StoreError::Serialization(serde_json::from_str::<()>("not json").unwrap_err())
    }

    /// Memory store whose writes or reads can be made to fail.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_next_record: AtomicBool,
        fail_reads: bool,
    }

    impl AddressPointStore for FlakyStore {
        fn get(&self, address: &str) -> StoreResult<Option<AddressPoint>> {
            if self.fail_reads {
                return Err(store_error());
            }
            self.inner.get(address)
        }

        fn insert_pending(&self, point: AddressPoint) -> StoreResult<InsertOutcome> {
            self.inner.insert_pending(point)
        }

        fn record_outcome(&self, address: &str, outcome: Geocode) -> StoreResult<Geocode> {
            if self.fail_next_record.swap(false, Ordering::SeqCst) {
                return Err(store_error());
            }
            self.inner.record_outcome(address, outcome)
        }
    }

    fn fast_config() -> CacheConfig {
        CacheConfigBuilder::default()
            .poll_interval(Duration::from_millis(5))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn second_lookup_does_not_call_geocoder() {
        // Arrange
        let geocoder = Arc::new(MockGeocoder::new().with_answer(KNOWN, moscow()));
        let cache = AddressPointCache::new(Arc::new(MemoryStore::new()), geocoder.clone());

        // Act
        let first = cache.coordinates(KNOWN).await;
        let second = cache.coordinates(KNOWN).await;

        // Assert
        assert_eq!(first, moscow());
        assert_eq!(second, moscow());
        assert_eq!(geocoder.calls(KNOWN), 1);
    }

    #[tokio::test]
    async fn unresolved_is_remembered() {
        // Arrange
        let geocoder = Arc::new(MockGeocoder::new());
        let store = Arc::new(MemoryStore::new());
        let cache = AddressPointCache::new(store.clone(), geocoder.clone());

        // Act
        let first = cache.coordinates(UNKNOWN).await;
        let second = cache.coordinates(UNKNOWN).await;

        // Assert
        assert_eq!(first, Geocode::Unresolved);
        assert_eq!(second, Geocode::Unresolved);
        assert_eq!(geocoder.calls(UNKNOWN), 1);
        assert_eq!(
            store.get(UNKNOWN).unwrap().unwrap().outcome(),
            Some(Geocode::Unresolved)
        );
    }

    #[tokio::test]
    async fn stored_outcome_is_used_by_a_fresh_cache() {
        // Arrange
        let store = Arc::new(MemoryStore::new());
        let geocoder = Arc::new(MockGeocoder::new().with_answer(KNOWN, moscow()));
        AddressPointCache::new(store.clone(), geocoder.clone())
            .coordinates(KNOWN)
            .await;
        let restarted = AddressPointCache::new(store, geocoder.clone());

        // Act
        let geocode = restarted.coordinates(KNOWN).await;

        // Assert
        assert_eq!(geocode, moscow());
        assert_eq!(geocoder.calls(KNOWN), 1);
    }

    #[tokio::test]
    async fn concurrent_lookups_share_one_call() {
        // Arrange
        let geocoder = Arc::new(
            MockGeocoder::new()
                .with_answer(KNOWN, moscow())
                .with_delay(Duration::from_millis(50)),
        );
        let store = Arc::new(MemoryStore::new());
        let cache = AddressPointCache::new(store.clone(), geocoder.clone());

        // Act
        let (first, second) = tokio::join!(cache.coordinates(KNOWN), cache.coordinates(KNOWN));

        // Assert
        assert_eq!(first, moscow());
        assert_eq!(second, moscow());
        assert_eq!(geocoder.calls(KNOWN), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn caches_sharing_a_store_share_one_call() {
        // Arrange
        let geocoder = Arc::new(
            MockGeocoder::new()
                .with_answer(KNOWN, moscow())
                .with_delay(Duration::from_millis(50)),
        );
        let store = Arc::new(MemoryStore::new());
        let first_cache =
            AddressPointCache::with_config(store.clone(), geocoder.clone(), fast_config());
        let second_cache =
            AddressPointCache::with_config(store.clone(), geocoder.clone(), fast_config());

        // Act
        let (first, second) = tokio::join!(
            first_cache.coordinates(KNOWN),
            second_cache.coordinates(KNOWN)
        );

        // Assert
        assert_eq!(first, moscow());
        assert_eq!(second, moscow());
        assert_eq!(geocoder.calls(KNOWN), 1);
    }

    #[tokio::test]
    async fn abandoned_pending_record_is_taken_over() {
        // Arrange
        let store = Arc::new(MemoryStore::new());
        let long_ago = Utc::now() - chrono::Duration::hours(1);
        store
            .insert_pending(AddressPoint::pending(KNOWN, long_ago))
            .unwrap();
        let geocoder = Arc::new(MockGeocoder::new().with_answer(KNOWN, moscow()));
        let cache = AddressPointCache::with_config(store.clone(), geocoder.clone(), fast_config());

        // Act
        let geocode = cache.coordinates(KNOWN).await;

        // Assert
        assert_eq!(geocode, moscow());
        assert_eq!(geocoder.calls(KNOWN), 1);
        assert_eq!(store.get(KNOWN).unwrap().unwrap().outcome(), Some(moscow()));
    }

    #[tokio::test]
    async fn fresh_pending_record_is_awaited() {
        // Arrange
        let store = Arc::new(MemoryStore::new());
        store
            .insert_pending(AddressPoint::pending(KNOWN, Utc::now()))
            .unwrap();
        let geocoder = Arc::new(MockGeocoder::new().with_answer(KNOWN, moscow()));
        let cache = AddressPointCache::with_config(store.clone(), geocoder.clone(), fast_config());
        let owner = {
            let store = store.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                store.record_outcome(KNOWN, moscow()).unwrap();
            }
        };

        // Act
        let (geocode, _) = tokio::join!(cache.coordinates(KNOWN), owner);

        // Assert
        assert_eq!(geocode, moscow());
        assert_eq!(geocoder.calls(KNOWN), 0);
    }

    #[tokio::test]
    async fn slow_owner_is_not_taken_over() {
        // Arrange
        let geocoder = Arc::new(
            MockGeocoder::new()
                .with_answer(KNOWN, moscow())
                .with_delay(Duration::from_secs(5)),
        );
        let config = CacheConfigBuilder::default()
            .poll_interval(Duration::from_millis(5))
            .geocode_timeout(Duration::from_millis(20))
            .pending_timeout(Duration::from_secs(1))
            .build()
            .unwrap();
        let store = Arc::new(MemoryStore::new());
        let first_cache =
            AddressPointCache::with_config(store.clone(), geocoder.clone(), config.clone());
        let second_cache = AddressPointCache::with_config(store.clone(), geocoder.clone(), config);

        // Act
        let (first, second) = tokio::join!(
            first_cache.coordinates(KNOWN),
            second_cache.coordinates(KNOWN)
        );

        // Assert
        assert_eq!(first, Geocode::Unresolved);
        assert_eq!(second, Geocode::Unresolved);
        assert_eq!(geocoder.calls(KNOWN), 1);
        assert_eq!(
            store.get(KNOWN).unwrap().unwrap().outcome(),
            Some(Geocode::Unresolved)
        );
    }

    #[test]
    fn geocode_timeout_must_be_shorter_than_pending_timeout() {
        let config = CacheConfigBuilder::default()
            .geocode_timeout(Duration::from_secs(30))
            .pending_timeout(Duration::from_secs(30))
            .build();

        assert!(matches!(
            config,
            Err(CacheConfigBuilderError::ValidationError(_))
        ));
        assert!(CacheConfigBuilder::default().build().is_ok());
    }

    #[test]
    fn default_http_timeout_fits_inside_geocode_timeout() {
        assert!(crate::constants::DEFAULT_HTTP_TIMEOUT < CacheConfig::default().geocode_timeout);
    }

    #[tokio::test]
    async fn failed_write_keeps_outcome_and_next_lookup_is_immediate() {
        // Arrange
        let geocoder = Arc::new(MockGeocoder::new().with_answer(KNOWN, moscow()));
        let store = Arc::new(FlakyStore {
            fail_next_record: AtomicBool::new(true),
            ..Default::default()
        });
        let cache = AddressPointCache::new(store.clone(), geocoder.clone());

        // Act
        let first = cache.coordinates(KNOWN).await;
        let started = std::time::Instant::now();
        let second = cache.coordinates(KNOWN).await;
        let elapsed = started.elapsed();

        // Assert
        assert_eq!(first, moscow());
        assert_eq!(second, moscow());
        assert_eq!(geocoder.calls(KNOWN), 1);
        assert!(elapsed < Duration::from_secs(1), "second lookup took {elapsed:?}");
    }

    #[tokio::test]
    async fn read_failure_degrades_to_unresolved() {
        // Arrange
        let geocoder = Arc::new(MockGeocoder::new().with_answer(KNOWN, moscow()));
        let store = Arc::new(FlakyStore {
            fail_reads: true,
            ..Default::default()
        });
        let cache = AddressPointCache::new(store, geocoder.clone());

        // Act
        let attempt = cache.try_coordinates(KNOWN).await;
        let degraded = cache.coordinates(KNOWN).await;

        // Assert
        assert!(matches!(*attempt.unwrap_err(), StoreError::Serialization(_)));
        assert_eq!(degraded, Geocode::Unresolved);
        assert_eq!(geocoder.calls(KNOWN), 0);
    }
}
