//! In-memory geocoder for unit tests.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::geocoder::{Geocode, Geocoder};

/// Answers from a fixed table and counts calls per address. Addresses not in
/// the table are unresolved.
#[derive(Default)]
pub struct MockGeocoder {
    answers: HashMap<String, Geocode>,
    calls: DashMap<String, usize>,
    delay: Duration,
}

impl MockGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_answer(mut self, address: &str, geocode: Geocode) -> Self {
        self.answers.insert(address.to_owned(), geocode);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self, address: &str) -> usize {
        self.calls.get(address).map(|count| *count).unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.iter().map(|entry| *entry.value()).sum()
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn resolve(&self, address: &str) -> Geocode {
        *self.calls.entry(address.to_owned()).or_insert(0) += 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.answers
            .get(address)
            .copied()
            .unwrap_or(Geocode::Unresolved)
    }
}
