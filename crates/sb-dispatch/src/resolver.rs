use std::{cmp::Ordering, fmt};

use serde::Serialize;
use tracing::{debug, instrument};

use crate::{
    address_point::AddressPointCache, distance::distance_km, menu::MenuIndex, order::Order,
    restaurant::Restaurant,
};

/// A restaurant able to cook a whole order, and how far it is from the customer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Candidate<'a> {
    pub restaurant: &'a Restaurant,
    /// `None` when either address could not be geocoded.
    pub distance_km: Option<f64>,
}

impl fmt::Display for Candidate<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.distance_km {
            Some(km) => write!(f, "{} ({:.3} km)", self.restaurant.name, km),
            None => write!(f, "{} (distance pending)", self.restaurant.name),
        }
    }
}

/// An order with its candidates, nearest first.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderWithCandidates<'a> {
    pub order: &'a Order,
    pub candidates: Vec<Candidate<'a>>,
}

impl OrderWithCandidates<'_> {
    pub fn summary(&self) -> String {
        if self.candidates.is_empty() {
            return "no available restaurants".to_string();
        }
        self.candidates
            .iter()
            .map(Candidate::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Matches orders to the restaurants that can fulfil them and ranks those by distance.
#[derive(Clone)]
pub struct AvailabilityResolver {
    cache: AddressPointCache,
}

impl AvailabilityResolver {
    pub fn new(cache: AddressPointCache) -> Self {
        Self { cache }
    }

    /// Resolve every order in turn. The output keeps the input order.
    #[instrument(skip_all, fields(orders = orders.len(), restaurants = index.len()))]
    pub async fn resolve_batch<'a>(
        &self,
        orders: &'a [Order],
        index: &'a MenuIndex,
    ) -> Vec<OrderWithCandidates<'a>> {
        let mut resolved = Vec::with_capacity(orders.len());
        for order in orders {
            resolved.push(self.resolve_order(order, index).await);
        }
        resolved
    }

    #[instrument(skip_all, fields(order = order.id))]
    pub async fn resolve_order<'a>(
        &self,
        order: &'a Order,
        index: &'a MenuIndex,
    ) -> OrderWithCandidates<'a> {
        let qualifying = index.restaurants_offering(&order.product_ids());
        if qualifying.is_empty() {
            debug!("no restaurant can fulfil the order");
            return OrderWithCandidates {
                order,
                candidates: Vec::new(),
            };
        }

        let delivery_point = self.cache.coordinates(&order.address).await;
        let mut candidates = Vec::with_capacity(qualifying.len());
        for restaurant in qualifying {
            let restaurant_point = self.cache.coordinates(&restaurant.address).await;
            candidates.push(Candidate {
                restaurant,
                distance_km: distance_km(&delivery_point, &restaurant_point),
            });
        }
        rank(&mut candidates);
        debug!(candidates = candidates.len(), "order resolved");

        OrderWithCandidates { order, candidates }
    }
}

/// Nearest first, unknown distances last. The sort is stable, so ties keep
/// the index's ascending restaurant id order.
fn rank(candidates: &mut [Candidate<'_>]) {
    candidates.sort_by(|a, b| match (a.distance_km, b.distance_km) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}
