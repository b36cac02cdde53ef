use std::{collections::HashSet, num::NonZeroU32};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    resolver::Candidate,
    restaurant::{ProductId, RestaurantId},
};

pub type OrderId = u64;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    New,
    Collect,
    Delivery,
    Completed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product: ProductId,
    pub quantity: NonZeroU32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    /// Delivery address, geocoded as-is.
    pub address: String,
    pub products: Vec<OrderLine>,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub restaurant: Option<RestaurantId>,
    #[serde(default)]
    pub called_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssignError {
    #[error("restaurant {restaurant} cannot fulfil order {order}")]
    NotACandidate {
        order: OrderId,
        restaurant: RestaurantId,
    },
}

impl Order {
    /// Distinct products across all lines.
    pub fn product_ids(&self) -> HashSet<ProductId> {
        self.products.iter().map(|line| line.product).collect()
    }

    /// Hand the order to one of the restaurants able to cook it.
    ///
    /// A `new` order moves to `collect`. `called_at` is only stamped the first time.
    pub fn assign_restaurant(
        &mut self,
        candidates: &[Candidate<'_>],
        restaurant: RestaurantId,
        now: DateTime<Utc>,
    ) -> Result<(), AssignError> {
        if !candidates.iter().any(|c| c.restaurant.id == restaurant) {
            return Err(AssignError::NotACandidate {
                order: self.id,
                restaurant,
            });
        }
        self.restaurant = Some(restaurant);
        if self.status == OrderStatus::New {
            self.status = OrderStatus::Collect;
        }
        self.called_at.get_or_insert(now);
        Ok(())
    }
}
