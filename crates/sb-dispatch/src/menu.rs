use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::warn;

use crate::restaurant::{MenuEntry, ProductId, Restaurant, RestaurantId};

/// A restaurant together with the products it can currently cook.
#[derive(Clone, Debug, PartialEq)]
pub struct MenuListing {
    pub restaurant: Restaurant,
    pub products: HashSet<ProductId>,
}

/// Snapshot of which restaurant has which products available.
///
/// Restaurants without a single available product are not listed. Listings
/// are kept in ascending restaurant id order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MenuIndex {
    listings: BTreeMap<RestaurantId, MenuListing>,
}

impl MenuIndex {
    pub fn build(restaurants: &[Restaurant], entries: &[MenuEntry]) -> Self {
        let known: HashMap<RestaurantId, &Restaurant> = restaurants
            .iter()
            .map(|restaurant| (restaurant.id, restaurant))
            .collect();
        let mut listings = BTreeMap::new();
        for entry in entries.iter().filter(|entry| entry.availability) {
            let Some(restaurant) = known.get(&entry.restaurant) else {
                warn!(
                    restaurant = entry.restaurant,
                    product = entry.product,
                    "menu entry for unknown restaurant skipped"
                );
                continue;
            };
            listings
                .entry(entry.restaurant)
                .or_insert_with(|| MenuListing {
                    restaurant: (*restaurant).clone(),
                    products: HashSet::new(),
                })
                .products
                .insert(entry.product);
        }
        Self { listings }
    }

    pub fn products(&self, restaurant: RestaurantId) -> Option<&HashSet<ProductId>> {
        self.listings
            .get(&restaurant)
            .map(|listing| &listing.products)
    }

    /// Restaurants that have every one of `products` available, by ascending id.
    pub fn restaurants_offering(&self, products: &HashSet<ProductId>) -> Vec<&Restaurant> {
        self.listings
            .values()
            .filter(|listing| products.is_subset(&listing.products))
            .map(|listing| &listing.restaurant)
            .collect()
    }

    pub fn listings(&self) -> impl Iterator<Item = &MenuListing> {
        self.listings.values()
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }
}
