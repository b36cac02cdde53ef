use serde::{Deserialize, Serialize};

pub type RestaurantId = u64;
pub type ProductId = u64;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: RestaurantId,
    pub name: String,
    /// Free-text address, geocoded as-is.
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
}

/// One product on one restaurant's menu.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuEntry {
    pub restaurant: RestaurantId,
    pub product: ProductId,
    pub availability: bool,
}
