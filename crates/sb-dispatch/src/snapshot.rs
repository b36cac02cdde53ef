use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    error::{LoadError, SaveError},
    menu::MenuIndex,
    order::{Order, OrderId},
    restaurant::{MenuEntry, Restaurant},
};

/// Read-only copy of the restaurants, menus and orders a batch runs against.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub restaurants: Vec<Restaurant>,
    #[serde(default)]
    pub menu: Vec<MenuEntry>,
    #[serde(default)]
    pub orders: Vec<Order>,
}

impl Snapshot {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let file_contents = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(file_contents.as_str())?)
    }

    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SaveError> {
        let serialized = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, serialized).await?;
        Ok(())
    }

    pub fn menu_index(&self) -> MenuIndex {
        MenuIndex::build(&self.restaurants, &self.menu)
    }

    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.orders.iter().find(|order| order.id == id)
    }
}
