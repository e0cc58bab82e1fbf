//! Read-only catalog the checkout prices carts against.
//!
//! The ledger never owns menu data; it only asks for an item's current name and
//! price. [`StaticCatalog`] serves the menu from `config.toml`.

use crate::config::MenuItemConfig;
use std::collections::HashMap;

/// A menu item as seen by the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    /// Catalog id referenced by cart lines
    pub item_id: String,
    /// Display name
    pub name: String,
    /// Unit price in UC
    pub unit_price: i64,
}

/// Source of item prices.
pub trait Catalog: Send + Sync + std::fmt::Debug {
    /// Current data for `item_id`, if the item is on the menu.
    fn lookup(&self, item_id: &str) -> Option<CatalogItem>;
}

/// In-memory catalog built once at start-up.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    items: HashMap<String, CatalogItem>,
}

impl StaticCatalog {
    /// Builds the catalog from configured menu entries; later duplicates win.
    #[must_use]
    pub fn from_menu(menu: &[MenuItemConfig]) -> Self {
        let items = menu
            .iter()
            .map(|entry| {
                (
                    entry.id.clone(),
                    CatalogItem {
                        item_id: entry.id.clone(),
                        name: entry.name.clone(),
                        unit_price: entry.price,
                    },
                )
            })
            .collect();
        Self { items }
    }

    /// Number of items on the menu.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the menu is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Catalog for StaticCatalog {
    fn lookup(&self, item_id: &str) -> Option<CatalogItem> {
        self.items.get(item_id).cloned()
    }
}
