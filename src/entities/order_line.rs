//! Order line entity - a snapshot of one cart entry at checkout time.
//!
//! Name and unit price are copied from the catalog so later menu changes do not
//! rewrite order history.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Order line database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_lines")]
pub struct Model {
    /// Unique identifier for the line
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Order this line belongs to
    pub order_id: i64,
    /// Position of the line within the cart
    pub position: i32,
    /// Catalog item id
    pub item_id: String,
    /// Catalog item name at checkout
    pub name: String,
    /// Catalog unit price at checkout, in UC
    pub unit_price: i64,
    /// Number of units
    pub quantity: i64,
    /// Free-form kitchen note
    pub note: Option<String>,
}

/// Defines relationships between `OrderLine` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each line belongs to one order
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
