//! Order entity - a paid (or cash-on-pickup) cafeteria order.
//!
//! Orders start `PENDING` and move to `COMPLETED` exactly once when staff hand them
//! over. While pending, the pickup code is unique; the partial index enforcing that
//! is created in [`crate::config::database::create_tables`].

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Fulfillment state of an order
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum OrderStatus {
    /// Paid or awaiting cash, not yet handed over
    #[sea_orm(string_value = "PENDING")]
    Pending,
    /// Handed over to the customer; terminal
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
}

/// How the customer pays
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum PaymentMethod {
    /// Paid at the counter; the balance is untouched
    #[sea_orm(string_value = "CASH")]
    Cash,
    /// Debited from the stored-value balance at checkout
    #[sea_orm(string_value = "STORED_VALUE")]
    StoredValue,
}

/// Order database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    /// Unique identifier for the order
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Account that placed the order
    pub account_id: String,
    /// Sum of unit price times quantity over all lines
    pub subtotal: i64,
    /// Reward discount applied (0 when no reward was redeemed)
    pub discount: i64,
    /// Amount charged: `max(0, subtotal - discount)`
    pub total: i64,
    /// Loyalty points granted for this order
    pub points_earned: i64,
    /// Loyalty points spent on the reward (0 or the reward cost)
    pub points_redeemed: i64,
    /// Cash or stored value
    pub payment_method: PaymentMethod,
    /// Pickup slot label shown to staff
    pub pickup_time: String,
    /// Six-character code the customer shows at the counter
    pub pickup_code: String,
    /// Fulfillment state
    pub status: OrderStatus,
    /// When the order was placed
    pub created_at: DateTimeUtc,
    /// When staff handed the order over
    pub completed_at: Option<DateTimeUtc>,
}

/// Defines relationships between Order and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each order belongs to one account
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::AccountId",
        to = "super::account::Column::Id"
    )]
    Account,
    /// One order has many lines
    #[sea_orm(has_many = "super::order_line::Entity")]
    Lines,
}

impl Related<super::account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl Related<super::order_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
