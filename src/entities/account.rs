//! Account entity - one stored-value wallet per registered customer.
//!
//! The primary key is the lower-cased email the customer registered with.
//! `balance` and `loyalty_points` are only ever changed through
//! [`crate::core::account::adjust_in`], which refuses to drive either below zero.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Account database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    /// Email-like account key
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Display name
    pub name: String,
    /// Stored-value balance in UC
    pub balance: i64,
    /// Loyalty points available for rewards
    pub loyalty_points: i64,
    /// School the customer attends (opaque to the ledger)
    pub school: String,
    /// Grade (opaque to the ledger)
    pub grade: String,
    /// Class group (opaque to the ledger)
    pub group_name: String,
    /// When the account was registered
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Account and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One account places many orders
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
    /// One account requests many recharges
    #[sea_orm(has_many = "super::recharge_request::Entity")]
    RechargeRequests,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl Related<super::recharge_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RechargeRequests.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
