//! Recharge request entity - a top-up code waiting for staff to take the cash.
//!
//! The `code` column is unique across all requests, so a code always resolves to a
//! single request. Status moves from `PENDING` to `COMPLETED` once.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Redemption state of a recharge request
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum RechargeStatus {
    /// Issued, not yet paid at the counter
    #[sea_orm(string_value = "PENDING")]
    Pending,
    /// Redeemed by staff and credited; terminal
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
}

/// Recharge request database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "recharge_requests")]
pub struct Model {
    /// Unique identifier for the request
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Code the customer shows to staff (e.g. `UCOL-50-4821`)
    #[sea_orm(unique)]
    pub code: String,
    /// Amount to credit in UC
    pub amount: i64,
    /// Account that will be credited
    pub account_id: String,
    /// Redemption state
    pub status: RechargeStatus,
    /// When the code was issued
    pub created_at: DateTimeUtc,
    /// When staff redeemed the code
    pub processed_at: Option<DateTimeUtc>,
}

/// Defines relationships between `RechargeRequest` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each request belongs to one account
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::AccountId",
        to = "super::account::Column::Id"
    )]
    Account,
}

impl Related<super::account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
