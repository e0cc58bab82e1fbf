//! Order ledger - persistence and lookup of orders.
//!
//! Orders are written by checkout through [`insert_order_in`], inside the same
//! transaction that debits the account. Staff transitions live in
//! [`crate::core::fulfillment`]; this module only reads and creates.

use crate::{
    core::account::normalize_account_id,
    core::checkout::Quote,
    core::codes,
    entities::{Order, OrderLine, OrderStatus, PaymentMethod, order, order_line},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};

/// Which orders an operation covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderScope {
    /// Every account (staff dashboard)
    All,
    /// A single account (customer history)
    Account(String),
}

impl OrderScope {
    /// Normalized account the scope is limited to, if any.
    #[must_use]
    pub fn account_id(&self) -> Option<String> {
        match self {
            Self::All => None,
            Self::Account(id) => Some(normalize_account_id(id)),
        }
    }
}

/// An order together with its lines in cart order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDetails {
    /// The order row
    pub order: order::Model,
    /// Its lines, ordered by position
    pub lines: Vec<order_line::Model>,
}

/// Inserts a pending order and its lines using `pickup_code`.
///
/// A pickup code already held by another pending order makes the insert fail with
/// a unique-constraint violation; the caller rolls back and retries with a new code.
pub async fn insert_order_in<C>(
    db: &C,
    account_id: &str,
    quote: &Quote,
    payment_method: PaymentMethod,
    pickup_time: String,
    pickup_code: String,
) -> Result<OrderDetails>
where
    C: ConnectionTrait,
{
    let order = order::ActiveModel {
        account_id: Set(account_id.to_string()),
        subtotal: Set(quote.subtotal),
        discount: Set(quote.discount),
        total: Set(quote.total),
        points_earned: Set(quote.points_earned),
        points_redeemed: Set(quote.points_redeemed),
        payment_method: Set(payment_method),
        pickup_time: Set(pickup_time),
        pickup_code: Set(pickup_code),
        status: Set(OrderStatus::Pending),
        created_at: Set(chrono::Utc::now()),
        completed_at: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let mut lines = Vec::with_capacity(quote.lines.len());
    for (position, line) in (0_i32..).zip(&quote.lines) {
        let saved = order_line::ActiveModel {
            order_id: Set(order.id),
            position: Set(position),
            item_id: Set(line.item_id.clone()),
            name: Set(line.name.clone()),
            unit_price: Set(line.unit_price),
            quantity: Set(line.quantity),
            note: Set(line.note.clone()),
            ..Default::default()
        }
        .insert(db)
        .await?;
        lines.push(saved);
    }

    Ok(OrderDetails { order, lines })
}

/// Handle on the orders tables.
#[derive(Debug, Clone)]
pub struct OrderLedger {
    db: DatabaseConnection,
}

impl OrderLedger {
    /// Creates the ledger over `db`.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Loads an order and its lines.
    pub async fn get(&self, order_id: i64) -> Result<OrderDetails> {
        let order = Order::find_by_id(order_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| Error::OrderNotFound {
                reference: order_id.to_string(),
            })?;

        let lines = order
            .find_related(OrderLine)
            .order_by_asc(order_line::Column::Position)
            .all(&self.db)
            .await?;

        Ok(OrderDetails { order, lines })
    }

    /// Orders in `scope`, newest first.
    pub async fn list(&self, scope: &OrderScope) -> Result<Vec<order::Model>> {
        let mut query = Order::find();
        if let Some(account_id) = scope.account_id() {
            query = query.filter(order::Column::AccountId.eq(account_id));
        }
        query
            .order_by_desc(order::Column::CreatedAt)
            .order_by_desc(order::Column::Id)
            .all(&self.db)
            .await
            .map_err(Into::into)
    }

    /// Pending orders in `scope`, oldest first, as the kitchen queue shows them.
    pub async fn pending(&self, scope: &OrderScope) -> Result<Vec<order::Model>> {
        let mut query = Order::find().filter(order::Column::Status.eq(OrderStatus::Pending));
        if let Some(account_id) = scope.account_id() {
            query = query.filter(order::Column::AccountId.eq(account_id));
        }
        query
            .order_by_asc(order::Column::CreatedAt)
            .order_by_asc(order::Column::Id)
            .all(&self.db)
            .await
            .map_err(Into::into)
    }

    /// The pending order holding `code`, matched case-insensitively.
    pub async fn find_pending_by_code(&self, code: &str) -> Result<Option<order::Model>> {
        Order::find()
            .filter(order::Column::PickupCode.eq(codes::normalize_pickup_code(code)))
            .filter(order::Column::Status.eq(OrderStatus::Pending))
            .one(&self.db)
            .await
            .map_err(Into::into)
    }
}
