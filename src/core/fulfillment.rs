//! Fulfillment service - the staff side of the ledger.
//!
//! Handing over an order, redeeming a recharge code and clearing completed orders
//! each run in one database transaction. Terminal-state conflicts are detected by
//! the write itself (`... WHERE status = 'PENDING'` affecting zero rows), so two
//! terminals racing on the same code cannot both succeed.

use crate::{
    core::account::adjust_in,
    core::codes,
    core::events::{ChangeFeed, LedgerEvent},
    core::order::OrderScope,
    entities::{
        Order, OrderLine, OrderStatus, RechargeRequest, RechargeStatus, account, order,
        order_line, recharge_request,
    },
    errors::{Error, Result},
};
use sea_orm::{PaginatorTrait, QuerySelect, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::{info, instrument};

/// Marks a pending order completed. Zero rows affected means someone else got there first.
async fn mark_completed_in<C>(db: &C, order_id: i64, reference: &str) -> Result<order::Model>
where
    C: ConnectionTrait,
{
    let result = Order::update_many()
        .col_expr(order::Column::Status, Expr::value(OrderStatus::Completed))
        .col_expr(order::Column::CompletedAt, Expr::value(chrono::Utc::now()))
        .filter(order::Column::Id.eq(order_id))
        .filter(order::Column::Status.eq(OrderStatus::Pending))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::AlreadyFulfilled {
            reference: reference.to_string(),
        });
    }

    Order::find_by_id(order_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::OrderNotFound {
            reference: reference.to_string(),
        })
}

/// Staff operations over orders and recharge codes.
#[derive(Debug, Clone)]
pub struct FulfillmentService {
    db: DatabaseConnection,
    feed: ChangeFeed,
}

impl FulfillmentService {
    /// Creates the service.
    #[must_use]
    pub const fn new(db: DatabaseConnection, feed: ChangeFeed) -> Self {
        Self { db, feed }
    }

    /// Hands over the pending order carrying `code` (case-insensitive).
    #[instrument(skip(self))]
    pub async fn complete_by_code(&self, code: &str) -> Result<order::Model> {
        let code = codes::normalize_pickup_code(code);
        if code.is_empty() {
            return Err(Error::validation("Pickup code cannot be empty"));
        }

        let txn = self.db.begin().await?;

        let pending = Order::find()
            .filter(order::Column::PickupCode.eq(code.as_str()))
            .filter(order::Column::Status.eq(OrderStatus::Pending))
            .one(&txn)
            .await?;

        let Some(pending) = pending else {
            let fulfilled = Order::find()
                .filter(order::Column::PickupCode.eq(code.as_str()))
                .filter(order::Column::Status.eq(OrderStatus::Completed))
                .count(&txn)
                .await?;
            return Err(if fulfilled > 0 {
                Error::AlreadyFulfilled { reference: code }
            } else {
                Error::OrderNotFound { reference: code }
            });
        };

        let completed = mark_completed_in(&txn, pending.id, &code).await?;
        txn.commit().await?;

        self.announce_completed(&completed);
        Ok(completed)
    }

    /// Hands over an order picked from the dashboard list.
    #[instrument(skip(self))]
    pub async fn complete_by_id(&self, order_id: i64) -> Result<order::Model> {
        let reference = order_id.to_string();
        let txn = self.db.begin().await?;

        let existing = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| Error::OrderNotFound {
                reference: reference.clone(),
            })?;
        if existing.status == OrderStatus::Completed {
            return Err(Error::AlreadyFulfilled { reference });
        }

        let completed = mark_completed_in(&txn, order_id, &reference).await?;
        txn.commit().await?;

        self.announce_completed(&completed);
        Ok(completed)
    }

    fn announce_completed(&self, completed: &order::Model) {
        info!(
            order_id = completed.id,
            pickup_code = %completed.pickup_code,
            "Order delivered"
        );
        self.feed.publish(LedgerEvent::OrderChanged {
            order_id: completed.id,
            account_id: completed.account_id.clone(),
            status: completed.status,
        });
    }

    /// Redeems a recharge code and credits its account, exactly once.
    #[instrument(skip(self))]
    pub async fn redeem_recharge(&self, code: &str) -> Result<account::Model> {
        let code = code.trim().to_string();
        if code.is_empty() {
            return Err(Error::validation("Recharge code cannot be empty"));
        }

        let txn = self.db.begin().await?;

        let request = RechargeRequest::find()
            .filter(recharge_request::Column::Code.eq(code.as_str()))
            .one(&txn)
            .await?
            .ok_or_else(|| Error::RechargeNotFound { code: code.clone() })?;

        let consumed = RechargeRequest::update_many()
            .col_expr(
                recharge_request::Column::Status,
                Expr::value(RechargeStatus::Completed),
            )
            .col_expr(
                recharge_request::Column::ProcessedAt,
                Expr::value(chrono::Utc::now()),
            )
            .filter(recharge_request::Column::Id.eq(request.id))
            .filter(recharge_request::Column::Status.eq(RechargeStatus::Pending))
            .exec(&txn)
            .await?;
        if consumed.rows_affected == 0 {
            return Err(Error::AlreadyRedeemed { code });
        }

        let credited = adjust_in(&txn, &request.account_id, request.amount, 0).await?;
        txn.commit().await?;

        info!(
            account_id = %credited.id,
            amount = request.amount,
            balance = credited.balance,
            "Recharge redeemed"
        );
        self.feed.publish(LedgerEvent::RechargeChanged {
            request_id: request.id,
            account_id: request.account_id.clone(),
            status: RechargeStatus::Completed,
        });
        self.feed.publish(LedgerEvent::AccountChanged {
            account_id: request.account_id,
        });
        Ok(credited)
    }

    /// Deletes completed orders in `scope` with their lines; returns how many.
    #[instrument(skip(self))]
    pub async fn purge_completed(&self, scope: &OrderScope) -> Result<u64> {
        let txn = self.db.begin().await?;

        let account_id = scope.account_id();
        let mut query = Order::find()
            .select_only()
            .column(order::Column::Id)
            .filter(order::Column::Status.eq(OrderStatus::Completed));
        if let Some(account_id) = &account_id {
            query = query.filter(order::Column::AccountId.eq(account_id.as_str()));
        }
        let ids: Vec<i64> = query.into_tuple().all(&txn).await?;

        if ids.is_empty() {
            txn.rollback().await?;
            return Ok(0);
        }

        OrderLine::delete_many()
            .filter(order_line::Column::OrderId.is_in(ids.clone()))
            .exec(&txn)
            .await?;
        let deleted = Order::delete_many()
            .filter(order::Column::Id.is_in(ids))
            .filter(order::Column::Status.eq(OrderStatus::Completed))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        let count = deleted.rows_affected;
        info!(count, "Completed orders purged");
        self.feed.publish(LedgerEvent::OrdersPurged {
            account_id,
            count,
        });
        Ok(count)
    }
}
