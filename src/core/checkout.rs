//! Checkout - turns a cart into a pending order and settles the account.
//!
//! Pricing is pure ([`price_lines`], [`apply_reward`]) so the rules can be tested
//! without a store. [`Checkout::submit`] re-reads the account, prices the cart,
//! inserts the order and applies the balance/points deltas in one database
//! transaction. A pickup-code clash with a live order rolls the attempt back and
//! retries with a fresh code.

use crate::{
    config::{LedgerConfig, RewardConfig, ServiceHours},
    core::account::{adjust_in, normalize_account_id},
    core::catalog::Catalog,
    core::codes,
    core::events::{ChangeFeed, LedgerEvent},
    core::order::{OrderDetails, insert_order_in},
    entities::{Account, PaymentMethod},
    errors::{Error, Result},
};
use chrono::NaiveTime;
use sea_orm::{DatabaseConnection, EntityTrait, TransactionTrait};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// One entry of the customer's cart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    /// Catalog item id
    pub item_id: String,
    /// Number of units, at least 1
    pub quantity: i64,
    /// Optional note for the kitchen
    pub note: Option<String>,
}

/// When the customer will pick the order up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickupTime {
    /// As soon as it is ready
    Asap,
    /// At the morning recess
    Recess,
    /// A specific time within service hours
    Custom(NaiveTime),
}

impl PickupTime {
    /// Label stored on the order and shown to staff.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Asap => "As soon as possible".to_string(),
            Self::Recess => "Recess (9:30 AM)".to_string(),
            Self::Custom(time) => format!("Custom ({})", time.format("%H:%M")),
        }
    }

    /// Rejects custom times outside the service window.
    pub fn validate(&self, hours: &ServiceHours) -> Result<()> {
        match self {
            Self::Custom(time) if !hours.contains(*time) => Err(Error::validation(format!(
                "Pickup time must be between {} and {}",
                hours.open.format("%H:%M"),
                hours.cutoff.format("%H:%M")
            ))),
            _ => Ok(()),
        }
    }
}

/// Everything the customer submits at checkout
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    /// Account placing the order
    pub account_id: String,
    /// Cart contents
    pub lines: Vec<CartLine>,
    /// Pickup slot
    pub pickup: PickupTime,
    /// Cash or stored value
    pub payment_method: PaymentMethod,
    /// Whether to spend points on the reward discount
    pub redeem_reward: bool,
}

/// A cart line resolved against the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    /// Catalog item id
    pub item_id: String,
    /// Item name at checkout
    pub name: String,
    /// Unit price at checkout, in UC
    pub unit_price: i64,
    /// Number of units
    pub quantity: i64,
    /// Kitchen note
    pub note: Option<String>,
}

/// Priced cart with reward applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    /// Resolved lines
    pub lines: Vec<PricedLine>,
    /// Sum of unit price times quantity
    pub subtotal: i64,
    /// Reward discount, 0 when not redeemed
    pub discount: i64,
    /// `max(0, subtotal - discount)`
    pub total: i64,
    /// Points granted, equal to the total
    pub points_earned: i64,
    /// Points spent, 0 or the reward cost
    pub points_redeemed: i64,
}

impl Quote {
    /// Net change to the loyalty balance.
    #[must_use]
    pub const fn points_delta(&self) -> i64 {
        self.points_earned - self.points_redeemed
    }

    /// Change to the stored-value balance for `method`.
    #[must_use]
    pub const fn balance_delta(&self, method: PaymentMethod) -> i64 {
        match method {
            PaymentMethod::StoredValue => -self.total,
            PaymentMethod::Cash => 0,
        }
    }
}

/// Sum of unit price times quantity, rejecting carts too large to represent.
pub fn subtotal(lines: &[PricedLine]) -> Result<i64> {
    lines.iter().try_fold(0_i64, |sum, line| {
        line.unit_price
            .checked_mul(line.quantity)
            .and_then(|line_total| sum.checked_add(line_total))
            .ok_or_else(|| Error::validation("Order total is too large"))
    })
}

/// Resolves cart lines against the catalog, rejecting empty carts, non-positive
/// quantities, unknown items and totals that overflow.
pub fn price_lines(catalog: &dyn Catalog, lines: &[CartLine]) -> Result<Vec<PricedLine>> {
    if lines.is_empty() {
        return Err(Error::validation("Cart is empty"));
    }

    let priced = lines
        .iter()
        .map(|line| {
            if line.quantity <= 0 {
                return Err(Error::validation(format!(
                    "Quantity for item {} must be at least 1",
                    line.item_id
                )));
            }
            let item = catalog.lookup(&line.item_id).ok_or_else(|| {
                Error::validation(format!("Item {} is not on the menu", line.item_id))
            })?;
            Ok(PricedLine {
                item_id: item.item_id,
                name: item.name,
                unit_price: item.unit_price,
                quantity: line.quantity,
                note: line
                    .note
                    .as_ref()
                    .map(|note| note.trim().to_string())
                    .filter(|note| !note.is_empty()),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    subtotal(&priced)?;
    Ok(priced)
}

/// Applies the reward rule to priced lines.
///
/// The discount is granted only when `redeem_reward` is set and the account holds
/// at least `reward.cost` points; it is capped by both `reward.max_discount` and the
/// subtotal. Any part of the cap the cart cannot absorb is forfeited. Points are
/// spent only when the discount is positive.
pub fn apply_reward(
    lines: Vec<PricedLine>,
    reward: &RewardConfig,
    loyalty_points: i64,
    redeem_reward: bool,
) -> Result<Quote> {
    let subtotal = subtotal(&lines)?;

    let discount = if redeem_reward && loyalty_points >= reward.cost {
        subtotal.min(reward.max_discount).max(0)
    } else {
        0
    };
    let points_redeemed = if discount > 0 { reward.cost } else { 0 };

    let total = subtotal.saturating_sub(discount).max(0);

    Ok(Quote {
        lines,
        subtotal,
        discount,
        total,
        points_earned: total,
        points_redeemed,
    })
}

/// Prices a cart for an account holding `loyalty_points`.
pub fn price_cart(
    catalog: &dyn Catalog,
    lines: &[CartLine],
    reward: &RewardConfig,
    loyalty_points: i64,
    redeem_reward: bool,
) -> Result<Quote> {
    let priced = price_lines(catalog, lines)?;
    apply_reward(priced, reward, loyalty_points, redeem_reward)
}

/// Coordinates order creation with the account debit.
#[derive(Debug, Clone)]
pub struct Checkout {
    db: DatabaseConnection,
    feed: ChangeFeed,
    catalog: Arc<dyn Catalog>,
    config: Arc<LedgerConfig>,
}

impl Checkout {
    /// Creates the coordinator.
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        feed: ChangeFeed,
        catalog: Arc<dyn Catalog>,
        config: Arc<LedgerConfig>,
    ) -> Self {
        Self {
            db,
            feed,
            catalog,
            config,
        }
    }

    /// Places an order. On any error nothing is written.
    #[instrument(skip(self, request), fields(account_id = %request.account_id, payment = ?request.payment_method))]
    pub async fn submit(&self, request: CheckoutRequest) -> Result<OrderDetails> {
        request.pickup.validate(&self.config.service_hours)?;
        let priced = price_lines(self.catalog.as_ref(), &request.lines)?;
        let account_id = normalize_account_id(&request.account_id);

        let attempts = self.config.code_attempts;
        for attempt in 1..=attempts {
            let pickup_code = codes::pickup_code(self.config.pickup_code_length);
            match self
                .try_submit(&request, &account_id, priced.clone(), pickup_code)
                .await
            {
                Ok(placed) => {
                    info!(
                        order_id = placed.order.id,
                        total = placed.order.total,
                        discount = placed.order.discount,
                        points_earned = placed.order.points_earned,
                        "Order placed"
                    );
                    self.feed.publish(LedgerEvent::OrderChanged {
                        order_id: placed.order.id,
                        account_id: account_id.clone(),
                        status: placed.order.status,
                    });
                    self.feed.publish(LedgerEvent::AccountChanged { account_id });
                    return Ok(placed);
                }
                Err(Error::Database(e)) if codes::is_unique_violation(&e) => {
                    warn!(attempt, "Pickup code collided with a pending order, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::CodeSpaceExhausted { attempts })
    }

    async fn try_submit(
        &self,
        request: &CheckoutRequest,
        account_id: &str,
        priced: Vec<PricedLine>,
        pickup_code: String,
    ) -> Result<OrderDetails> {
        let txn = self.db.begin().await?;

        let account = Account::find_by_id(account_id)
            .one(&txn)
            .await?
            .ok_or_else(|| Error::AccountNotFound {
                id: account_id.to_string(),
            })?;

        let quote = apply_reward(
            priced,
            &self.config.reward,
            account.loyalty_points,
            request.redeem_reward,
        )?;

        if request.payment_method == PaymentMethod::StoredValue && quote.total > account.balance {
            return Err(Error::InsufficientFunds {
                current: account.balance,
                required: quote.total,
            });
        }

        let placed = insert_order_in(
            &txn,
            account_id,
            &quote,
            request.payment_method,
            request.pickup.label(),
            pickup_code,
        )
        .await?;

        adjust_in(
            &txn,
            account_id,
            quote.balance_delta(request.payment_method),
            quote.points_delta(),
        )
        .await?;

        txn.commit().await?;
        Ok(placed)
    }
}
