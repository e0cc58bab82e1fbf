//! Core business logic - framework-agnostic ledger operations.
//!
//! Each component holds its own clone of the database handle and change feed.
//! [`Ledger`] builds them all once at start-up so callers pass one value around,
//! and tests can build it over an in-memory database.

pub mod account;
pub mod catalog;
pub mod checkout;
pub mod codes;
pub mod events;
pub mod fulfillment;
pub mod order;
pub mod recharge;

use crate::config::LedgerConfig;
use account::AccountStore;
use catalog::Catalog;
use checkout::Checkout;
use events::{ChangeFeed, Scope, Subscription};
use fulfillment::FulfillmentService;
use order::OrderLedger;
use recharge::RechargeRegistry;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// All ledger components wired to one store and one change feed.
#[derive(Debug, Clone)]
pub struct Ledger {
    /// Balances and points
    pub accounts: AccountStore,
    /// Order lookups and listings
    pub orders: OrderLedger,
    /// Recharge code issuing and lookup
    pub recharges: RechargeRegistry,
    /// Staff operations
    pub fulfillment: FulfillmentService,
    /// Order placement
    pub checkout: Checkout,
    feed: ChangeFeed,
}

impl Ledger {
    /// Wires every component to `db`.
    #[must_use]
    pub fn new(db: DatabaseConnection, config: LedgerConfig, catalog: Arc<dyn Catalog>) -> Self {
        let feed = ChangeFeed::new(config.feed_capacity);
        let config = Arc::new(config);

        Self {
            accounts: AccountStore::new(db.clone(), feed.clone(), config.starting_balance),
            orders: OrderLedger::new(db.clone()),
            recharges: RechargeRegistry::new(
                db.clone(),
                feed.clone(),
                config.recharge.clone(),
                config.code_attempts,
            ),
            fulfillment: FulfillmentService::new(db.clone(), feed.clone()),
            checkout: Checkout::new(db, feed.clone(), catalog, config),
            feed,
        }
    }

    /// Subscribes to committed changes in `scope`.
    #[must_use]
    pub fn subscribe(&self, scope: Scope) -> Subscription {
        self.feed.subscribe(scope)
    }
}
