//! Shared test utilities for the ledger.
//!
//! This module provides helpers for setting up an in-memory database, a ledger
//! with a small fixed menu, and test accounts and orders with sensible defaults.

use crate::{
    config::{LedgerConfig, MenuItemConfig},
    core::{
        Ledger,
        account::NewAccount,
        catalog::StaticCatalog,
        checkout::{CartLine, CheckoutRequest, PickupTime},
        order::OrderDetails,
    },
    entities::{self, PaymentMethod},
    errors::Result,
};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::sync::Arc;

/// Creates an in-memory `SQLite` database with all tables initialized.
///
/// The pool is pinned to a single connection: every `sqlite::memory:` connection
/// is its own database.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Ledger rules used by tests: stock rules plus a five-item menu.
///
/// # Menu
/// * `chilaquiles`: 55
/// * `pizzeta`: 35
/// * `torta`: 45
/// * `juice`: 25
/// * `water`: 20
pub fn test_config() -> LedgerConfig {
    let item = |id: &str, name: &str, price| MenuItemConfig {
        id: id.to_string(),
        name: name.to_string(),
        price,
    };
    LedgerConfig {
        menu: vec![
            item("chilaquiles", "Chilaquiles Rojos", 55),
            item("pizzeta", "Pizzeta", 35),
            item("torta", "Torta de Adobada", 45),
            item("juice", "Jugo de Naranja", 25),
            item("water", "Agua de Jamaica", 20),
        ],
        ..LedgerConfig::default()
    }
}

/// Catalog built from [`test_config`].
pub fn test_catalog() -> StaticCatalog {
    StaticCatalog::from_menu(&test_config().menu)
}

/// Sets up a fresh database and a ledger over it.
/// Returns (db, ledger) so tests can also inspect tables directly.
pub async fn setup_ledger() -> Result<(DatabaseConnection, Ledger)> {
    let db = setup_test_db().await?;
    let ledger = Ledger::new(db.clone(), test_config(), Arc::new(test_catalog()));
    Ok((db, ledger))
}

/// Registers a test account with the starting balance.
pub async fn create_test_account(
    ledger: &Ledger,
    email: &str,
) -> Result<entities::account::Model> {
    ledger
        .accounts
        .register(NewAccount {
            id: email.to_string(),
            name: "Test Student".to_string(),
            school: "Bachillerato 1".to_string(),
            grade: "3".to_string(),
            group_name: "B".to_string(),
        })
        .await
}

/// A cart line without a note.
pub fn cart_line(item_id: &str, quantity: i64) -> CartLine {
    CartLine {
        item_id: item_id.to_string(),
        quantity,
        note: None,
    }
}

/// Checkout request paid from the stored-value balance, pickup ASAP.
pub fn stored_value_request(
    account_id: &str,
    lines: Vec<CartLine>,
    redeem_reward: bool,
) -> CheckoutRequest {
    CheckoutRequest {
        account_id: account_id.to_string(),
        lines,
        pickup: PickupTime::Asap,
        payment_method: PaymentMethod::StoredValue,
        redeem_reward,
    }
}

/// Places a cash order, pickup ASAP, no reward.
pub async fn place_cash_order(
    ledger: &Ledger,
    account_id: &str,
    lines: Vec<CartLine>,
) -> Result<OrderDetails> {
    ledger
        .checkout
        .submit(CheckoutRequest {
            account_id: account_id.to_string(),
            lines,
            pickup: PickupTime::Asap,
            payment_method: PaymentMethod::Cash,
            redeem_reward: false,
        })
        .await
}
