/// Database configuration and connection management
pub mod database;

/// Ledger rules, service hours and menu loaded from config.toml
pub mod ledger;

pub use ledger::{LedgerConfig, MenuItemConfig, RechargeConfig, RewardConfig, ServiceHours};
