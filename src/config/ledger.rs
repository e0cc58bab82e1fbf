//! Ledger configuration loading from config.toml
//!
//! Holds the business rules the ledger enforces (starting balance, reward cost and
//! cap, service hours, recharge code format) and the static menu used as the
//! catalog. Every field has a default, so a missing section or an empty file yields
//! the stock cafeteria rules.

use crate::errors::{Error, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Deserializer};
use std::path::Path;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Balance credited to every new account, in UC
    pub starting_balance: i64,
    /// Loyalty reward rule
    pub reward: RewardConfig,
    /// Window in which custom pickup times are accepted
    pub service_hours: ServiceHours,
    /// Recharge code format and limits
    pub recharge: RechargeConfig,
    /// Length of generated pickup codes
    pub pickup_code_length: usize,
    /// How many fresh codes to try before giving up on a collision streak
    pub code_attempts: u32,
    /// Buffered change notifications per subscriber before it must resync
    pub feed_capacity: usize,
    /// Static menu served as the catalog
    pub menu: Vec<MenuItemConfig>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            starting_balance: 50,
            reward: RewardConfig::default(),
            service_hours: ServiceHours::default(),
            recharge: RechargeConfig::default(),
            pickup_code_length: 6,
            code_attempts: 8,
            feed_capacity: 256,
            menu: Vec::new(),
        }
    }
}

/// Points-for-discount reward rule
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Points spent per redemption
    pub cost: i64,
    /// Largest discount one redemption can give, in UC
    pub max_discount: i64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            cost: 200,
            max_discount: 100,
        }
    }
}

/// Opening time and order cut-off for custom pickup times
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ServiceHours {
    /// Earliest accepted pickup time (`"HH:MM"` in the file)
    #[serde(deserialize_with = "hour_minute")]
    pub open: NaiveTime,
    /// Latest accepted pickup time, inclusive
    #[serde(deserialize_with = "hour_minute")]
    pub cutoff: NaiveTime,
}

impl Default for ServiceHours {
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(7, 0, 0).unwrap_or(NaiveTime::MIN),
            cutoff: NaiveTime::from_hms_opt(11, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl ServiceHours {
    /// Whether `time` falls inside the window, both ends inclusive.
    #[must_use]
    pub fn contains(&self, time: NaiveTime) -> bool {
        self.open <= time && time <= self.cutoff
    }
}

/// Recharge code settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RechargeConfig {
    /// Leading token of every recharge code
    pub prefix: String,
    /// Number of random digits at the end of the code
    pub suffix_digits: u32,
    /// Largest top-up a single code may carry, in UC
    pub max_amount: i64,
}

impl Default for RechargeConfig {
    fn default() -> Self {
        Self {
            prefix: "UCOL".to_string(),
            suffix_digits: 4,
            max_amount: 10_000,
        }
    }
}

/// One entry of the static menu
#[derive(Debug, Clone, Deserialize)]
pub struct MenuItemConfig {
    /// Catalog item id referenced by carts
    pub id: String,
    /// Display name
    pub name: String,
    /// Unit price in UC
    pub price: i64,
}

fn hour_minute<'de, D>(deserializer: D) -> std::result::Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    NaiveTime::parse_from_str(&raw, "%H:%M").map_err(serde::de::Error::custom)
}

impl LedgerConfig {
    /// Checks rules that cannot be expressed in the TOML types alone.
    pub fn validate(&self) -> Result<()> {
        if self.starting_balance < 0 {
            return Err(config_error("starting_balance must not be negative"));
        }
        if self.reward.cost <= 0 || self.reward.max_discount < 0 {
            return Err(config_error(
                "reward.cost must be positive and reward.max_discount not negative",
            ));
        }
        if self.service_hours.open > self.service_hours.cutoff {
            return Err(config_error("service_hours.open must not be after cutoff"));
        }
        if !(1..=9).contains(&self.recharge.suffix_digits) {
            return Err(config_error("recharge.suffix_digits must be between 1 and 9"));
        }
        if self.recharge.max_amount <= 0 {
            return Err(config_error("recharge.max_amount must be positive"));
        }
        if self.pickup_code_length == 0 || self.code_attempts == 0 {
            return Err(config_error(
                "pickup_code_length and code_attempts must be positive",
            ));
        }
        if let Some(item) = self.menu.iter().find(|item| item.price < 0) {
            return Err(config_error(&format!("menu item {} has a negative price", item.id)));
        }
        Ok(())
    }
}

fn config_error(message: &str) -> Error {
    Error::Config {
        message: message.to_string(),
    }
}

/// Loads and validates ledger configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A rule is inconsistent (see [`LedgerConfig::validate`])
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<LedgerConfig> {
    let path_ref = path.as_ref();
    tracing::debug!("Attempting to load configuration from: {:?}", path_ref);

    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;

    let config: LedgerConfig = toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse {}: {e}", path_ref.display()),
    })?;

    config.validate()?;
    Ok(config)
}

/// Loads configuration from `path` if it exists, otherwise the stock rules.
pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<LedgerConfig> {
    if path.as_ref().exists() {
        load_config(path)
    } else {
        tracing::info!(
            "No config file at {}, using default ledger rules",
            path.as_ref().display()
        );
        Ok(LedgerConfig::default())
    }
}
