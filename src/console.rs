//! Staff console - a line-oriented front end for counter terminals.
//!
//! Each line is parsed into a [`StaffCommand`], run against the [`Ledger`], and
//! answered with one message. Errors are turned into their user-facing text here so
//! conflicts read as "this code was already used" while storage failures read as a
//! retry prompt.

use crate::{
    core::{Ledger, order::OrderScope},
    errors::{Error, Result},
};
use std::fmt::Write;
use std::str::FromStr;
use tracing::{error, warn};

const HELP_TEXT: &str = "Commands:\n\
    \x20 deliver <pickup-code>     hand over a pending order\n\
    \x20 deliver-id <order-id>     hand over an order from the list\n\
    \x20 redeem <recharge-code>    take cash and credit a recharge code\n\
    \x20 pending [email]           list orders waiting for pickup\n\
    \x20 balance <email>           show balance and points\n\
    \x20 purge [email]             delete delivered orders\n\
    \x20 help                      show this message";

/// A parsed console command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaffCommand {
    /// Complete an order by pickup code
    Deliver(String),
    /// Complete an order by id
    DeliverId(i64),
    /// Redeem a recharge code
    Redeem(String),
    /// List pending orders
    Pending(Option<String>),
    /// Show an account's balance and points
    Balance(String),
    /// Delete completed orders
    Purge(Option<String>),
    /// Show usage
    Help,
}

impl FromStr for StaffCommand {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let command = words.next().unwrap_or("help").to_lowercase();
        let argument = words.next().map(str::to_string);

        if words.next().is_some() {
            return Err(Error::validation("Too many arguments, try `help`"));
        }

        let required = |name: &str| {
            argument
                .clone()
                .ok_or_else(|| Error::validation(format!("`{name}` needs an argument")))
        };

        match command.as_str() {
            "deliver" => Ok(Self::Deliver(required("deliver")?)),
            "deliver-id" => required("deliver-id")?
                .parse()
                .map(Self::DeliverId)
                .map_err(|_| Error::validation("Order id must be a number")),
            "redeem" => Ok(Self::Redeem(required("redeem")?)),
            "pending" => Ok(Self::Pending(argument)),
            "balance" => Ok(Self::Balance(required("balance")?)),
            "purge" => Ok(Self::Purge(argument)),
            "help" => Ok(Self::Help),
            other => Err(Error::validation(format!(
                "Unknown command `{other}`, try `help`"
            ))),
        }
    }
}

fn scope_for(account: Option<String>) -> OrderScope {
    account.map_or(OrderScope::All, OrderScope::Account)
}

/// Runs one command and returns the reply text.
pub async fn execute(ledger: &Ledger, command: StaffCommand) -> Result<String> {
    match command {
        StaffCommand::Deliver(code) => {
            let order = ledger.fulfillment.complete_by_code(&code).await?;
            let details = ledger.orders.get(order.id).await?;
            Ok(format!(
                "✅ Order {} delivered ({} items, {} UC)",
                order.pickup_code,
                details.lines.iter().map(|line| line.quantity).sum::<i64>(),
                order.total
            ))
        }
        StaffCommand::DeliverId(order_id) => {
            let order = ledger.fulfillment.complete_by_id(order_id).await?;
            Ok(format!("✅ Order #{} delivered", order.id))
        }
        StaffCommand::Redeem(code) => {
            let account = ledger.fulfillment.redeem_recharge(&code).await?;
            Ok(format!(
                "✅ Recharge applied to {}. New balance: {} UC",
                account.name, account.balance
            ))
        }
        StaffCommand::Pending(account) => {
            let orders = ledger.orders.pending(&scope_for(account)).await?;
            if orders.is_empty() {
                return Ok("No orders waiting for pickup.".to_string());
            }
            let mut reply = format!("{} order(s) waiting:\n", orders.len());
            for order in &orders {
                writeln!(
                    reply,
                    "  #{} {} | {} | {} UC | {}",
                    order.id, order.pickup_code, order.account_id, order.total, order.pickup_time
                )
                .map_err(|e| Error::validation(e.to_string()))?;
            }
            Ok(reply.trim_end().to_string())
        }
        StaffCommand::Balance(account_id) => {
            let account = ledger.accounts.get(&account_id).await?;
            Ok(format!(
                "{} ({}): {} UC, {} pts",
                account.name, account.id, account.balance, account.loyalty_points
            ))
        }
        StaffCommand::Purge(account) => {
            let count = ledger.fulfillment.purge_completed(&scope_for(account)).await?;
            Ok(format!("🧹 Removed {count} delivered order(s) from history."))
        }
        StaffCommand::Help => Ok(HELP_TEXT.to_string()),
    }
}

/// Parses and runs one input line, always producing a reply.
pub async fn handle_line(ledger: &Ledger, line: &str) -> String {
    let outcome = match line.parse::<StaffCommand>() {
        Ok(command) => execute(ledger, command).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(reply) => reply,
        Err(e) => {
            if e.is_retryable() {
                error!("Console command `{}` failed: {}", line.trim(), e);
            } else {
                warn!("Console command `{}` rejected: {}", line.trim(), e);
            }
            format!("❌ {}", e.user_message())
        }
    }
}
