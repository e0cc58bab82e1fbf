//! Account business logic - registration, lookup and balance/points adjustment.
//!
//! The only way to move money or points is [`adjust_in`], a single conditional
//! `UPDATE` that applies both deltas together and only when neither field would go
//! negative. Checkout and recharge redemption call it inside their own transaction;
//! [`AccountStore::adjust`] wraps it for standalone use and publishes the change.

use crate::{
    core::codes,
    core::events::{ChangeFeed, LedgerEvent},
    entities::{Account, account},
    errors::{Error, Result},
};
use sea_orm::{Set, prelude::*, sea_query::Expr};
use tracing::{info, instrument};

/// Registration data for a new account
#[derive(Debug, Clone, Default)]
pub struct NewAccount {
    /// Email used as the account key
    pub id: String,
    /// Display name
    pub name: String,
    /// School
    pub school: String,
    /// Grade
    pub grade: String,
    /// Class group
    pub group_name: String,
}

/// Account keys are case-insensitive emails.
#[must_use]
pub fn normalize_account_id(id: &str) -> String {
    id.trim().to_lowercase()
}

/// Atomically adds `balance_delta` and `points_delta` to an account.
///
/// Runs as one statement:
/// `UPDATE accounts SET balance = balance + Δb, loyalty_points = loyalty_points + Δp
///  WHERE id = ? AND balance >= -Δb AND loyalty_points >= -Δp`
/// with an upper bound so a credit can never overflow the column.
/// When no row matches, the current row is re-read to report why.
pub async fn adjust_in<C>(
    db: &C,
    account_id: &str,
    balance_delta: i64,
    points_delta: i64,
) -> Result<account::Model>
where
    C: ConnectionTrait,
{
    let (Some(min_balance), Some(min_points)) =
        (balance_delta.checked_neg(), points_delta.checked_neg())
    else {
        return Err(Error::validation("Adjustment is out of range"));
    };

    let result = Account::update_many()
        .col_expr(
            account::Column::Balance,
            Expr::col(account::Column::Balance).add(balance_delta),
        )
        .col_expr(
            account::Column::LoyaltyPoints,
            Expr::col(account::Column::LoyaltyPoints).add(points_delta),
        )
        .filter(account::Column::Id.eq(account_id))
        .filter(account::Column::Balance.gte(min_balance))
        .filter(account::Column::Balance.lte(i64::MAX - balance_delta.max(0)))
        .filter(account::Column::LoyaltyPoints.gte(min_points))
        .filter(account::Column::LoyaltyPoints.lte(i64::MAX - points_delta.max(0)))
        .exec(db)
        .await?;

    let current = Account::find_by_id(account_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::AccountNotFound {
            id: account_id.to_string(),
        })?;

    if result.rows_affected == 0 {
        return Err(rejection_reason(&current, balance_delta, points_delta));
    }

    Ok(current)
}

/// Why a conditional adjustment matched no row, judged against the re-read `current`.
///
/// If `current` would accept the deltas, the row changed between the write and the
/// re-read.
fn rejection_reason(current: &account::Model, balance_delta: i64, points_delta: i64) -> Error {
    let (Some(balance), Some(points)) = (
        current.balance.checked_add(balance_delta),
        current.loyalty_points.checked_add(points_delta),
    ) else {
        return Error::validation("Adjustment is out of range");
    };

    if balance < 0 {
        return Error::InsufficientFunds {
            current: current.balance,
            required: balance_delta.saturating_neg(),
        };
    }
    if points < 0 {
        return Error::InsufficientPoints {
            current: current.loyalty_points,
            required: points_delta.saturating_neg(),
        };
    }
    Error::Contention {
        id: current.id.clone(),
    }
}

/// Handle on the accounts table.
#[derive(Debug, Clone)]
pub struct AccountStore {
    db: DatabaseConnection,
    feed: ChangeFeed,
    starting_balance: i64,
}

impl AccountStore {
    /// Creates the store; new accounts receive `starting_balance` UC.
    #[must_use]
    pub const fn new(db: DatabaseConnection, feed: ChangeFeed, starting_balance: i64) -> Self {
        Self {
            db,
            feed,
            starting_balance,
        }
    }

    /// Registers a new account with the starting balance and zero points.
    #[instrument(skip(self, new_account), fields(account_id = %new_account.id))]
    pub async fn register(&self, new_account: NewAccount) -> Result<account::Model> {
        let id = normalize_account_id(&new_account.id);
        if id.is_empty() || !id.contains('@') {
            return Err(Error::validation("Account id must be an email address"));
        }
        if new_account.name.trim().is_empty() {
            return Err(Error::validation("Name cannot be empty"));
        }

        if Account::find_by_id(id.as_str()).one(&self.db).await?.is_some() {
            return Err(Error::AccountExists { id });
        }

        let model = account::ActiveModel {
            id: Set(id.clone()),
            name: Set(new_account.name.trim().to_string()),
            balance: Set(self.starting_balance),
            loyalty_points: Set(0),
            school: Set(new_account.school),
            grade: Set(new_account.grade),
            group_name: Set(new_account.group_name),
            created_at: Set(chrono::Utc::now()),
        };

        let created = match model.insert(&self.db).await {
            Ok(created) => created,
            Err(e) if codes::is_unique_violation(&e) => return Err(Error::AccountExists { id }),
            Err(e) => return Err(e.into()),
        };

        info!(balance = created.balance, "Account registered");
        self.feed.publish(LedgerEvent::AccountChanged {
            account_id: created.id.clone(),
        });
        Ok(created)
    }

    /// Fetches an account, failing with [`Error::AccountNotFound`] if absent.
    pub async fn get(&self, account_id: &str) -> Result<account::Model> {
        let id = normalize_account_id(account_id);
        Account::find_by_id(id.as_str())
            .one(&self.db)
            .await?
            .ok_or(Error::AccountNotFound { id })
    }

    /// Applies both deltas atomically and returns the new snapshot.
    #[instrument(skip(self))]
    pub async fn adjust(
        &self,
        account_id: &str,
        balance_delta: i64,
        points_delta: i64,
    ) -> Result<account::Model> {
        let id = normalize_account_id(account_id);
        let updated = adjust_in(&self.db, &id, balance_delta, points_delta).await?;
        info!(
            balance = updated.balance,
            loyalty_points = updated.loyalty_points,
            "Account adjusted"
        );
        self.feed.publish(LedgerEvent::AccountChanged { account_id: id });
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::events::{Notice, Scope};
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_register_validation() -> Result<()> {
        let db = setup_test_db().await?;
        let store = AccountStore::new(db, ChangeFeed::new(4), 50);

        let result = store
            .register(NewAccount {
                id: "not-an-email".to_string(),
                name: "Ana".to_string(),
                ..NewAccount::default()
            })
            .await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = store
            .register(NewAccount {
                id: "ana@ucol.mx".to_string(),
                name: "   ".to_string(),
                ..NewAccount::default()
            })
            .await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_register_defaults() -> Result<()> {
        let (_db, ledger) = setup_ledger().await?;

        let account = create_test_account(&ledger, " Ana@UCOL.mx ").await?;
        assert_eq!(account.id, "ana@ucol.mx");
        assert_eq!(account.balance, 50);
        assert_eq!(account.loyalty_points, 0);

        let fetched = ledger.accounts.get("ANA@ucol.mx").await?;
        assert_eq!(fetched, account);

        Ok(())
    }

    #[tokio::test]
    async fn test_register_duplicate_fails() -> Result<()> {
        let (_db, ledger) = setup_ledger().await?;
        create_test_account(&ledger, "ana@ucol.mx").await?;

        let result = create_test_account(&ledger, "ana@ucol.mx").await;
        assert!(matches!(result, Err(Error::AccountExists { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_get_missing_account() -> Result<()> {
        let (_db, ledger) = setup_ledger().await?;
        let result = ledger.accounts.get("nobody@ucol.mx").await;
        assert!(matches!(result, Err(Error::AccountNotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_adjust_applies_both_deltas() -> Result<()> {
        let (_db, ledger) = setup_ledger().await?;
        create_test_account(&ledger, "ana@ucol.mx").await?;

        let account = ledger.accounts.adjust("ana@ucol.mx", -20, 35).await?;
        assert_eq!(account.balance, 30);
        assert_eq!(account.loyalty_points, 35);

        Ok(())
    }

    #[tokio::test]
    async fn test_adjust_rejects_negative_balance_without_touching_points() -> Result<()> {
        let (_db, ledger) = setup_ledger().await?;
        create_test_account(&ledger, "ana@ucol.mx").await?;

        let result = ledger.accounts.adjust("ana@ucol.mx", -51, 10).await;
        assert!(matches!(
            result,
            Err(Error::InsufficientFunds {
                current: 50,
                required: 51
            })
        ));

        let account = ledger.accounts.get("ana@ucol.mx").await?;
        assert_eq!(account.balance, 50);
        assert_eq!(account.loyalty_points, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_adjust_rejects_negative_points() -> Result<()> {
        let (_db, ledger) = setup_ledger().await?;
        create_test_account(&ledger, "ana@ucol.mx").await?;

        let result = ledger.accounts.adjust("ana@ucol.mx", 10, -1).await;
        assert!(matches!(
            result,
            Err(Error::InsufficientPoints {
                current: 0,
                required: 1
            })
        ));

        let account = ledger.accounts.get("ana@ucol.mx").await?;
        assert_eq!(account.balance, 50);

        Ok(())
    }

    #[tokio::test]
    async fn test_adjust_missing_account() -> Result<()> {
        let (_db, ledger) = setup_ledger().await?;
        let result = ledger.accounts.adjust("ghost@ucol.mx", 10, 0).await;
        assert!(matches!(result, Err(Error::AccountNotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_adjust_rejects_out_of_range_deltas() -> Result<()> {
        let (_db, ledger) = setup_ledger().await?;
        create_test_account(&ledger, "ana@ucol.mx").await?;

        let result = ledger.accounts.adjust("ana@ucol.mx", i64::MIN, 0).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = ledger.accounts.adjust("ana@ucol.mx", 0, i64::MIN).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = ledger.accounts.adjust("ana@ucol.mx", i64::MAX, 0).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let account = ledger.accounts.get("ana@ucol.mx").await?;
        assert_eq!(account.balance, 50);
        assert_eq!(account.loyalty_points, 0);

        Ok(())
    }

    #[test]
    fn test_rejection_reason_reports_contention_when_row_would_pass() {
        let current = account::Model {
            id: "ana@ucol.mx".to_string(),
            name: "Ana".to_string(),
            balance: 50,
            loyalty_points: 10,
            school: String::new(),
            grade: String::new(),
            group_name: String::new(),
            created_at: chrono::Utc::now(),
        };

        assert!(matches!(
            rejection_reason(&current, -30, 5),
            Error::Contention { .. }
        ));
        assert!(matches!(
            rejection_reason(&current, -51, 5),
            Error::InsufficientFunds {
                current: 50,
                required: 51
            }
        ));
        assert!(matches!(
            rejection_reason(&current, 0, -11),
            Error::InsufficientPoints {
                current: 10,
                required: 11
            }
        ));
        assert!(matches!(
            rejection_reason(&current, i64::MAX, 0),
            Error::Validation { .. }
        ));
    }

    #[tokio::test]
    async fn test_concurrent_debits_never_overdraw() -> Result<()> {
        let (_db, ledger) = setup_ledger().await?;
        create_test_account(&ledger, "ana@ucol.mx").await?;

        let (first, second) = tokio::join!(
            ledger.accounts.adjust("ana@ucol.mx", -30, 0),
            ledger.accounts.adjust("ana@ucol.mx", -30, 0),
        );
        assert_eq!(
            usize::from(first.is_ok()) + usize::from(second.is_ok()),
            1
        );

        let account = ledger.accounts.get("ana@ucol.mx").await?;
        assert_eq!(account.balance, 20);

        Ok(())
    }

    #[tokio::test]
    async fn test_adjust_notifies_account_watchers() -> Result<()> {
        let (_db, ledger) = setup_ledger().await?;
        create_test_account(&ledger, "ana@ucol.mx").await?;
        let mut watcher = ledger.subscribe(Scope::Account("ana@ucol.mx".to_string()));

        ledger.accounts.adjust("ana@ucol.mx", 5, 0).await?;
        assert_eq!(
            watcher.try_next(),
            Some(Notice::Changed(LedgerEvent::AccountChanged {
                account_id: "ana@ucol.mx".to_string()
            }))
        );

        let _ = ledger.accounts.adjust("ana@ucol.mx", -500, 0).await;
        assert_eq!(watcher.try_next(), None);

        Ok(())
    }
}
