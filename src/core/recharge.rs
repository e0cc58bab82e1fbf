//! Recharge request registry - top-up codes issued to account holders.
//!
//! Issuing a code never touches the balance; the account is credited only when
//! staff redeem it through [`crate::core::fulfillment::FulfillmentService::redeem_recharge`].

use crate::{
    config::RechargeConfig,
    core::account::normalize_account_id,
    core::codes,
    core::events::{ChangeFeed, LedgerEvent},
    entities::{Account, RechargeRequest, RechargeStatus, recharge_request},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::{info, instrument, warn};

/// Handle on the recharge requests table.
#[derive(Debug, Clone)]
pub struct RechargeRegistry {
    db: DatabaseConnection,
    feed: ChangeFeed,
    settings: RechargeConfig,
    code_attempts: u32,
}

impl RechargeRegistry {
    /// Creates the registry.
    #[must_use]
    pub const fn new(
        db: DatabaseConnection,
        feed: ChangeFeed,
        settings: RechargeConfig,
        code_attempts: u32,
    ) -> Self {
        Self {
            db,
            feed,
            settings,
            code_attempts,
        }
    }

    /// Issues a pending recharge code for `amount` UC.
    #[instrument(skip(self))]
    pub async fn issue(&self, account_id: &str, amount: i64) -> Result<recharge_request::Model> {
        if amount <= 0 {
            return Err(Error::validation("Recharge amount must be positive"));
        }
        if amount > self.settings.max_amount {
            return Err(Error::validation(format!(
                "Recharge amount cannot exceed {} UC",
                self.settings.max_amount
            )));
        }

        let account_id = normalize_account_id(account_id);
        if Account::find_by_id(account_id.as_str())
            .one(&self.db)
            .await?
            .is_none()
        {
            return Err(Error::AccountNotFound { id: account_id });
        }

        for attempt in 1..=self.code_attempts {
            let request = recharge_request::ActiveModel {
                code: Set(codes::recharge_code(
                    &self.settings.prefix,
                    amount,
                    self.settings.suffix_digits,
                )),
                amount: Set(amount),
                account_id: Set(account_id.clone()),
                status: Set(RechargeStatus::Pending),
                created_at: Set(chrono::Utc::now()),
                processed_at: Set(None),
                ..Default::default()
            };

            match request.insert(&self.db).await {
                Ok(created) => {
                    info!(code = %created.code, "Recharge code issued");
                    self.feed.publish(LedgerEvent::RechargeChanged {
                        request_id: created.id,
                        account_id: created.account_id.clone(),
                        status: created.status,
                    });
                    return Ok(created);
                }
                Err(e) if codes::is_unique_violation(&e) => {
                    warn!(attempt, "Recharge code collided with an existing one, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(Error::CodeSpaceExhausted {
            attempts: self.code_attempts,
        })
    }

    /// Looks up a request by its exact code.
    pub async fn find_by_code(&self, code: &str) -> Result<Option<recharge_request::Model>> {
        RechargeRequest::find()
            .filter(recharge_request::Column::Code.eq(code.trim()))
            .one(&self.db)
            .await
            .map_err(Into::into)
    }

    /// All requests of an account, newest first.
    pub async fn list_for_account(
        &self,
        account_id: &str,
    ) -> Result<Vec<recharge_request::Model>> {
        RechargeRequest::find()
            .filter(recharge_request::Column::AccountId.eq(normalize_account_id(account_id)))
            .order_by_desc(recharge_request::Column::CreatedAt)
            .order_by_desc(recharge_request::Column::Id)
            .all(&self.db)
            .await
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::events::{Notice, Scope};
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_issue_validation() -> Result<()> {
        let db = setup_test_db().await?;
        let registry = RechargeRegistry::new(db, ChangeFeed::new(4), RechargeConfig::default(), 4);

        for amount in [0, -5, 10_001] {
            let result = registry.issue("ana@ucol.mx", amount).await;
            assert!(matches!(result, Err(Error::Validation { .. })));
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_issue_does_not_touch_balance() -> Result<()> {
        let (_db, ledger) = setup_ledger().await?;
        create_test_account(&ledger, "ana@ucol.mx").await?;

        let request = ledger.recharges.issue("ana@ucol.mx", 50).await?;
        assert!(request.code.starts_with("UCOL-50-"));
        assert_eq!(request.amount, 50);
        assert_eq!(request.status, RechargeStatus::Pending);
        assert!(request.processed_at.is_none());

        let account = ledger.accounts.get("ana@ucol.mx").await?;
        assert_eq!(account.balance, 50);

        let found = ledger.recharges.find_by_code(&request.code).await?;
        assert_eq!(found, Some(request));

        Ok(())
    }

    #[tokio::test]
    async fn test_issue_for_unknown_account() -> Result<()> {
        let (_db, ledger) = setup_ledger().await?;
        let result = ledger.recharges.issue("ghost@ucol.mx", 50).await;
        assert!(matches!(result, Err(Error::AccountNotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_codes_stay_unique_in_a_tiny_code_space() -> Result<()> {
        let (db, ledger) = setup_ledger().await?;
        create_test_account(&ledger, "ana@ucol.mx").await?;

        // One suffix digit leaves nine codes per amount.
        let settings = RechargeConfig {
            suffix_digits: 1,
            ..RechargeConfig::default()
        };
        let registry = RechargeRegistry::new(db, ChangeFeed::new(4), settings, 200);

        let mut issued = Vec::new();
        for _ in 0..9 {
            issued.push(registry.issue("ana@ucol.mx", 20).await?.code);
        }
        issued.sort();
        issued.dedup();
        assert_eq!(issued.len(), 9);

        let result = registry.issue("ana@ucol.mx", 20).await;
        assert!(matches!(
            result,
            Err(Error::CodeSpaceExhausted { attempts: 200 })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_list_for_account() -> Result<()> {
        let (_db, ledger) = setup_ledger().await?;
        create_test_account(&ledger, "ana@ucol.mx").await?;
        create_test_account(&ledger, "beto@ucol.mx").await?;

        let first = ledger.recharges.issue("ana@ucol.mx", 100).await?;
        let second = ledger.recharges.issue("ana@ucol.mx", 200).await?;
        ledger.recharges.issue("beto@ucol.mx", 300).await?;

        let requests = ledger.recharges.list_for_account("ana@ucol.mx").await?;
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].id, second.id);
        assert_eq!(requests[1].id, first.id);

        Ok(())
    }

    #[tokio::test]
    async fn test_issue_notifies_account_watchers() -> Result<()> {
        let (_db, ledger) = setup_ledger().await?;
        create_test_account(&ledger, "ana@ucol.mx").await?;
        let mut watcher = ledger.subscribe(Scope::Account("ana@ucol.mx".to_string()));

        let request = ledger.recharges.issue("ana@ucol.mx", 50).await?;
        assert_eq!(
            watcher.try_next(),
            Some(Notice::Changed(LedgerEvent::RechargeChanged {
                request_id: request.id,
                account_id: "ana@ucol.mx".to_string(),
                status: RechargeStatus::Pending,
            }))
        );

        Ok(())
    }
}
