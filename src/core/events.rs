//! Change notifications for committed ledger writes.
//!
//! Services publish a [`LedgerEvent`] after their transaction commits. Subscribers
//! pick a [`Scope`] and receive only the events relevant to it. Delivery is
//! best-effort: a subscriber that falls behind the channel capacity gets a single
//! [`Notice::Resync`] and must reload whatever it renders from the store.

use crate::core::account::normalize_account_id;
use crate::entities::{OrderStatus, RechargeStatus};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, trace, warn};

/// A committed change in the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    /// Balance or points of an account changed
    AccountChanged {
        /// Account that changed
        account_id: String,
    },
    /// An order was created or changed status
    OrderChanged {
        /// Order that changed
        order_id: i64,
        /// Owner of the order
        account_id: String,
        /// Status after the change
        status: OrderStatus,
    },
    /// Completed orders were deleted
    OrdersPurged {
        /// Account the purge was limited to, `None` for all accounts
        account_id: Option<String>,
        /// Number of orders deleted
        count: u64,
    },
    /// A recharge request was issued or redeemed
    RechargeChanged {
        /// Request that changed
        request_id: i64,
        /// Account the request credits
        account_id: String,
        /// Status after the change
        status: RechargeStatus,
    },
}

/// What a subscriber wants to hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Balance, points and recharge changes of one account
    Account(String),
    /// Every order change (staff dashboard)
    AllOrders,
    /// Order changes of one account (customer device)
    AccountOrders(String),
}

impl Scope {
    /// The same scope with its account id in stored form.
    #[must_use]
    pub fn normalized(self) -> Self {
        match self {
            Self::Account(id) => Self::Account(normalize_account_id(&id)),
            Self::AccountOrders(id) => Self::AccountOrders(normalize_account_id(&id)),
            Self::AllOrders => Self::AllOrders,
        }
    }

    /// Whether `event` belongs to this scope.
    #[must_use]
    pub fn matches(&self, event: &LedgerEvent) -> bool {
        match (self, event) {
            (
                Self::Account(id),
                LedgerEvent::AccountChanged { account_id }
                | LedgerEvent::RechargeChanged { account_id, .. },
            )
            | (Self::AccountOrders(id), LedgerEvent::OrderChanged { account_id, .. }) => {
                id == account_id
            }
            (Self::AllOrders, LedgerEvent::OrderChanged { .. } | LedgerEvent::OrdersPurged { .. }) => {
                true
            }
            (Self::AccountOrders(id), LedgerEvent::OrdersPurged { account_id, .. }) => {
                account_id.as_ref().is_none_or(|purged| purged == id)
            }
            _ => false,
        }
    }
}

/// What a subscription yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// An event in the subscribed scope
    Changed(LedgerEvent),
    /// Events were dropped; reload from the store
    Resync,
}

/// Publish side of the notification channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<LedgerEvent>,
}

impl ChangeFeed {
    /// Creates a feed buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Sends `event` to current subscribers. Having none is not an error.
    pub fn publish(&self, event: LedgerEvent) {
        match self.sender.send(event) {
            Ok(receivers) => debug!(receivers, "Published ledger event"),
            Err(broadcast::error::SendError(event)) => {
                trace!(?event, "No subscribers for ledger event");
            }
        }
    }

    /// Starts listening for events in `scope` from now on.
    #[must_use]
    pub fn subscribe(&self, scope: Scope) -> Subscription {
        Subscription {
            scope: scope.normalized(),
            receiver: self.sender.subscribe(),
        }
    }
}

/// Receive side bound to one [`Scope`].
#[derive(Debug)]
pub struct Subscription {
    scope: Scope,
    receiver: broadcast::Receiver<LedgerEvent>,
}

impl Subscription {
    /// The scope this subscription filters on.
    #[must_use]
    pub const fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Waits for the next notice in scope. `None` once every feed handle is gone.
    pub async fn next(&mut self) -> Option<Notice> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.scope.matches(&event) => return Some(Notice::Changed(event)),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, scope = ?self.scope, "Subscriber lagged, requesting resync");
                    return Some(Notice::Resync);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next buffered notice in scope without waiting.
    pub fn try_next(&mut self) -> Option<Notice> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.scope.matches(&event) => return Some(Notice::Changed(event)),
                Ok(_) => {}
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, scope = ?self.scope, "Subscriber lagged, requesting resync");
                    return Some(Notice::Resync);
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }
}
