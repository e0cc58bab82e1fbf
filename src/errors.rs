//! Unified error types for the ledger.
//!
//! Every ledger operation returns [`Result`]. Validation and conflict variants carry
//! enough context to build a specific message for the person at the counter, while
//! storage failures collapse into [`Error::Database`] and are always safe to retry
//! because each operation runs inside a single database transaction.

use sea_orm::DbErr;
use thiserror::Error;

/// All failures the ledger can report to its caller.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or out-of-policy input; nothing was written.
    #[error("Invalid input: {message}")]
    Validation {
        /// What was wrong with the input
        message: String,
    },

    /// The stored-value balance would go negative.
    #[error("Insufficient funds: balance {current} UC, required {required} UC")]
    InsufficientFunds {
        /// Balance at the time of the check
        current: i64,
        /// Amount the operation needed
        required: i64,
    },

    /// The loyalty point balance would go negative.
    #[error("Insufficient points: have {current}, required {required}")]
    InsufficientPoints {
        /// Points at the time of the check
        current: i64,
        /// Points the operation needed
        required: i64,
    },

    /// No account with this id.
    #[error("Account not found: {id}")]
    AccountNotFound {
        /// The requested account id
        id: String,
    },

    /// Registration attempted for an id that is already taken.
    #[error("Account already exists: {id}")]
    AccountExists {
        /// The conflicting account id
        id: String,
    },

    /// No order matches the given id or pickup code.
    #[error("Order not found: {reference}")]
    OrderNotFound {
        /// Order id or pickup code used for the lookup
        reference: String,
    },

    /// No recharge request carries this code.
    #[error("Recharge code not found: {code}")]
    RechargeNotFound {
        /// The code that was looked up
        code: String,
    },

    /// The order was already handed over.
    #[error("Order already fulfilled: {reference}")]
    AlreadyFulfilled {
        /// Order id or pickup code used for the lookup
        reference: String,
    },

    /// The recharge code was already redeemed.
    #[error("Recharge code already redeemed: {code}")]
    AlreadyRedeemed {
        /// The consumed code
        code: String,
    },

    /// Every generated code collided with a live one.
    #[error("Could not generate a unique code after {attempts} attempts")]
    CodeSpaceExhausted {
        /// Number of codes tried
        attempts: u32,
    },

    /// The account row changed between the conditional write and the re-read.
    #[error("Account {id} changed concurrently")]
    Contention {
        /// Account that was being adjusted
        id: String,
    },

    /// Configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem
        message: String,
    },

    /// The persistence layer failed or aborted the transaction.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// Console or file I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Builds a [`Error::Validation`] from anything string-like.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Whether the caller should simply try the same operation again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Contention { .. } | Self::CodeSpaceExhausted { .. }
        )
    }

    /// Message suitable for showing to a customer or staff member.
    ///
    /// Conflicts and validation failures get a specific, actionable message;
    /// transport failures get a generic retry prompt.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { message } => message.clone(),
            Self::InsufficientFunds { current, required } => {
                format!("Not enough balance: you have {current} UC but need {required} UC.")
            }
            Self::InsufficientPoints { current, required } => {
                format!("Not enough points: you have {current} pts but need {required} pts.")
            }
            Self::AccountNotFound { id } => format!("No account found for {id}."),
            Self::AccountExists { id } => format!("{id} is already registered."),
            Self::OrderNotFound { reference } => format!("No order found for code {reference}."),
            Self::RechargeNotFound { code } => format!("Recharge code {code} is not valid."),
            Self::AlreadyFulfilled { .. } => "This order was already delivered.".to_string(),
            Self::AlreadyRedeemed { .. } => "This code was already used.".to_string(),
            Self::CodeSpaceExhausted { .. }
            | Self::Contention { .. }
            | Self::Config { .. }
            | Self::Database(_)
            | Self::Io(_) => "Something went wrong, please try again.".to_string(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflicts_get_specific_messages() {
        let err = Error::AlreadyRedeemed {
            code: "UCOL-50-1234".to_string(),
        };
        assert_eq!(err.user_message(), "This code was already used.");
        assert!(!err.is_retryable());

        let err = Error::InsufficientFunds {
            current: 10,
            required: 35,
        };
        assert!(err.user_message().contains("35 UC"));
    }

    #[test]
    fn test_transport_errors_prompt_retry() {
        let err = Error::Database(DbErr::Custom("connection reset".to_string()));
        assert!(err.is_retryable());
        assert_eq!(err.user_message(), "Something went wrong, please try again.");
    }
}
