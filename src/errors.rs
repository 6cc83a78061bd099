//! Unified error type for the ledger, stats cache, action log and badge engine.
//!
//! Validation failures (`InvalidAmount`, `InsufficientBalance`) are meant for the caller to
//! show to the user. `BalanceCorruption` and `ReconciliationFailure` are logged and repaired by
//! the next reconciliation pass. `EstimatorUnavailable` never escapes `log_action`: the
//! orchestrator falls back to the rule-based estimator instead.

use thiserror::Error;

/// All failures the crate can report.
#[derive(Debug, Error)]
pub enum Error {
    /// A ledger amount was zero or negative
    #[error("Invalid amount: {amount} (amounts must be positive)")]
    InvalidAmount {
        /// The rejected amount
        amount: i64,
    },

    /// A spend exceeded the balance computed from the ledger
    #[error("Not enough Buds: balance is {current}, {required} required")]
    InsufficientBalance {
        /// Balance at the time of the check
        current: i64,
        /// Amount the caller tried to spend
        required: i64,
    },

    /// An action submitted by the caller is incomplete
    #[error("Invalid action: {message}")]
    InvalidAction {
        /// What is missing
        message: String,
    },

    /// An external user id was empty
    #[error("Invalid external user id: '{external_id}'")]
    InvalidUserId {
        /// The rejected id
        external_id: String,
    },

    /// The ledger folds to a negative balance
    #[error("Balance corruption for user {user_id}: earned {earned}, spent {spent}")]
    BalanceCorruption {
        /// Affected user
        user_id: i64,
        /// Sum of earned transactions
        earned: i64,
        /// Sum of spent transactions
        spent: i64,
    },

    /// A read needed to rebuild the stats cache failed; the cached row was left untouched
    #[error("Reconciliation failed for user {user_id}: {message}")]
    ReconciliationFailure {
        /// Affected user
        user_id: i64,
        /// Underlying failure
        message: String,
    },

    /// A stored transaction carries a kind other than `earned` or `spent`
    #[error("Unknown transaction kind: {kind}")]
    UnknownTransactionKind {
        /// The stored value
        kind: String,
    },

    /// The notification sink rejected a notice
    #[error("Notification failed: {message}")]
    NotificationFailed {
        /// Why delivery failed
        message: String,
    },

    /// The impact estimator could not produce an estimate
    #[error("Impact estimator unavailable: {message}")]
    EstimatorUnavailable {
        /// Why the estimator failed
        message: String,
    },

    /// No catalog action matches the reference
    #[error("Eco action not found: {reference}")]
    ActionNotFound {
        /// Id or title that was looked up
        reference: String,
    },

    /// No badge matches the reference
    #[error("Badge not found: {name}")]
    BadgeNotFound {
        /// Name or id that was looked up
        name: String,
    },

    /// No reward item matches the reference
    #[error("Reward item not found: {name}")]
    RewardItemNotFound {
        /// Name or id that was looked up
        name: String,
    },

    /// A stored badge rule could not be interpreted
    #[error("Invalid eligibility rule for badge '{badge}': {message}")]
    InvalidRule {
        /// Badge carrying the rule
        badge: String,
        /// What is wrong with it
        message: String,
    },

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem
        message: String,
    },

    /// Failure reported by the data store
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl Error {
    /// Whether this failure is caused by caller input rather than system state.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidAmount { .. }
                | Self::InsufficientBalance { .. }
                | Self::InvalidAction { .. }
                | Self::InvalidUserId { .. }
        )
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_balance_message() {
        let err = Error::InsufficientBalance {
            current: 10,
            required: 25,
        };
        assert!(err.to_string().starts_with("Not enough Buds"));
        assert!(err.is_validation());
    }

    #[test]
    fn test_database_error_is_not_validation() {
        let err = Error::from(sea_orm::DbErr::Custom("boom".to_string()));
        assert!(!err.is_validation());
        assert_eq!(err.to_string(), "Database error: Custom Error: boom");
    }
}
