//! Ledger store and balance calculator.
//!
//! This module owns the `transactions` table: an append-only record of every Bud a user
//! earned or spent. Rows are only ever inserted. Every amount is positive and the
//! direction of the movement lives in [`TransactionKind`], so a user's balance is always
//! `sum(earned) - sum(spent)` over their rows.
//!
//! All functions are generic over [`ConnectionTrait`] so they can run on a plain
//! connection or inside a caller's database transaction.

use crate::{
    entities::{Transaction, transaction},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, QuerySelect, Set, prelude::*};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use tracing::{debug, error, instrument};

/// Direction of a ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Buds credited to the user
    Earned,
    /// Buds debited from the user
    Spent,
}

impl TransactionKind {
    /// Value stored in the `kind` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Earned => "earned",
            Self::Spent => "spent",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "earned" => Ok(Self::Earned),
            "spent" => Ok(Self::Spent),
            other => Err(Error::UnknownTransactionKind {
                kind: other.to_string(),
            }),
        }
    }
}

/// Appends a transaction to the ledger.
///
/// This is the only write path into the `transactions` table. It does not look at the
/// balance: authorizing a spend is the orchestrator's job, which performs the check and
/// this append inside one database transaction.
///
/// # Errors
/// Returns [`Error::InvalidAmount`] if `amount` is zero or negative (nothing is written),
/// or a database error if the insert fails.
#[instrument(skip(db, description))]
pub async fn append<C>(
    db: &C,
    user_id: i64,
    kind: TransactionKind,
    amount: i64,
    description: String,
) -> Result<transaction::Model>
where
    C: ConnectionTrait,
{
    if amount <= 0 {
        return Err(Error::InvalidAmount { amount });
    }

    let transaction_model = transaction::ActiveModel {
        user_id: Set(user_id),
        kind: Set(kind.as_str().to_string()),
        amount: Set(amount),
        description: Set(description),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    let result = transaction_model.insert(db).await?;
    debug!(transaction_id = result.id, "Appended {} transaction", kind);
    Ok(result)
}

/// Retrieves all transactions for a user, newest first.
///
/// Rows written within the same timestamp are ordered by id so the most recent append
/// still comes first.
pub async fn list_by_user<C>(db: &C, user_id: i64) -> Result<Vec<transaction::Model>>
where
    C: ConnectionTrait,
{
    Transaction::find()
        .filter(transaction::Column::UserId.eq(user_id))
        .order_by_desc(transaction::Column::CreatedAt)
        .order_by_desc(transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a specific transaction by its unique ID.
pub async fn get_transaction_by_id<C>(
    db: &C,
    transaction_id: i64,
) -> Result<Option<transaction::Model>>
where
    C: ConnectionTrait,
{
    Transaction::find_by_id(transaction_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Ids of every user with at least one ledger row.
pub async fn list_user_ids<C>(db: &C) -> Result<Vec<i64>>
where
    C: ConnectionTrait,
{
    Transaction::find()
        .select_only()
        .column(transaction::Column::UserId)
        .distinct()
        .into_tuple::<i64>()
        .all(db)
        .await
        .map_err(Into::into)
}

/// Raw sums of a user's ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerTotals {
    /// Sum of earned amounts
    pub earned: i64,
    /// Sum of spent amounts
    pub spent: i64,
}

impl LedgerTotals {
    /// Folds a list of transactions into totals.
    ///
    /// # Errors
    /// Returns [`Error::UnknownTransactionKind`] if a row carries an unrecognized kind.
    pub fn fold(transactions: &[transaction::Model]) -> Result<Self> {
        transactions.iter().try_fold(Self::default(), |totals, tx| {
            Ok(match tx.kind.parse::<TransactionKind>()? {
                TransactionKind::Earned => Self {
                    earned: totals.earned.saturating_add(tx.amount),
                    ..totals
                },
                TransactionKind::Spent => Self {
                    spent: totals.spent.saturating_add(tx.amount),
                    ..totals
                },
            })
        })
    }

    /// `earned - spent`, which may be negative for a corrupted ledger.
    #[must_use]
    pub const fn net(&self) -> i64 {
        self.earned.saturating_sub(self.spent)
    }

    /// The balance clamped at zero.
    #[must_use]
    pub const fn balance(&self) -> i64 {
        let net = self.net();
        if net < 0 { 0 } else { net }
    }

    /// Whether the ledger folds to a negative balance.
    #[must_use]
    pub const fn is_corrupt(&self) -> bool {
        self.net() < 0
    }

    /// Returns the net balance, or [`Error::BalanceCorruption`] if it is negative.
    pub fn check(&self, user_id: i64) -> Result<i64> {
        if self.is_corrupt() {
            Err(Error::BalanceCorruption {
                user_id,
                earned: self.earned,
                spent: self.spent,
            })
        } else {
            Ok(self.net())
        }
    }
}

/// Reads and folds every transaction of a user.
pub async fn ledger_totals<C>(db: &C, user_id: i64) -> Result<LedgerTotals>
where
    C: ConnectionTrait,
{
    let transactions = list_by_user(db, user_id).await?;
    LedgerTotals::fold(&transactions)
}

/// Computes the authoritative balance of a user from the ledger.
///
/// A negative fold can only come from rows written outside the orchestrator. It is
/// clamped to 0 and logged as [`Error::BalanceCorruption`] so the reconciliation sweep
/// can report it; callers never see a negative balance.
pub async fn compute_balance<C>(db: &C, user_id: i64) -> Result<i64>
where
    C: ConnectionTrait,
{
    let totals = ledger_totals(db, user_id).await?;
    if let Err(corruption) = totals.check(user_id) {
        error!("{corruption}; reporting a balance of 0");
    }
    Ok(totals.balance())
}
