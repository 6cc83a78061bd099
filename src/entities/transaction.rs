//! Transaction entity - One row per Bud ledger event.
//!
//! The ledger is append-only: rows are inserted by `core::ledger::append` and never updated
//! or deleted. The sign of an event lives in `kind` (`"earned"` or `"spent"`); `amount`
//! is always positive.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Transaction database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Unique identifier for the transaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Internal key of the user owning the transaction
    #[sea_orm(indexed)]
    pub user_id: i64,
    /// `"earned"` or `"spent"`, see `core::ledger::TransactionKind`
    pub kind: String,
    /// Number of Buds moved, always positive
    pub amount: i64,
    /// Human-readable description (e.g. `"Earned badge: Eco Streak"`)
    pub description: String,
    /// When the transaction was appended
    pub created_at: DateTimeUtc,
}

/// Transactions have no declared relations; user keys live in `user_identities`
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
