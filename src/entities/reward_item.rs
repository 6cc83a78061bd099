//! Reward item entity - Merchandise and donations that can be bought with Buds.
//!
//! Items are templates: redeeming one appends a Spent transaction with the item name in
//! the description.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Reward item database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reward_items")]
pub struct Model {
    /// Unique identifier for the item
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Unique item name (e.g. "Plant a Tree")
    #[sea_orm(unique)]
    pub name: String,
    /// Short description shown to users
    pub description: String,
    /// `"merch"` or `"donation"`
    pub category: String,
    /// Price in Buds
    pub buds_cost: i64,
    /// Soft delete flag - retired items stay for history but cannot be redeemed
    pub is_deleted: bool,
}

/// Reward items have no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
