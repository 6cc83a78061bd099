//! User stats entity - The denormalized per-user cache of balance and counters.
//!
//! Every column can be rebuilt from `transactions` and `user_actions`; see
//! `core::stats::reconcile`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Cached stats row, one per user
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_stats")]
pub struct Model {
    /// Internal user key
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i64,
    /// Cached Bud balance
    pub buds_earned: i64,
    /// Number of logged actions
    pub total_actions_completed: i64,
    /// Total kg of CO2 saved across logged actions
    pub total_carbon_footprint: f64,
    /// Best run of consecutive active days
    pub streak_days: i32,
    /// Last time the row was written
    pub updated_at: DateTimeUtc,
}

/// Stats rows are keyed by user and have no declared relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
