//! User badge entity - Badges earned by users.
//!
//! The composite primary key `(user_id, badge_id)` is what makes an award happen at most
//! once. `payout_transaction_id` stays `None` until the badge reward has been credited.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Earned badge database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_badges")]
pub struct Model {
    /// Internal user key
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i64,
    /// Earned badge
    #[sea_orm(primary_key, auto_increment = false)]
    pub badge_id: i64,
    /// When the badge was first awarded
    pub earned_at: DateTimeUtc,
    /// Earned transaction paying the badge reward
    pub payout_transaction_id: Option<i64>,
}

/// Each award belongs to one badge
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// The awarded badge
    #[sea_orm(
        belongs_to = "super::badge::Entity",
        from = "Column::BadgeId",
        to = "super::badge::Column::Id"
    )]
    Badge,
}

impl Related<super::badge::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Badge.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
