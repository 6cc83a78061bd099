//! Badge entity - Static badge catalog with data-driven eligibility rules.
//!
//! The rule is stored as three columns and interpreted by
//! `core::achievements::EligibilityRule::try_from`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Badge database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "badges")]
pub struct Model {
    /// Unique identifier for the badge
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Unique badge name (e.g. "Transit Champion")
    #[sea_orm(unique)]
    pub name: String,
    /// What the user did to earn it
    pub description: String,
    /// Buds credited once when the badge is earned
    pub buds_reward: i64,
    /// Rule type: `category_count`, `title_count`, `streak`, `cumulative_co2`,
    /// `category_days` or `manual`
    pub rule_kind: String,
    /// Category or title the rule inspects, if any
    pub rule_subject: Option<String>,
    /// Value the rule's signal must reach
    pub threshold: f64,
}

/// One badge is held by many users
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Users holding this badge
    #[sea_orm(has_many = "super::user_badge::Entity")]
    UserBadges,
}

impl Related<super::user_badge::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserBadges.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
