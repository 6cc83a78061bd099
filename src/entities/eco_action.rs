//! Eco action entity - The catalog of known actions and their rewards.
//!
//! Catalog rows are seeded from configuration and read when a user logs a known action.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Catalog action database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "eco_actions")]
pub struct Model {
    /// Unique identifier for the catalog action
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Title shown to users (e.g. "Ate a meatless meal")
    #[sea_orm(unique)]
    pub title: String,
    /// Category used by badge rules
    pub category: String,
    /// Optional longer description
    pub description: Option<String>,
    /// Kg of CO2 saved each time the action is completed
    pub co2_saved: f64,
    /// Buds paid each time the action is completed
    pub buds_reward: i64,
}

/// One catalog action is referenced by many logged actions
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Logged completions of this action
    #[sea_orm(has_many = "super::user_action::Entity")]
    UserActions,
}

impl Related<super::user_action::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserActions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
