//! User action entity - The action log.
//!
//! One immutable row per completed eco action. Catalog actions carry `action_id`; custom
//! actions only carry their inline `title` and `category`. `transaction_id` points at the
//! Earned transaction written together with the row.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Logged action database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_actions")]
pub struct Model {
    /// Unique identifier for the logged action
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Internal key of the user who completed the action
    #[sea_orm(indexed)]
    pub user_id: i64,
    /// Catalog action this record refers to, `None` for custom actions
    pub action_id: Option<i64>,
    /// Action title, copied from the catalog or supplied by the user
    pub title: String,
    /// Action category (e.g. `"transportation"`, `"energy"`)
    pub category: String,
    /// When the action was completed
    pub completed_at: DateTimeUtc,
    /// Optional free-form notes
    pub notes: Option<String>,
    /// Buds awarded for this action
    pub buds_earned: i64,
    /// Kg of CO2 saved by this action
    pub co2_saved: f64,
    /// Paired Earned transaction, `None` when the action paid nothing
    pub transaction_id: Option<i64>,
}

/// Defines relationships between logged actions and the catalog
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each logged action may reference one catalog action
    #[sea_orm(
        belongs_to = "super::eco_action::Entity",
        from = "Column::ActionId",
        to = "super::eco_action::Column::Id"
    )]
    EcoAction,
}

impl Related<super::eco_action::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EcoAction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
