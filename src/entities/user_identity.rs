//! User identity entity - Maps external auth-provider ids to internal user keys.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Identity mapping database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_identities")]
pub struct Model {
    /// Internal user key used by every other table
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Id issued by the external identity provider
    #[sea_orm(unique)]
    pub external_id: String,
    /// When the mapping was created
    pub created_at: DateTimeUtc,
}

/// `UserIdentity` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
