//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod badge;
pub mod eco_action;
pub mod reward_item;
pub mod transaction;
pub mod user_action;
pub mod user_badge;
pub mod user_identity;
pub mod user_stats;

// Re-export specific types to avoid conflicts
pub use badge::{Column as BadgeColumn, Entity as Badge, Model as BadgeModel};
pub use eco_action::{Column as EcoActionColumn, Entity as EcoAction, Model as EcoActionModel};
pub use reward_item::{
    Column as RewardItemColumn, Entity as RewardItem, Model as RewardItemModel,
};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
};
pub use user_action::{
    Column as UserActionColumn, Entity as UserAction, Model as UserActionModel,
};
pub use user_badge::{Column as UserBadgeColumn, Entity as UserBadge, Model as UserBadgeModel};
pub use user_identity::{
    Column as UserIdentityColumn, Entity as UserIdentity, Model as UserIdentityModel,
};
pub use user_stats::{Column as UserStatsColumn, Entity as UserStats, Model as UserStatsModel};
