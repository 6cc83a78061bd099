//! Redemption catalog - Items users can buy with Buds.
//!
//! Reward items are merchandise or donations with a fixed Bud price. This module only
//! manages the catalog; buying an item goes through
//! [`crate::core::rewards::RewardService::redeem`], which runs the price through the
//! balance-checked spend path. Retired items are soft deleted so past redemptions keep
//! their meaning.

use crate::{
    entities::{RewardItem, reward_item},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};

/// Categories a reward item may belong to.
pub const REWARD_CATEGORIES: [&str; 2] = ["merch", "donation"];

/// Retrieves all redeemable (non-deleted) items, ordered by price then name.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_all_active_items<C>(db: &C) -> Result<Vec<reward_item::Model>>
where
    C: ConnectionTrait,
{
    RewardItem::find()
        .filter(reward_item::Column::IsDeleted.eq(false))
        .order_by_asc(reward_item::Column::BudsCost)
        .order_by_asc(reward_item::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a redeemable item by name, returning None if not found or deleted.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_item_by_name<C>(db: &C, name: &str) -> Result<Option<reward_item::Model>>
where
    C: ConnectionTrait,
{
    RewardItem::find()
        .filter(reward_item::Column::Name.eq(name))
        .filter(reward_item::Column::IsDeleted.eq(false))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds an item by name whether or not it was retired. Used by idempotent seeding.
pub async fn find_any_item_by_name<C>(db: &C, name: &str) -> Result<Option<reward_item::Model>>
where
    C: ConnectionTrait,
{
    RewardItem::find()
        .filter(reward_item::Column::Name.eq(name))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Adds an item to the catalog.
///
/// # Errors
/// Returns an error if:
/// - The item name is empty or whitespace-only
/// - The category is not `merch` or `donation`
/// - The cost is zero or negative
/// - The name is already taken or the insert fails
pub async fn create_item<C>(
    db: &C,
    name: &str,
    description: &str,
    category: &str,
    buds_cost: i64,
) -> Result<reward_item::Model>
where
    C: ConnectionTrait,
{
    if name.trim().is_empty() {
        return Err(Error::Config {
            message: "Reward item name cannot be empty".to_string(),
        });
    }

    let category = category.trim().to_lowercase();
    if !REWARD_CATEGORIES.contains(&category.as_str()) {
        return Err(Error::Config {
            message: format!("Unknown reward category '{category}'"),
        });
    }

    if buds_cost <= 0 {
        return Err(Error::InvalidAmount { amount: buds_cost });
    }

    let item = reward_item::ActiveModel {
        name: Set(name.trim().to_string()),
        description: Set(description.to_string()),
        category: Set(category),
        buds_cost: Set(buds_cost),
        is_deleted: Set(false),
        ..Default::default()
    };
    item.insert(db).await.map_err(Into::into)
}

/// Retires an item. It disappears from the catalog but its name stays reserved.
///
/// # Errors
/// Returns an error if:
/// - The item does not exist or is already retired
/// - The database update operation fails
pub async fn retire_item<C>(db: &C, item_id: i64) -> Result<reward_item::Model>
where
    C: ConnectionTrait,
{
    let mut item: reward_item::ActiveModel = RewardItem::find_by_id(item_id)
        .one(db)
        .await?
        .filter(|item| !item.is_deleted)
        .ok_or_else(|| Error::RewardItemNotFound {
            name: item_id.to_string(),
        })?
        .into();

    item.is_deleted = Set(true);
    item.update(db).await.map_err(Into::into)
}
