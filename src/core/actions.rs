//! Action log and action catalog.
//!
//! The catalog (`eco_actions`) lists the actions the application knows about together with
//! their Bud reward and CO2 savings. The log (`user_actions`) records every completed
//! action. Catalog actions and custom actions share the same log: a custom action simply
//! has no `action_id` and carries its own title and category.
//!
//! Recording an action that pays Buds writes the log row and its paired Earned transaction
//! in one database transaction, so there is never a reward without its action or an action
//! without its reward.

use crate::{
    core::ledger::{self, TransactionKind},
    entities::{EcoAction, UserAction, eco_action, user_action},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use tracing::{debug, instrument};

/// What the user completed: a catalog action or an ad-hoc one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionInput {
    /// A known action from the catalog
    Catalog {
        /// Catalog id
        action_id: i64,
    },
    /// A user-described action, priced by the impact estimator
    Custom {
        /// Free-form title
        title: String,
        /// Category chosen by the user
        category: String,
    },
}

/// A fully resolved action ready to be written to the log.
#[derive(Debug, Clone, PartialEq)]
pub struct NewActionRecord {
    /// Internal user key
    pub user_id: i64,
    /// Catalog reference, `None` for custom actions
    pub action_id: Option<i64>,
    /// Action title
    pub title: String,
    /// Action category
    pub category: String,
    /// Optional notes
    pub notes: Option<String>,
    /// Buds to credit, zero for actions without a reward
    pub buds_earned: i64,
    /// Kg of CO2 saved
    pub co2_saved: f64,
    /// Completion time
    pub completed_at: DateTime<Utc>,
}

/// Retrieves every catalog action, ordered by category then title.
pub async fn get_all_eco_actions<C>(db: &C) -> Result<Vec<eco_action::Model>>
where
    C: ConnectionTrait,
{
    EcoAction::find()
        .order_by_asc(eco_action::Column::Category)
        .order_by_asc(eco_action::Column::Title)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Catalog actions in one category, ordered by title. The category is matched
/// case-insensitively, the way it is stored.
pub async fn get_eco_actions_by_category<C>(
    db: &C,
    category: &str,
) -> Result<Vec<eco_action::Model>>
where
    C: ConnectionTrait,
{
    EcoAction::find()
        .filter(eco_action::Column::Category.eq(category.trim().to_lowercase()))
        .order_by_asc(eco_action::Column::Title)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a catalog action by id.
pub async fn get_eco_action_by_id<C>(db: &C, action_id: i64) -> Result<Option<eco_action::Model>>
where
    C: ConnectionTrait,
{
    EcoAction::find_by_id(action_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a catalog action by its unique title.
pub async fn get_eco_action_by_title<C>(db: &C, title: &str) -> Result<Option<eco_action::Model>>
where
    C: ConnectionTrait,
{
    EcoAction::find()
        .filter(eco_action::Column::Title.eq(title))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Adds an action to the catalog.
///
/// # Errors
/// Returns an error if:
/// - The title or category is empty or whitespace-only
/// - The reward is negative or the CO2 value is negative or not finite
/// - The title is already taken (unique constraint) or the insert fails
pub async fn create_eco_action<C>(
    db: &C,
    title: &str,
    category: &str,
    description: Option<String>,
    co2_saved: f64,
    buds_reward: i64,
) -> Result<eco_action::Model>
where
    C: ConnectionTrait,
{
    if title.trim().is_empty() || category.trim().is_empty() {
        return Err(Error::Config {
            message: "Action title and category cannot be empty".to_string(),
        });
    }

    if buds_reward < 0 {
        return Err(Error::InvalidAmount {
            amount: buds_reward,
        });
    }

    if !co2_saved.is_finite() || co2_saved < 0.0 {
        return Err(Error::Config {
            message: format!("Invalid CO2 value for '{title}': {co2_saved}"),
        });
    }

    let action = eco_action::ActiveModel {
        title: Set(title.trim().to_string()),
        category: Set(category.trim().to_lowercase()),
        description: Set(description),
        co2_saved: Set(co2_saved),
        buds_reward: Set(buds_reward),
        ..Default::default()
    };
    action.insert(db).await.map_err(Into::into)
}

/// Writes an action to the log, together with its Earned transaction when it pays Buds.
///
/// Both rows are written in one database transaction and the log row keeps the id of its
/// transaction, so `buds_earned` always equals the paired ledger amount.
#[instrument(skip(db, new), fields(user_id = new.user_id, title = %new.title))]
pub async fn record_action<C>(db: &C, new: NewActionRecord) -> Result<user_action::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    if new.buds_earned < 0 {
        return Err(Error::InvalidAmount {
            amount: new.buds_earned,
        });
    }

    if !new.co2_saved.is_finite() || new.co2_saved < 0.0 {
        return Err(Error::InvalidAction {
            message: format!("Invalid CO2 value for '{}': {}", new.title, new.co2_saved),
        });
    }

    let txn = db.begin().await?;

    let transaction_id = if new.buds_earned > 0 {
        let earned = ledger::append(
            &txn,
            new.user_id,
            TransactionKind::Earned,
            new.buds_earned,
            format!("Completed: {}", new.title),
        )
        .await?;
        Some(earned.id)
    } else {
        None
    };

    let record = user_action::ActiveModel {
        user_id: Set(new.user_id),
        action_id: Set(new.action_id),
        title: Set(new.title),
        category: Set(new.category),
        completed_at: Set(new.completed_at),
        notes: Set(new.notes),
        buds_earned: Set(new.buds_earned),
        co2_saved: Set(new.co2_saved),
        transaction_id: Set(transaction_id),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    debug!(
        action_record_id = record.id,
        buds = record.buds_earned,
        "Recorded action"
    );
    Ok(record)
}

/// Retrieves a user's logged actions, newest first.
pub async fn list_for_user<C>(db: &C, user_id: i64) -> Result<Vec<user_action::Model>>
where
    C: ConnectionTrait,
{
    UserAction::find()
        .filter(user_action::Column::UserId.eq(user_id))
        .order_by_desc(user_action::Column::CompletedAt)
        .order_by_desc(user_action::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a user's logged actions in completion order, as the badge engine reads them.
pub async fn list_for_user_chronological<C>(
    db: &C,
    user_id: i64,
) -> Result<Vec<user_action::Model>>
where
    C: ConnectionTrait,
{
    UserAction::find()
        .filter(user_action::Column::UserId.eq(user_id))
        .order_by_asc(user_action::Column::CompletedAt)
        .order_by_asc(user_action::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Ids of every user with at least one logged action.
pub async fn list_user_ids<C>(db: &C) -> Result<Vec<i64>>
where
    C: ConnectionTrait,
{
    UserAction::find()
        .select_only()
        .column(user_action::Column::UserId)
        .distinct()
        .into_tuple::<i64>()
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_create_eco_action_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = create_eco_action(&db, "  ", "energy", None, 0.2, 5).await;
        assert!(matches!(result, Err(Error::Config { .. })));

        let result = create_eco_action(&db, "Turned off lights", "energy", None, 0.2, -1).await;
        assert!(matches!(result, Err(Error::InvalidAmount { amount: -1 })));

        let result =
            create_eco_action(&db, "Turned off lights", "energy", None, f64::NAN, 5).await;
        assert!(matches!(result, Err(Error::Config { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_catalog_lookup() -> Result<()> {
        let db = setup_test_db().await?;

        let created =
            create_eco_action(&db, " Collected rainwater ", "Water", None, 0.1, 8).await?;
        assert_eq!(created.title, "Collected rainwater");
        assert_eq!(created.category, "water");

        let by_title = get_eco_action_by_title(&db, "Collected rainwater").await?;
        assert_eq!(by_title, Some(created.clone()));
        let by_id = get_eco_action_by_id(&db, created.id).await?;
        assert_eq!(by_id, Some(created));
        assert!(get_eco_action_by_title(&db, "Unknown").await?.is_none());

        // Titles are unique
        assert!(
            create_eco_action(&db, "Collected rainwater", "water", None, 0.1, 8)
                .await
                .is_err()
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_catalog_by_category() -> Result<()> {
        let db = setup_test_db().await?;

        let shower = create_eco_action(&db, "Short shower", "water", None, 0.2, 5).await?;
        let rain = create_eco_action(&db, "Collected rainwater", "water", None, 0.1, 8).await?;
        create_eco_action(&db, "Biked to work", "transportation", None, 2.0, 15).await?;

        assert_eq!(get_eco_actions_by_category(&db, "Water").await?, vec![rain, shower]);
        assert!(get_eco_actions_by_category(&db, "food").await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_record_action_pairs_earned_transaction() -> Result<()> {
        let db = setup_test_db().await?;

        let record = record_test_action(&db, 1, "Used public transit", "transportation", 15).await?;

        let transaction_id = record.transaction_id.unwrap();
        let paired = ledger::get_transaction_by_id(&db, transaction_id)
            .await?
            .unwrap();
        assert_eq!(paired.amount, record.buds_earned);
        assert_eq!(paired.kind, "earned");
        assert_eq!(paired.user_id, 1);
        assert_eq!(paired.description, "Completed: Used public transit");

        Ok(())
    }

    #[tokio::test]
    async fn test_record_action_without_reward_writes_no_transaction() -> Result<()> {
        let db = setup_test_db().await?;

        let record = record_test_action(&db, 1, "Watched a documentary", "other", 0).await?;
        assert_eq!(record.transaction_id, None);
        assert!(ledger::list_by_user(&db, 1).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_record_action_rejects_negative_reward() -> Result<()> {
        let db = setup_test_db().await?;

        let result = record_test_action(&db, 1, "Bad", "waste", -3).await;
        assert!(matches!(result, Err(Error::InvalidAmount { amount: -3 })));
        assert!(list_for_user(&db, 1).await?.is_empty());
        assert!(ledger::list_by_user(&db, 1).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_list_orders() -> Result<()> {
        let db = setup_test_db().await?;

        let older =
            record_action_on(&db, 1, "Turned off lights", "energy", date(2024, 3, 1)).await?;
        let newer =
            record_action_on(&db, 1, "Turned off lights", "energy", date(2024, 3, 2)).await?;
        record_action_on(&db, 2, "Turned off lights", "energy", date(2024, 3, 2)).await?;

        let newest_first = list_for_user(&db, 1).await?;
        assert_eq!(newest_first, vec![newer.clone(), older.clone()]);

        let chronological = list_for_user_chronological(&db, 1).await?;
        assert_eq!(chronological, vec![older, newer]);

        let mut ids = list_user_ids(&db).await?;
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2]);

        Ok(())
    }
}
