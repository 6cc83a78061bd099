//! Stats cache.
//!
//! `user_stats` mirrors the balance and a few counters so read paths do not have to fold
//! the ledger and the action log. It is never an authority: [`reconcile`] rebuilds a row
//! from the ledger and the action log and overwrites whatever was cached.

use crate::{
    core::{achievements::ActionSignals, actions, ledger},
    entities::{UserStats, user_stats},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{Set, prelude::*, sea_query::OnConflict};
use tracing::{debug, instrument, warn};

/// The cached values of a stats row, without its key and timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatsFields {
    /// Cached Bud balance
    pub buds_earned: i64,
    /// Number of logged actions
    pub total_actions_completed: i64,
    /// Total kg of CO2 saved
    pub total_carbon_footprint: f64,
    /// Best run of consecutive active days
    pub streak_days: i32,
}

impl StatsFields {
    /// Values derived from a ledger balance and action signals.
    #[must_use]
    pub fn compute(balance: i64, signals: &ActionSignals) -> Self {
        Self {
            buds_earned: balance,
            total_actions_completed: signals.total_actions,
            total_carbon_footprint: signals.total_co2_saved,
            streak_days: i32::try_from(signals.streak_days).unwrap_or(i32::MAX),
        }
    }
}

impl From<&user_stats::Model> for StatsFields {
    fn from(row: &user_stats::Model) -> Self {
        Self {
            buds_earned: row.buds_earned,
            total_actions_completed: row.total_actions_completed,
            total_carbon_footprint: row.total_carbon_footprint,
            streak_days: row.streak_days,
        }
    }
}

/// Reads the cached row of a user.
pub async fn get<C>(db: &C, user_id: i64) -> Result<Option<user_stats::Model>>
where
    C: ConnectionTrait,
{
    UserStats::find_by_id(user_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Inserts or overwrites the cached row of a user.
pub async fn upsert<C>(db: &C, user_id: i64, fields: &StatsFields) -> Result<user_stats::Model>
where
    C: ConnectionTrait,
{
    let row = user_stats::ActiveModel {
        user_id: Set(user_id),
        buds_earned: Set(fields.buds_earned),
        total_actions_completed: Set(fields.total_actions_completed),
        total_carbon_footprint: Set(fields.total_carbon_footprint),
        streak_days: Set(fields.streak_days),
        updated_at: Set(Utc::now()),
    };

    UserStats::insert(row)
        .on_conflict(
            OnConflict::column(user_stats::Column::UserId)
                .update_columns([
                    user_stats::Column::BudsEarned,
                    user_stats::Column::TotalActionsCompleted,
                    user_stats::Column::TotalCarbonFootprint,
                    user_stats::Column::StreakDays,
                    user_stats::Column::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    get(db, user_id).await?.ok_or_else(|| {
        Error::Database(DbErr::RecordNotFound(format!(
            "user_stats row for user {user_id}"
        )))
    })
}

/// Result of a reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    /// The row as written
    pub stats: user_stats::Model,
    /// Whether an existing row held different values
    pub repaired_drift: bool,
}

/// Rebuilds a user's stats row from the ledger and the action log.
///
/// Every read completes before the row is written. If any read fails the cached row is
/// left untouched and [`Error::ReconciliationFailure`] is returned. Running it twice with
/// no write in between produces the same field values.
#[instrument(skip(db))]
pub async fn reconcile<C>(db: &C, user_id: i64) -> Result<ReconcileOutcome>
where
    C: ConnectionTrait,
{
    let sources = async {
        let previous = get(db, user_id).await?;
        let balance = ledger::compute_balance(db, user_id).await?;
        let history = actions::list_for_user_chronological(db, user_id).await?;
        Ok::<_, Error>((previous, balance, history))
    }
    .await;

    let (previous, balance, history) = sources.map_err(|e| Error::ReconciliationFailure {
        user_id,
        message: e.to_string(),
    })?;

    let fields = StatsFields::compute(balance, &ActionSignals::from_actions(&history));
    let repaired_drift = previous
        .as_ref()
        .is_some_and(|row| StatsFields::from(row) != fields);
    if repaired_drift {
        warn!(
            cached = ?previous.as_ref().map(StatsFields::from),
            recomputed = ?fields,
            "Stats cache drifted from the ledger, overwriting"
        );
    }

    let stats = upsert(db, user_id, &fields).await?;
    debug!(balance = stats.buds_earned, "Reconciled stats");
    Ok(ReconcileOutcome {
        stats,
        repaired_drift,
    })
}

/// Ids of every user with a cached row.
pub async fn list_user_ids<C>(db: &C) -> Result<Vec<i64>>
where
    C: ConnectionTrait,
{
    let rows = UserStats::find().all(db).await?;
    Ok(rows.into_iter().map(|row| row.user_id).collect())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::{core::ledger::TransactionKind, test_utils::*};

    #[tokio::test]
    async fn test_upsert_inserts_then_overwrites() -> Result<()> {
        let db = setup_test_db().await?;
        assert!(get(&db, 1).await?.is_none());

        let first = StatsFields {
            buds_earned: 10,
            total_actions_completed: 1,
            total_carbon_footprint: 0.5,
            streak_days: 1,
        };
        let inserted = upsert(&db, 1, &first).await?;
        assert_eq!(StatsFields::from(&inserted), first);

        let second = StatsFields {
            buds_earned: 25,
            ..first
        };
        let updated = upsert(&db, 1, &second).await?;
        assert_eq!(StatsFields::from(&updated), second);
        assert_eq!(get(&db, 1).await?, Some(updated));
        assert_eq!(list_user_ids(&db).await?, vec![1]);

        Ok(())
    }

    #[tokio::test]
    async fn test_reconcile_rebuilds_from_sources() -> Result<()> {
        let db = setup_test_db().await?;

        record_test_action(&db, 1, "Used public transit", "transportation", 15).await?;
        record_test_action(&db, 1, "Recycled waste", "waste", 5).await?;
        ledger::append(&db, 1, TransactionKind::Spent, 8, "Redeemed: x".to_string()).await?;

        let outcome = reconcile(&db, 1).await?;
        assert!(!outcome.repaired_drift);
        assert_eq!(outcome.stats.buds_earned, 12);
        assert_eq!(outcome.stats.total_actions_completed, 2);
        assert_eq!(outcome.stats.total_carbon_footprint, 2.0);
        assert_eq!(outcome.stats.streak_days, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_reconcile_twice_is_identical() -> Result<()> {
        let db = setup_test_db().await?;
        record_test_action(&db, 1, "Turned off lights", "energy", 5).await?;

        let first = reconcile(&db, 1).await?;
        let second = reconcile(&db, 1).await?;
        assert!(!second.repaired_drift);
        assert_eq!(
            StatsFields::from(&first.stats),
            StatsFields::from(&second.stats)
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_reconcile_overwrites_drifted_cache() -> Result<()> {
        let db = setup_test_db().await?;
        record_test_action(&db, 1, "Turned off lights", "energy", 5).await?;
        upsert(
            &db,
            1,
            &StatsFields {
                buds_earned: 9999,
                ..StatsFields::default()
            },
        )
        .await?;

        let outcome = reconcile(&db, 1).await?;
        assert!(outcome.repaired_drift);
        assert_eq!(outcome.stats.buds_earned, 5);
        assert_eq!(outcome.stats.total_actions_completed, 1);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reconciles_match_serial() -> Result<()> {
        let dir = tempfile::TempDir::new().unwrap();
        let db = std::sync::Arc::new(setup_file_db(dir.path()).await?);
        record_test_action(&*db, 1, "Used public transit", "transportation", 15).await?;
        record_test_action(&*db, 1, "Recycled waste", "waste", 5).await?;
        ledger::append(&*db, 1, TransactionKind::Spent, 8, "Redeemed: x".to_string()).await?;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let db = db.clone();
                tokio::spawn(async move { reconcile(&*db, 1).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap()?;
        }

        let concurrent = StatsFields::from(&get(&*db, 1).await?.unwrap());
        let serial = reconcile(&*db, 1).await?;
        assert!(!serial.repaired_drift);
        assert_eq!(concurrent, StatsFields::from(&serial.stats));
        assert_eq!(concurrent.buds_earned, 12);
        assert_eq!(list_user_ids(&*db).await?, vec![1]);

        Ok(())
    }

    #[tokio::test]
    async fn test_failed_read_leaves_cache_untouched() -> Result<()> {
        let db = setup_test_db().await?;
        let stale = upsert(
            &db,
            1,
            &StatsFields {
                buds_earned: 42,
                ..StatsFields::default()
            },
        )
        .await?;

        db.execute_unprepared("DROP TABLE user_actions").await?;

        let result = reconcile(&db, 1).await;
        assert!(matches!(
            result,
            Err(Error::ReconciliationFailure { user_id: 1, .. })
        ));
        assert_eq!(get(&db, 1).await?, Some(stale));

        Ok(())
    }
}
