//! Reward service - the entry point for every Bud movement.
//!
//! [`RewardService`] coordinates the ledger, the action log, the stats cache and the badge
//! engine. Writes for one user are serialized by a per-user async lock, so a spend's
//! balance check and its append cannot interleave with another write for the same user.
//! Different users never wait on each other.
//!
//! After every write the stats cache is reconciled. A failed reconciliation is logged and
//! left to the next write or to the sweep; it never fails the operation that triggered it,
//! because the ledger write it follows is already durable.

use crate::{
    core::{
        achievements::{self, AwardOutcome, AwardedBadge, PayoutStatus},
        actions::{self, ActionInput, NewActionRecord},
        estimator::{ImpactEstimator, RuleBasedEstimator},
        ledger::{self, TransactionKind},
        notify::{self, BadgeNotifier, TracingNotifier},
        redemption,
        stats::{self, ReconcileOutcome},
    },
    entities::{badge, reward_item, transaction, user_action, user_badge, user_stats},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{DatabaseConnection, TransactionTrait};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, instrument, warn};

/// Number of idle lock entries kept before the map is pruned.
const LOCK_PRUNE_THRESHOLD: usize = 1024;

/// One async mutex per user key.
#[derive(Debug, Default)]
pub struct UserLocks {
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl UserLocks {
    /// Waits for exclusive access to a user's writes.
    pub async fn acquire(&self, user_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            if locks.len() >= LOCK_PRUNE_THRESHOLD {
                // Entries only referenced by the map are not held or awaited by anyone
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            Arc::clone(locks.entry(user_id).or_default())
        };
        lock.lock_owned().await
    }
}

/// Outcome of [`RewardService::log_action`].
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedAction {
    /// The action as written to the log
    pub record: user_action::Model,
    /// Buds credited for the action itself
    pub buds_earned: i64,
    /// Explanation from the impact estimator, for custom actions
    pub narrative: Option<String>,
    /// Badges the action unlocked
    pub awarded: Vec<AwardedBadge>,
}

/// Outcome of [`RewardService::redeem`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redemption {
    /// The item bought
    pub item: reward_item::Model,
    /// Balance after the purchase
    pub balance: i64,
}

struct ResolvedAction {
    action_id: Option<i64>,
    title: String,
    category: String,
    buds_earned: i64,
    co2_saved: f64,
    narrative: Option<String>,
}

/// Ledger, action log, stats cache and badge engine behind one interface.
pub struct RewardService {
    db: DatabaseConnection,
    estimator: Arc<dyn ImpactEstimator>,
    notifier: Arc<dyn BadgeNotifier>,
    locks: UserLocks,
}

impl RewardService {
    /// Creates a service with an explicit estimator and notification sink.
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        estimator: Arc<dyn ImpactEstimator>,
        notifier: Arc<dyn BadgeNotifier>,
    ) -> Self {
        Self {
            db,
            estimator,
            notifier,
            locks: UserLocks::default(),
        }
    }

    /// Creates a service using the rule-based estimator and log notifications.
    #[must_use]
    pub fn with_defaults(db: DatabaseConnection) -> Self {
        Self::new(
            db,
            Arc::new(RuleBasedEstimator),
            Arc::new(TracingNotifier),
        )
    }

    /// The underlying connection.
    #[must_use]
    pub const fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Credits Buds to a user and returns the new balance.
    ///
    /// # Errors
    /// Returns [`Error::InvalidAmount`] if `amount` is not positive (nothing is written), or
    /// a database error if the append fails.
    #[instrument(skip(self, description))]
    pub async fn earn(&self, user_id: i64, amount: i64, description: &str) -> Result<i64> {
        if amount <= 0 {
            return Err(Error::InvalidAmount { amount });
        }

        let _guard = self.locks.acquire(user_id).await;
        ledger::append(
            &self.db,
            user_id,
            TransactionKind::Earned,
            amount,
            description.to_string(),
        )
        .await?;
        let balance = ledger::compute_balance(&self.db, user_id).await?;
        self.reconcile_quietly(user_id).await;

        info!(balance, "Earned {} Buds", amount);
        Ok(balance)
    }

    /// Debits Buds from a user and returns the new balance.
    ///
    /// The balance is folded from the ledger, never read from the stats cache, and the
    /// check and the append run in one database transaction under the user's lock.
    ///
    /// # Errors
    /// Returns an error if:
    /// - `amount` is not positive ([`Error::InvalidAmount`])
    /// - `amount` exceeds the balance ([`Error::InsufficientBalance`]); nothing is written
    /// - The database fails
    #[instrument(skip(self, description))]
    pub async fn spend(&self, user_id: i64, amount: i64, description: &str) -> Result<i64> {
        if amount <= 0 {
            return Err(Error::InvalidAmount { amount });
        }

        let _guard = self.locks.acquire(user_id).await;
        let txn = self.db.begin().await?;

        let current = ledger::compute_balance(&txn, user_id).await?;
        if amount > current {
            txn.rollback().await?;
            return Err(Error::InsufficientBalance {
                current,
                required: amount,
            });
        }

        ledger::append(
            &txn,
            user_id,
            TransactionKind::Spent,
            amount,
            description.to_string(),
        )
        .await?;
        txn.commit().await?;

        let balance = current - amount;
        self.reconcile_quietly(user_id).await;

        info!(balance, "Spent {} Buds", amount);
        Ok(balance)
    }

    /// Logs a completed action, credits its reward and checks for new badges.
    ///
    /// Catalog actions use the catalog's reward and CO2 value. Custom actions are priced
    /// by the configured estimator; if it is unavailable the rule-based heuristic is used
    /// instead. The action and its Earned transaction are written atomically. A failing
    /// badge evaluation is logged and does not fail the call; the next evaluation picks up
    /// where it stopped.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The catalog action does not exist ([`Error::ActionNotFound`])
    /// - A custom action has an empty title or category ([`Error::InvalidAction`])
    /// - Writing the action fails
    #[instrument(skip(self, input, notes))]
    pub async fn log_action(
        &self,
        user_id: i64,
        input: ActionInput,
        notes: Option<String>,
    ) -> Result<LoggedAction> {
        let resolved = self.resolve_action(input, notes.as_deref()).await?;

        let _guard = self.locks.acquire(user_id).await;
        let record = actions::record_action(
            &self.db,
            NewActionRecord {
                user_id,
                action_id: resolved.action_id,
                title: resolved.title,
                category: resolved.category,
                notes,
                buds_earned: resolved.buds_earned,
                co2_saved: resolved.co2_saved,
                completed_at: Utc::now(),
            },
        )
        .await?;
        self.reconcile_quietly(user_id).await;

        let awarded = match achievements::evaluate(&self.db, user_id, self.notifier.as_ref()).await
        {
            Ok(report) => {
                if report.paid_out() {
                    self.reconcile_quietly(user_id).await;
                }
                report.awarded
            }
            Err(e) => {
                warn!("Badge evaluation failed, will retry on the next action: {e}");
                Vec::new()
            }
        };

        info!(
            title = %record.title,
            buds = record.buds_earned,
            badges = awarded.len(),
            "Logged action"
        );
        Ok(LoggedAction {
            buds_earned: record.buds_earned,
            record,
            narrative: resolved.narrative,
            awarded,
        })
    }

    async fn resolve_action(
        &self,
        input: ActionInput,
        notes: Option<&str>,
    ) -> Result<ResolvedAction> {
        match input {
            ActionInput::Catalog { action_id } => {
                let action = actions::get_eco_action_by_id(&self.db, action_id)
                    .await?
                    .ok_or_else(|| Error::ActionNotFound {
                        reference: action_id.to_string(),
                    })?;
                Ok(ResolvedAction {
                    action_id: Some(action.id),
                    title: action.title,
                    category: action.category,
                    buds_earned: action.buds_reward,
                    co2_saved: action.co2_saved,
                    narrative: None,
                })
            }
            ActionInput::Custom { title, category } => {
                let title = title.trim().to_string();
                let category = category.trim().to_lowercase();
                if title.is_empty() || category.is_empty() {
                    return Err(Error::InvalidAction {
                        message: "a custom action needs a title and a category".to_string(),
                    });
                }

                let estimate = self
                    .estimator
                    .estimate(&title, &category, notes)
                    .unwrap_or_else(|e| {
                        warn!("{e}; using the rule-based estimate");
                        RuleBasedEstimator::estimate_impact(&title, &category, notes)
                    })
                    .clamped();

                Ok(ResolvedAction {
                    action_id: None,
                    buds_earned: estimate.reward_amount,
                    co2_saved: estimate.co2_saved(),
                    narrative: Some(estimate.narrative),
                    title,
                    category,
                })
            }
        }
    }

    /// Awards a badge by name, typically one with a manual rule.
    ///
    /// # Errors
    /// Returns [`Error::BadgeNotFound`] if no badge has that name, or a database error if
    /// the award row cannot be written.
    #[instrument(skip(self))]
    pub async fn award_badge(&self, user_id: i64, badge_name: &str) -> Result<AwardOutcome> {
        let badge = achievements::get_badge_by_name(&self.db, badge_name)
            .await?
            .ok_or_else(|| Error::BadgeNotFound {
                name: badge_name.to_string(),
            })?;

        let _guard = self.locks.acquire(user_id).await;
        let outcome = achievements::award_badge(&self.db, user_id, &badge).await?;
        if let AwardOutcome::Awarded { payout } = outcome {
            notify::deliver(
                self.notifier.as_ref(),
                &achievements::notice_for(user_id, &badge),
            );
            if matches!(payout, PayoutStatus::Paid { .. }) {
                self.reconcile_quietly(user_id).await;
            }
        }
        Ok(outcome)
    }

    /// Buys a reward item and returns what was bought with the new balance.
    ///
    /// # Errors
    /// Returns [`Error::RewardItemNotFound`] for unknown or retired items, and otherwise the
    /// errors of [`Self::spend`].
    #[instrument(skip(self))]
    pub async fn redeem(&self, user_id: i64, item_name: &str) -> Result<Redemption> {
        let item = redemption::get_item_by_name(&self.db, item_name)
            .await?
            .ok_or_else(|| Error::RewardItemNotFound {
                name: item_name.to_string(),
            })?;

        let balance = self
            .spend(user_id, item.buds_cost, &format!("Redeemed: {}", item.name))
            .await?;
        Ok(Redemption { item, balance })
    }

    /// Rebuilds a user's stats row and returns it.
    ///
    /// # Errors
    /// Returns [`Error::ReconciliationFailure`] if the sources cannot be read; the cached
    /// row is then left as it was.
    pub async fn refresh_stats(&self, user_id: i64) -> Result<user_stats::Model> {
        self.reconcile(user_id).await.map(|outcome| outcome.stats)
    }

    /// Reconciles a user's stats row under the user's lock, reporting whether it drifted.
    pub async fn reconcile(&self, user_id: i64) -> Result<ReconcileOutcome> {
        let _guard = self.locks.acquire(user_id).await;
        stats::reconcile(&self.db, user_id).await
    }

    /// Credits badge rewards a user holds but was never paid, under the user's lock.
    pub async fn retry_payouts(&self, user_id: i64) -> Result<achievements::PayoutRetry> {
        let _guard = self.locks.acquire(user_id).await;
        achievements::retry_unpaid_payouts(&self.db, user_id).await
    }

    async fn reconcile_quietly(&self, user_id: i64) {
        if let Err(e) = stats::reconcile(&self.db, user_id).await {
            warn!(user_id, "Stats not refreshed, the next write or sweep will retry: {e}");
        }
    }

    /// The authoritative balance, folded from the ledger.
    pub async fn balance(&self, user_id: i64) -> Result<i64> {
        ledger::compute_balance(&self.db, user_id).await
    }

    /// Ledger rows of a user, newest first.
    pub async fn history(&self, user_id: i64) -> Result<Vec<transaction::Model>> {
        ledger::list_by_user(&self.db, user_id).await
    }

    /// Logged actions of a user, newest first.
    pub async fn actions(&self, user_id: i64) -> Result<Vec<user_action::Model>> {
        actions::list_for_user(&self.db, user_id).await
    }

    /// Badges held by a user, most recent first.
    pub async fn badges_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<(user_badge::Model, badge::Model)>> {
        achievements::list_earned_badges(&self.db, user_id).await
    }

    /// The cached stats row, if any. May lag the ledger until the next reconciliation.
    pub async fn stats(&self, user_id: i64) -> Result<Option<user_stats::Model>> {
        stats::get(&self.db, user_id).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::{
        core::{
            estimator::{ImpactEstimate, MAX_ESTIMATED_REWARD},
            notify::ChannelNotifier,
        },
        test_utils::*,
    };

    struct UnavailableEstimator;

    impl ImpactEstimator for UnavailableEstimator {
        fn estimate(&self, _: &str, _: &str, _: Option<&str>) -> Result<ImpactEstimate> {
            Err(Error::EstimatorUnavailable {
                message: "offline".to_string(),
            })
        }
    }

    struct GenerousEstimator;

    impl ImpactEstimator for GenerousEstimator {
        fn estimate(&self, _: &str, _: &str, _: Option<&str>) -> Result<ImpactEstimate> {
            Ok(ImpactEstimate {
                co2_impact: -3.0,
                reward_amount: 500,
                narrative: "Huge".to_string(),
            })
        }
    }

    async fn service() -> Result<RewardService> {
        Ok(RewardService::with_defaults(setup_seeded_db().await?))
    }

    async fn catalog_action_id(service: &RewardService, title: &str) -> Result<i64> {
        Ok(actions::get_eco_action_by_title(service.db(), title)
            .await?
            .unwrap()
            .id)
    }

    #[tokio::test]
    async fn test_earn_then_spend_restores_balance() -> Result<()> {
        let service = service().await?;

        assert_eq!(service.earn(1, 120, "Welcome bonus").await?, 120);
        assert_eq!(service.earn(1, 50, "Bonus").await?, 170);
        assert_eq!(service.spend(1, 50, "Sticker").await?, 120);
        assert_eq!(service.balance(1).await?, 120);

        let stats = service.stats(1).await?.unwrap();
        assert_eq!(stats.buds_earned, 120);

        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_amounts_write_nothing() -> Result<()> {
        let service = service().await?;

        for amount in [0, -5] {
            assert!(matches!(
                service.earn(1, amount, "x").await,
                Err(Error::InvalidAmount { .. })
            ));
            assert!(matches!(
                service.spend(1, amount, "x").await,
                Err(Error::InvalidAmount { .. })
            ));
        }
        assert!(service.history(1).await?.is_empty());
        assert!(service.stats(1).await?.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_overspend_rejected_and_balance_unchanged() -> Result<()> {
        let service = service().await?;
        service.earn(1, 40, "a").await?;

        let result = service.spend(1, 41, "too much").await;
        assert!(matches!(
            result,
            Err(Error::InsufficientBalance {
                current: 40,
                required: 41
            })
        ));
        assert_eq!(service.balance(1).await?, 40);
        assert_eq!(service.history(1).await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_spends_of_full_balance() -> Result<()> {
        let service = Arc::new(service().await?);
        service.earn(1, 100, "a").await?;

        let (first, second) = tokio::join!(
            service.spend(1, 100, "first"),
            service.spend(1, 100, "second")
        );

        let successes = [&first, &second].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        assert!(
            [first, second]
                .into_iter()
                .any(|r| matches!(r, Err(Error::InsufficientBalance { current: 0, .. })))
        );
        assert_eq!(service.balance(1).await?, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_users_are_independent() -> Result<()> {
        let service = service().await?;
        service.earn(1, 30, "a").await?;
        service.earn(2, 70, "b").await?;

        assert!(service.spend(1, 31, "x").await.is_err());
        assert_eq!(service.spend(2, 31, "y").await?, 39);
        assert_eq!(service.balance(1).await?, 30);

        Ok(())
    }

    #[tokio::test]
    async fn test_log_catalog_action() -> Result<()> {
        let service = service().await?;
        let transit = catalog_action_id(&service, "Used public transit").await?;

        let logged = service
            .log_action(
                1,
                ActionInput::Catalog { action_id: transit },
                Some("Bus to work".to_string()),
            )
            .await?;

        assert_eq!(logged.buds_earned, 15);
        assert_eq!(logged.record.action_id, Some(transit));
        assert_eq!(logged.record.category, "transportation");
        assert_eq!(logged.record.notes.as_deref(), Some("Bus to work"));
        assert!(logged.narrative.is_none());
        assert!(logged.awarded.is_empty());

        let history = service.history(1).await?;
        assert_eq!(history.len(), 1);
        assert_eq!(Some(history[0].id), logged.record.transaction_id);

        let stats = service.stats(1).await?.unwrap();
        assert_eq!(stats.buds_earned, 15);
        assert_eq!(stats.total_actions_completed, 1);
        assert_eq!(stats.total_carbon_footprint, 2.3);
        assert_eq!(stats.streak_days, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_log_unknown_catalog_action() -> Result<()> {
        let service = service().await?;

        let result = service
            .log_action(1, ActionInput::Catalog { action_id: 999 }, None)
            .await;
        assert!(matches!(result, Err(Error::ActionNotFound { .. })));
        assert!(service.actions(1).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_custom_action_falls_back_when_estimator_unavailable() -> Result<()> {
        let db = setup_seeded_db().await?;
        let service = RewardService::new(
            db,
            Arc::new(UnavailableEstimator),
            Arc::new(TracingNotifier),
        );

        let logged = service
            .log_action(
                1,
                ActionInput::Custom {
                    title: "Biked to the store".to_string(),
                    category: "Transportation".to_string(),
                },
                None,
            )
            .await?;

        assert_eq!(logged.buds_earned, 14);
        assert_eq!(logged.record.action_id, None);
        assert_eq!(logged.record.category, "transportation");
        assert_eq!(logged.record.co2_saved, 2.1);
        assert_eq!(service.balance(1).await?, 14);

        Ok(())
    }

    #[tokio::test]
    async fn test_custom_action_reward_is_clamped() -> Result<()> {
        let db = setup_seeded_db().await?;
        let service =
            RewardService::new(db, Arc::new(GenerousEstimator), Arc::new(TracingNotifier));

        let logged = service
            .log_action(
                1,
                ActionInput::Custom {
                    title: "Planted a forest".to_string(),
                    category: "other".to_string(),
                },
                None,
            )
            .await?;

        assert_eq!(logged.buds_earned, MAX_ESTIMATED_REWARD);
        assert_eq!(logged.record.co2_saved, 3.0);
        assert_eq!(logged.narrative.as_deref(), Some("Huge"));

        Ok(())
    }

    #[tokio::test]
    async fn test_custom_action_without_impact_writes_no_transaction() -> Result<()> {
        let service = service().await?;

        let logged = service
            .log_action(
                1,
                ActionInput::Custom {
                    title: "Watched TV".to_string(),
                    category: "leisure".to_string(),
                },
                None,
            )
            .await?;

        assert_eq!(logged.buds_earned, 0);
        assert_eq!(logged.record.transaction_id, None);
        assert!(service.history(1).await?.is_empty());
        assert_eq!(service.stats(1).await?.unwrap().total_actions_completed, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_custom_action_requires_title_and_category() -> Result<()> {
        let service = service().await?;

        let result = service
            .log_action(
                1,
                ActionInput::Custom {
                    title: " ".to_string(),
                    category: "food".to_string(),
                },
                None,
            )
            .await;
        assert!(matches!(result, Err(Error::InvalidAction { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn test_action_unlocks_badge_and_pays_it() -> Result<()> {
        let db = setup_test_db().await?;
        let (notifier, mut notices) = ChannelNotifier::channel();
        let service = RewardService::new(db, Arc::new(RuleBasedEstimator), Arc::new(notifier));

        let meal = actions::create_eco_action(
            service.db(),
            "Ate a meatless meal",
            "food",
            None,
            1.5,
            10,
        )
        .await?;
        achievements::create_badge(
            service.db(),
            "Plant Power",
            "Ate 2 meatless meals",
            50,
            &achievements::EligibilityRule::TitleCount {
                title: "Ate a meatless meal".to_string(),
                threshold: 2,
            },
        )
        .await?;

        let first = service
            .log_action(1, ActionInput::Catalog { action_id: meal.id }, None)
            .await?;
        assert!(first.awarded.is_empty());

        let second = service
            .log_action(1, ActionInput::Catalog { action_id: meal.id }, None)
            .await?;
        assert_eq!(second.awarded.len(), 1);
        assert_eq!(second.awarded[0].badge.name, "Plant Power");

        assert_eq!(service.balance(1).await?, 70);
        assert_eq!(service.stats(1).await?.unwrap().buds_earned, 70);
        assert_eq!(notices.try_recv().unwrap().badge_name, "Plant Power");

        // A third meal does not award the badge again
        let third = service
            .log_action(1, ActionInput::Catalog { action_id: meal.id }, None)
            .await?;
        assert!(third.awarded.is_empty());
        assert_eq!(service.balance(1).await?, 80);
        assert_eq!(service.badges_for_user(1).await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_manual_badge_award() -> Result<()> {
        let service = service().await?;

        let outcome = service.award_badge(1, "Early Adopter").await?;
        assert!(matches!(
            outcome,
            AwardOutcome::Awarded {
                payout: PayoutStatus::Paid { .. }
            }
        ));
        assert_eq!(
            service.award_badge(1, "Early Adopter").await?,
            AwardOutcome::AlreadyEarned
        );
        assert_eq!(service.balance(1).await?, 100);
        assert_eq!(service.stats(1).await?.unwrap().buds_earned, 100);

        assert!(matches!(
            service.award_badge(1, "Moon Walker").await,
            Err(Error::BadgeNotFound { .. })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_redeem_reward_item() -> Result<()> {
        let service = service().await?;
        service.earn(1, 200, "a").await?;

        let redemption = service.redeem(1, "Plant a Tree").await?;
        assert_eq!(redemption.item.buds_cost, 150);
        assert_eq!(redemption.balance, 50);
        assert_eq!(service.history(1).await?[0].description, "Redeemed: Plant a Tree");

        assert!(matches!(
            service.redeem(1, "Ocean Cleanup Donation").await,
            Err(Error::InsufficientBalance {
                current: 50,
                required: 175
            })
        ));
        assert!(matches!(
            service.redeem(1, "Gold Bar").await,
            Err(Error::RewardItemNotFound { .. })
        ));
        assert_eq!(service.balance(1).await?, 50);

        Ok(())
    }

    #[tokio::test]
    async fn test_refresh_stats_repairs_cache() -> Result<()> {
        let service = service().await?;
        service.earn(1, 25, "a").await?;
        stats::upsert(
            service.db(),
            1,
            &stats::StatsFields {
                buds_earned: 1,
                ..stats::StatsFields::default()
            },
        )
        .await?;

        let refreshed = service.refresh_stats(1).await?;
        assert_eq!(refreshed.buds_earned, 25);

        Ok(())
    }

    #[tokio::test]
    async fn test_user_locks_serialize_same_user() {
        let locks = UserLocks::default();

        let guard = locks.acquire(1).await;
        // Another user is not blocked
        drop(locks.acquire(2).await);

        let pending = locks.acquire(1);
        tokio::pin!(pending);
        assert!(
            tokio::time::timeout(std::time::Duration::from_millis(20), &mut pending)
                .await
                .is_err()
        );

        drop(guard);
        drop(pending.await);
    }
}
