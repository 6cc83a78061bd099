//! Badge catalog and achievement evaluator.
//!
//! Badge rules are data: each `badges` row stores a rule kind, an optional subject and a
//! threshold, interpreted here as an [`EligibilityRule`]. Evaluation loads a user's action
//! history once, folds it into [`ActionSignals`] and checks every badge the user does not
//! hold yet.
//!
//! A badge moves from not eligible to eligible to earned, and earned is terminal. The
//! composite key on `user_badges` makes the award itself happen at most once; the payout
//! is linked on the award row, so an award whose payout failed is retried by the next
//! evaluation without ever paying twice.

use crate::{
    core::{
        actions,
        ledger::{self, TransactionKind},
        notify::{self, BadgeNotice, BadgeNotifier},
    },
    entities::{Badge, UserBadge, badge, user_action, user_badge},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{
    QueryOrder, Set, TransactionTrait,
    prelude::*,
    sea_query::{Expr, OnConflict},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info, instrument, warn};

/// What a user must have done to earn a badge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EligibilityRule {
    /// At least `threshold` actions in `category`
    CategoryCount {
        /// Action category
        category: String,
        /// Required number of actions
        threshold: u32,
    },
    /// At least `threshold` actions titled `title`
    TitleCount {
        /// Exact action title
        title: String,
        /// Required number of actions
        threshold: u32,
    },
    /// A run of at least `days` consecutive active days
    Streak {
        /// Required run length
        days: u32,
    },
    /// At least `kg` of CO2 saved in total
    CumulativeCo2 {
        /// Required kg of CO2
        kg: f64,
    },
    /// Actions in `category` on at least `days` distinct days
    CategoryDays {
        /// Action category
        category: String,
        /// Required number of distinct days
        days: u32,
    },
    /// Only awarded explicitly
    Manual,
}

impl EligibilityRule {
    /// Column values stored on the badge row: `(rule_kind, rule_subject, threshold)`.
    #[must_use]
    pub fn to_columns(&self) -> (&'static str, Option<String>, f64) {
        match self {
            Self::CategoryCount {
                category,
                threshold,
            } => ("category_count", Some(category.clone()), f64::from(*threshold)),
            Self::TitleCount { title, threshold } => {
                ("title_count", Some(title.clone()), f64::from(*threshold))
            }
            Self::Streak { days } => ("streak", None, f64::from(*days)),
            Self::CumulativeCo2 { kg } => ("cumulative_co2", None, *kg),
            Self::CategoryDays { category, days } => {
                ("category_days", Some(category.clone()), f64::from(*days))
            }
            Self::Manual => ("manual", None, 0.0),
        }
    }

    /// Rejects rules that would be met by an empty history or can never be met.
    pub fn validate(&self, badge: &str) -> Result<()> {
        let invalid = |message: &str| Error::InvalidRule {
            badge: badge.to_string(),
            message: message.to_string(),
        };

        match self {
            Self::CategoryCount {
                category: subject,
                threshold: n,
            }
            | Self::TitleCount {
                title: subject,
                threshold: n,
            }
            | Self::CategoryDays {
                category: subject,
                days: n,
            } => {
                if subject.trim().is_empty() {
                    return Err(invalid("rule subject cannot be empty"));
                }
                if *n == 0 {
                    return Err(invalid("threshold must be at least 1"));
                }
            }
            Self::Streak { days } => {
                if *days == 0 {
                    return Err(invalid("streak length must be at least 1"));
                }
            }
            Self::CumulativeCo2 { kg } => {
                if !kg.is_finite() || *kg <= 0.0 {
                    return Err(invalid("CO2 threshold must be a positive number"));
                }
            }
            Self::Manual => {}
        }
        Ok(())
    }

    /// Whether the signals satisfy this rule. Manual rules are never met.
    #[must_use]
    pub fn is_met(&self, signals: &ActionSignals) -> bool {
        match self {
            Self::CategoryCount {
                category,
                threshold,
            } => signals.category_count(category) >= *threshold,
            Self::TitleCount { title, threshold } => signals.title_count(title) >= *threshold,
            Self::Streak { days } => signals.streak_days >= *days,
            Self::CumulativeCo2 { kg } => signals.total_co2_saved >= *kg,
            Self::CategoryDays { category, days } => {
                signals.category_day_count(category) >= *days
            }
            Self::Manual => false,
        }
    }
}

impl TryFrom<&badge::Model> for EligibilityRule {
    type Error = Error;

    fn try_from(badge: &badge::Model) -> Result<Self> {
        let invalid = |message: String| Error::InvalidRule {
            badge: badge.name.clone(),
            message,
        };
        let subject = || {
            badge
                .rule_subject
                .clone()
                .ok_or_else(|| invalid(format!("'{}' rule needs a subject", badge.rule_kind)))
        };
        let count = || {
            whole_threshold(badge.threshold).ok_or_else(|| {
                invalid(format!("threshold {} is not a whole number", badge.threshold))
            })
        };

        let rule = match badge.rule_kind.as_str() {
            "category_count" => Self::CategoryCount {
                category: subject()?,
                threshold: count()?,
            },
            "title_count" => Self::TitleCount {
                title: subject()?,
                threshold: count()?,
            },
            "streak" => Self::Streak { days: count()? },
            "cumulative_co2" => Self::CumulativeCo2 {
                kg: badge.threshold,
            },
            "category_days" => Self::CategoryDays {
                category: subject()?,
                days: count()?,
            },
            "manual" => Self::Manual,
            other => return Err(invalid(format!("unknown rule kind '{other}'"))),
        };
        rule.validate(&badge.name)?;
        Ok(rule)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_threshold(value: f64) -> Option<u32> {
    (value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= f64::from(u32::MAX))
        .then(|| value as u32)
}

/// Everything the rules look at, computed in one pass over the action history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionSignals {
    /// Number of logged actions
    pub total_actions: i64,
    /// Total kg of CO2 saved
    pub total_co2_saved: f64,
    /// Best run of consecutive active days
    pub streak_days: u32,
    /// Actions per category
    pub category_counts: HashMap<String, u32>,
    /// Actions per title
    pub title_counts: HashMap<String, u32>,
    /// Distinct active days per category
    pub category_days: HashMap<String, u32>,
}

impl ActionSignals {
    /// Folds a user's action history into signals.
    #[must_use]
    pub fn from_actions(records: &[user_action::Model]) -> Self {
        let mut signals = Self {
            total_actions: i64::try_from(records.len()).unwrap_or(i64::MAX),
            ..Self::default()
        };
        let mut days_by_category: HashMap<&str, HashSet<NaiveDate>> = HashMap::new();

        for record in records {
            signals.total_co2_saved += record.co2_saved;
            *signals
                .category_counts
                .entry(record.category.clone())
                .or_default() += 1;
            *signals.title_counts.entry(record.title.clone()).or_default() += 1;
            days_by_category
                .entry(record.category.as_str())
                .or_default()
                .insert(record.completed_at.date_naive());
        }

        signals.category_days = days_by_category
            .into_iter()
            .map(|(category, days)| {
                (
                    category.to_string(),
                    u32::try_from(days.len()).unwrap_or(u32::MAX),
                )
            })
            .collect();
        signals.streak_days =
            longest_streak(records.iter().map(|r| r.completed_at.date_naive()));
        signals
    }

    /// Actions logged in `category`.
    #[must_use]
    pub fn category_count(&self, category: &str) -> u32 {
        self.category_counts.get(category).copied().unwrap_or(0)
    }

    /// Actions logged with `title`.
    #[must_use]
    pub fn title_count(&self, title: &str) -> u32 {
        self.title_counts.get(title).copied().unwrap_or(0)
    }

    /// Distinct days with an action in `category`.
    #[must_use]
    pub fn category_day_count(&self, category: &str) -> u32 {
        self.category_days.get(category).copied().unwrap_or(0)
    }
}

/// Longest run of consecutive calendar days among `dates`.
///
/// Dates are deduplicated and walked newest first. Each date one day before the previous
/// one extends the run, any larger gap starts a new run of 1, and the best run seen is
/// returned, so days 1, 2, 3 and 5 give 3.
pub fn longest_streak<I>(dates: I) -> u32
where
    I: IntoIterator<Item = NaiveDate>,
{
    let unique: BTreeSet<NaiveDate> = dates.into_iter().collect();

    let mut best = 0;
    let mut current = 0;
    let mut previous: Option<NaiveDate> = None;
    for date in unique.into_iter().rev() {
        current = match previous {
            Some(prev) if prev.pred_opt() == Some(date) => current + 1,
            _ => 1,
        };
        best = best.max(current);
        previous = Some(date);
    }
    best
}

/// Retrieves the whole badge catalog, ordered by name.
pub async fn get_all_badges<C>(db: &C) -> Result<Vec<badge::Model>>
where
    C: ConnectionTrait,
{
    Badge::find()
        .order_by_asc(badge::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a badge by its unique name.
pub async fn get_badge_by_name<C>(db: &C, name: &str) -> Result<Option<badge::Model>>
where
    C: ConnectionTrait,
{
    Badge::find()
        .filter(badge::Column::Name.eq(name))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Adds a badge to the catalog.
///
/// # Errors
/// Returns an error if:
/// - The name is empty or the reward is negative
/// - The rule fails validation
/// - A badge with the same name exists or the insert fails
pub async fn create_badge<C>(
    db: &C,
    name: &str,
    description: &str,
    buds_reward: i64,
    rule: &EligibilityRule,
) -> Result<badge::Model>
where
    C: ConnectionTrait,
{
    if name.trim().is_empty() {
        return Err(Error::Config {
            message: "Badge name cannot be empty".to_string(),
        });
    }
    if buds_reward < 0 {
        return Err(Error::InvalidAmount {
            amount: buds_reward,
        });
    }
    rule.validate(name)?;

    let (rule_kind, rule_subject, threshold) = rule.to_columns();
    let badge = badge::ActiveModel {
        name: Set(name.trim().to_string()),
        description: Set(description.to_string()),
        buds_reward: Set(buds_reward),
        rule_kind: Set(rule_kind.to_string()),
        rule_subject: Set(rule_subject),
        threshold: Set(threshold),
        ..Default::default()
    };
    badge.insert(db).await.map_err(Into::into)
}

/// Award rows held by a user, most recent first.
pub async fn get_user_badges<C>(db: &C, user_id: i64) -> Result<Vec<user_badge::Model>>
where
    C: ConnectionTrait,
{
    UserBadge::find()
        .filter(user_badge::Column::UserId.eq(user_id))
        .order_by_desc(user_badge::Column::EarnedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// A user's badges joined with their catalog entries, most recent first.
pub async fn list_earned_badges<C>(
    db: &C,
    user_id: i64,
) -> Result<Vec<(user_badge::Model, badge::Model)>>
where
    C: ConnectionTrait,
{
    let rows = UserBadge::find()
        .filter(user_badge::Column::UserId.eq(user_id))
        .order_by_desc(user_badge::Column::EarnedAt)
        .find_also_related(Badge)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(held, badge)| badge.map(|b| (held, b)))
        .collect())
}

/// State of a badge's Bud reward after an award attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutStatus {
    /// Reward credited by this call
    Paid {
        /// The Earned transaction
        transaction_id: i64,
    },
    /// The badge pays nothing
    NotRequired,
    /// Someone else linked a payout first
    AlreadyPaid,
    /// The payout failed and will be retried by the next evaluation
    Pending,
}

/// Result of [`award_badge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwardOutcome {
    /// The badge was inserted by this call
    Awarded {
        /// What happened to the reward
        payout: PayoutStatus,
    },
    /// The user already held the badge; nothing was written
    AlreadyEarned,
}

/// Notice announcing `badge` to `user_id`.
#[must_use]
pub fn notice_for(user_id: i64, badge: &badge::Model) -> BadgeNotice {
    BadgeNotice {
        user_id,
        badge_name: badge.name.clone(),
        description: badge.description.clone(),
        reward_amount: badge.buds_reward,
    }
}

/// Credits a badge's reward and links it on the award row, once.
///
/// The Earned transaction and the link are written in one database transaction. The link
/// only applies while `payout_transaction_id` is null; if another caller got there first
/// the transaction is rolled back and [`PayoutStatus::AlreadyPaid`] is returned.
#[instrument(skip(db, badge), fields(badge = %badge.name))]
pub async fn pay_out<C>(db: &C, user_id: i64, badge: &badge::Model) -> Result<PayoutStatus>
where
    C: ConnectionTrait + TransactionTrait,
{
    if badge.buds_reward <= 0 {
        return Ok(PayoutStatus::NotRequired);
    }

    let txn = db.begin().await?;
    let earned = ledger::append(
        &txn,
        user_id,
        TransactionKind::Earned,
        badge.buds_reward,
        format!("Earned badge: {}", badge.name),
    )
    .await?;

    let linked = UserBadge::update_many()
        .col_expr(
            user_badge::Column::PayoutTransactionId,
            Expr::value(earned.id),
        )
        .filter(user_badge::Column::UserId.eq(user_id))
        .filter(user_badge::Column::BadgeId.eq(badge.id))
        .filter(user_badge::Column::PayoutTransactionId.is_null())
        .exec(&txn)
        .await?;

    if linked.rows_affected == 0 {
        txn.rollback().await?;
        debug!("Badge payout already linked");
        return Ok(PayoutStatus::AlreadyPaid);
    }

    txn.commit().await?;
    Ok(PayoutStatus::Paid {
        transaction_id: earned.id,
    })
}

/// Awards a badge to a user, at most once.
///
/// The award row is inserted with `ON CONFLICT DO NOTHING`; a conflict means the user
/// already holds the badge and yields [`AwardOutcome::AlreadyEarned`]. Only a fresh award
/// pays out. A failed payout is logged and reported as [`PayoutStatus::Pending`]: the award
/// stands and the next evaluation retries the payout.
#[instrument(skip(db, badge), fields(badge = %badge.name))]
pub async fn award_badge<C>(db: &C, user_id: i64, badge: &badge::Model) -> Result<AwardOutcome>
where
    C: ConnectionTrait + TransactionTrait,
{
    let award = user_badge::ActiveModel {
        user_id: Set(user_id),
        badge_id: Set(badge.id),
        earned_at: Set(Utc::now()),
        payout_transaction_id: Set(None),
    };

    let inserted = UserBadge::insert(award)
        .on_conflict(
            OnConflict::columns([user_badge::Column::UserId, user_badge::Column::BadgeId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    if inserted == 0 {
        debug!("User already holds badge");
        return Ok(AwardOutcome::AlreadyEarned);
    }

    info!("Awarded badge");
    let payout = match pay_out(db, user_id, badge).await {
        Ok(status) => status,
        Err(e) => {
            warn!("Badge awarded but payout failed, will retry: {e}");
            PayoutStatus::Pending
        }
    };
    Ok(AwardOutcome::Awarded { payout })
}

/// Outcome of [`retry_unpaid_payouts`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayoutRetry {
    /// Names of held badges whose missing payout was credited
    pub retried: Vec<String>,
    /// Names of held badges still waiting for their payout
    pub pending: Vec<String>,
}

/// Retries the payout of every badge a user holds without a linked Earned transaction.
///
/// Safe to race with [`pay_out`] for the same award: the null guard on the link lets
/// exactly one caller commit.
#[instrument(skip(db))]
pub async fn retry_unpaid_payouts<C>(db: &C, user_id: i64) -> Result<PayoutRetry>
where
    C: ConnectionTrait + TransactionTrait,
{
    let unpaid = UserBadge::find()
        .filter(user_badge::Column::UserId.eq(user_id))
        .filter(user_badge::Column::PayoutTransactionId.is_null())
        .find_also_related(Badge)
        .all(db)
        .await?;

    let mut retry = PayoutRetry::default();
    for badge in unpaid.into_iter().filter_map(|(_, badge)| badge) {
        if badge.buds_reward <= 0 {
            continue;
        }
        match pay_out(db, user_id, &badge).await {
            Ok(PayoutStatus::Paid { .. }) => {
                info!(badge = %badge.name, "Credited previously missed badge payout");
                retry.retried.push(badge.name);
            }
            Ok(_) => {}
            Err(e) => {
                warn!(badge = %badge.name, "Badge payout retry failed: {e}");
                retry.pending.push(badge.name);
            }
        }
    }
    Ok(retry)
}

/// A badge awarded during an evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct AwardedBadge {
    /// Catalog entry
    pub badge: badge::Model,
    /// What happened to its reward
    pub payout: PayoutStatus,
}

/// What one evaluation did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationReport {
    /// Signals the rules were checked against
    pub signals: ActionSignals,
    /// Badges awarded by this evaluation
    pub awarded: Vec<AwardedBadge>,
    /// Names of held badges whose missing payout was credited
    pub payouts_retried: Vec<String>,
    /// Names of held badges still waiting for their payout
    pub pending_payouts: Vec<String>,
}

impl EvaluationReport {
    /// Whether this evaluation wrote any Earned transaction.
    #[must_use]
    pub fn paid_out(&self) -> bool {
        !self.payouts_retried.is_empty()
            || self
                .awarded
                .iter()
                .any(|a| matches!(a.payout, PayoutStatus::Paid { .. }))
    }
}

/// Checks every badge for a user and awards the ones they now qualify for.
///
/// Held badges with an unpaid reward are retried first. A badge whose stored rule cannot
/// be interpreted is logged and skipped without failing the evaluation.
#[instrument(skip(db, notifier))]
pub async fn evaluate<C>(
    db: &C,
    user_id: i64,
    notifier: &dyn BadgeNotifier,
) -> Result<EvaluationReport>
where
    C: ConnectionTrait + TransactionTrait,
{
    let retry = retry_unpaid_payouts(db, user_id).await?;
    let mut report = EvaluationReport {
        payouts_retried: retry.retried,
        pending_payouts: retry.pending,
        ..EvaluationReport::default()
    };

    let history = actions::list_for_user_chronological(db, user_id).await?;
    let signals = ActionSignals::from_actions(&history);
    let catalog = get_all_badges(db).await?;
    let held: HashSet<i64> = get_user_badges(db, user_id)
        .await?
        .into_iter()
        .map(|held| held.badge_id)
        .collect();

    for badge in &catalog {
        if held.contains(&badge.id) {
            continue;
        }

        let rule = match EligibilityRule::try_from(badge) {
            Ok(rule) => rule,
            Err(e) => {
                warn!("Skipping badge: {e}");
                continue;
            }
        };
        if !rule.is_met(&signals) {
            continue;
        }

        if let AwardOutcome::Awarded { payout } = award_badge(db, user_id, badge).await? {
            if payout == PayoutStatus::Pending {
                report.pending_payouts.push(badge.name.clone());
            }
            notify::deliver(notifier, &notice_for(user_id, badge));
            report.awarded.push(AwardedBadge {
                badge: badge.clone(),
                payout,
            });
        }
    }

    report.signals = signals;
    Ok(report)
}
