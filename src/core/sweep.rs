//! Reconciliation sweep.
//!
//! Rebuilds the stats row of every known user so a cache left stale by a failed
//! post-write reconciliation is repaired even if the user never writes again. Badge
//! rewards whose payout failed are credited before the rebuild. The sweep also audits
//! each ledger and reports users whose ledger folds negative.

use crate::{
    core::{actions, ledger, rewards::RewardService, stats},
    errors::{Error, Result},
};
use sea_orm::ConnectionTrait;
use std::{collections::BTreeSet, future::Future, io, sync::Arc, time::Duration};
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info, warn};

/// What one sweep did.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Users whose row was rebuilt
    pub users_checked: usize,
    /// Users whose cached row had drifted
    pub repaired: usize,
    /// Badge payouts credited by the sweep
    pub payouts_retried: usize,
    /// Users whose ledger folds to a negative balance
    pub corrupted: Vec<i64>,
    /// Users that could not be reconciled, with the reason
    pub failures: Vec<(i64, Error)>,
}

/// Every user with a ledger row, a logged action or a stats row.
pub async fn known_user_ids<C>(db: &C) -> Result<BTreeSet<i64>>
where
    C: ConnectionTrait,
{
    let mut ids: BTreeSet<i64> = ledger::list_user_ids(db).await?.into_iter().collect();
    ids.extend(actions::list_user_ids(db).await?);
    ids.extend(stats::list_user_ids(db).await?);
    Ok(ids)
}

/// Reconciles every known user once.
///
/// A failure for one user is recorded in the report and the sweep moves on.
///
/// # Errors
/// Returns an error only if the list of users cannot be read.
pub async fn reconcile_all(service: &RewardService) -> Result<SweepReport> {
    let mut report = SweepReport::default();

    for user_id in known_user_ids(service.db()).await? {
        match service.retry_payouts(user_id).await {
            Ok(retry) => report.payouts_retried += retry.retried.len(),
            Err(e) => warn!(user_id, "Sweep could not retry badge payouts: {e}"),
        }

        match ledger::ledger_totals(service.db(), user_id).await {
            Ok(totals) => {
                if let Err(corruption) = totals.check(user_id) {
                    error!("{corruption}");
                    report.corrupted.push(user_id);
                }
            }
            Err(e) => {
                report.failures.push((user_id, e));
                continue;
            }
        }

        match service.reconcile(user_id).await {
            Ok(outcome) => {
                report.users_checked += 1;
                if outcome.repaired_drift {
                    report.repaired += 1;
                }
            }
            Err(e) => {
                warn!(user_id, "Sweep could not reconcile user: {e}");
                report.failures.push((user_id, e));
            }
        }
    }

    info!(
        users = report.users_checked,
        repaired = report.repaired,
        payouts = report.payouts_retried,
        corrupted = report.corrupted.len(),
        failures = report.failures.len(),
        "Reconciliation sweep finished"
    );
    Ok(report)
}

/// Resolves when `signal` fires. If the signal handler could not be installed the error
/// is logged and this never resolves, so the sweep keeps running.
pub async fn shutdown_on<F>(signal: F)
where
    F: Future<Output = io::Result<()>>,
{
    if let Err(e) = signal.await {
        error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}

/// Runs [`reconcile_all`] every `interval` until `shutdown` resolves.
pub async fn run_periodic<F>(service: Arc<RewardService>, interval: Duration, shutdown: F)
where
    F: Future<Output = ()>,
{
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("Stopping reconciliation sweep");
                break;
            }
            _ = ticker.tick() => {
                if let Err(e) = reconcile_all(&service).await {
                    error!("Reconciliation sweep failed: {e}");
                }
            }
        }
    }
}
