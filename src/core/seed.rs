//! Catalog seeding.
//!
//! Writes the actions, badges and reward items of a [`Config`] into the database. Entries
//! are matched by their unique name or title and only inserted when missing, so seeding
//! runs on every start without touching rows an operator has edited since.

use crate::{
    config::catalog::Config,
    core::{achievements, actions, redemption},
    errors::Result,
};
use sea_orm::ConnectionTrait;
use tracing::{debug, info};

/// Number of catalog entries inserted by [`seed_catalog`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// New catalog actions
    pub actions_added: usize,
    /// New badges
    pub badges_added: usize,
    /// New reward items
    pub rewards_added: usize,
}

/// Inserts every catalog entry of `config` that is not in the database yet.
///
/// # Errors
/// Returns an error if an entry fails validation or a write fails.
pub async fn seed_catalog<C>(db: &C, config: &Config) -> Result<SeedReport>
where
    C: ConnectionTrait,
{
    let mut report = SeedReport::default();

    for action in &config.actions {
        if actions::get_eco_action_by_title(db, &action.title)
            .await?
            .is_some()
        {
            continue;
        }
        actions::create_eco_action(
            db,
            &action.title,
            &action.category,
            action.description.clone(),
            action.co2_saved,
            action.buds_reward,
        )
        .await?;
        debug!("Seeded action '{}'", action.title);
        report.actions_added += 1;
    }

    for badge in &config.badges {
        if achievements::get_badge_by_name(db, &badge.name)
            .await?
            .is_some()
        {
            continue;
        }
        achievements::create_badge(
            db,
            &badge.name,
            &badge.description,
            badge.buds_reward,
            &badge.rule,
        )
        .await?;
        debug!("Seeded badge '{}'", badge.name);
        report.badges_added += 1;
    }

    for reward in &config.rewards {
        if redemption::find_any_item_by_name(db, &reward.name)
            .await?
            .is_some()
        {
            continue;
        }
        redemption::create_item(
            db,
            &reward.name,
            &reward.description,
            &reward.category,
            reward.buds_cost,
        )
        .await?;
        debug!("Seeded reward item '{}'", reward.name);
        report.rewards_added += 1;
    }

    info!(
        actions = report.actions_added,
        badges = report.badges_added,
        rewards = report.rewards_added,
        "Catalog seeded"
    );
    Ok(report)
}
