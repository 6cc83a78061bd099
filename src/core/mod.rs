/// Badge catalog, eligibility rules and the achievement evaluator
pub mod achievements;
/// Action catalog and action log
pub mod actions;
/// Impact estimation for custom actions
pub mod estimator;
/// External id to internal user key mapping
pub mod identity;
/// Append-only Bud ledger and balance calculation
pub mod ledger;
/// Badge notification sinks
pub mod notify;
/// Redemption catalog of merch and donations
pub mod redemption;
/// Reward service coordinating every Bud movement
pub mod rewards;
/// Idempotent catalog seeding from configuration
pub mod seed;
/// Stats cache and reconciliation
pub mod stats;
/// Periodic reconciliation of every user's stats
pub mod sweep;
