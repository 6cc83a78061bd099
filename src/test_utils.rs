//! Shared test utilities for `bud-ledger`.
//!
//! This module provides common helper functions for setting up test databases
//! and writing action history with sensible defaults.

use crate::{
    config::catalog::builtin_config,
    core::{
        actions::{self, NewActionRecord},
        seed,
    },
    entities::user_action,
    errors::Result,
};
use chrono::{DateTime, TimeZone, Utc};
use sea_orm::{ConnectOptions, DatabaseConnection};
use std::path::Path;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a file-backed `SQLite` database under `dir` with a pool of several
/// connections, so concurrent tasks really interleave.
pub async fn setup_file_db(dir: &Path) -> Result<DatabaseConnection> {
    let url = format!("sqlite://{}?mode=rwc", dir.join("bud_ledger.sqlite").display());
    let mut options = ConnectOptions::new(url);
    options.max_connections(8).min_connections(2).sqlx_logging(false);

    let db = sea_orm::Database::connect(options).await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a test database seeded with the built-in catalog.
pub async fn setup_seeded_db() -> Result<DatabaseConnection> {
    let db = setup_test_db().await?;
    seed::seed_catalog(&db, &builtin_config()?).await?;
    Ok(db)
}

/// Noon UTC on the given day.
///
/// # Panics
/// Panics on an invalid date.
#[allow(clippy::unwrap_used)]
pub fn date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
}

/// Records a custom action completed now.
///
/// # Defaults
/// * `co2_saved`: 1.0
/// * `notes`: None
pub async fn record_test_action(
    db: &DatabaseConnection,
    user_id: i64,
    title: &str,
    category: &str,
    buds_earned: i64,
) -> Result<user_action::Model> {
    actions::record_action(
        db,
        NewActionRecord {
            user_id,
            action_id: None,
            title: title.to_string(),
            category: category.to_string(),
            notes: None,
            buds_earned,
            co2_saved: 1.0,
            completed_at: Utc::now(),
        },
    )
    .await
}

/// Records a custom action completed at a given time, without a reward.
///
/// # Defaults
/// * `buds_earned`: 0 (no ledger row is written)
/// * `co2_saved`: 1.0
pub async fn record_action_on(
    db: &DatabaseConnection,
    user_id: i64,
    title: &str,
    category: &str,
    completed_at: DateTime<Utc>,
) -> Result<user_action::Model> {
    actions::record_action(
        db,
        NewActionRecord {
            user_id,
            action_id: None,
            title: title.to_string(),
            category: category.to_string(),
            notes: None,
            buds_earned: 0,
            co2_saved: 1.0,
            completed_at,
        },
    )
    .await
}
