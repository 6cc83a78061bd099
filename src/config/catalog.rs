//! Catalog configuration loading from config.toml
//!
//! The action catalog, the badge catalog and the redemption catalog are static reference
//! data. They are described in a TOML file and seeded into the database on startup by
//! [`crate::core::seed::seed_catalog`]. A copy of the repository's `config.toml` is built
//! into the binary and used when no file is present.

use crate::core::achievements::EligibilityRule;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

const BUILTIN_CATALOG: &str = include_str!("../../config.toml");

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Known eco actions
    #[serde(default)]
    pub actions: Vec<ActionConfig>,
    /// Badge catalog
    #[serde(default)]
    pub badges: Vec<BadgeConfig>,
    /// Items that can be redeemed for Buds
    #[serde(default)]
    pub rewards: Vec<RewardConfig>,
    /// Reconciliation sweep settings
    #[serde(default)]
    pub sweep: SweepConfig,
}

/// Configuration for a single catalog action
#[derive(Debug, Deserialize, Clone)]
pub struct ActionConfig {
    /// Unique title
    pub title: String,
    /// Category used by badge rules
    pub category: String,
    /// Optional longer description
    #[serde(default)]
    pub description: Option<String>,
    /// Kg of CO2 saved per completion
    pub co2_saved: f64,
    /// Buds paid per completion
    pub buds_reward: i64,
}

/// Configuration for a single badge
#[derive(Debug, Deserialize, Clone)]
pub struct BadgeConfig {
    /// Unique badge name
    pub name: String,
    /// What the user did to earn it
    pub description: String,
    /// Buds credited when the badge is earned
    #[serde(default)]
    pub buds_reward: i64,
    /// Eligibility rule
    pub rule: EligibilityRule,
}

/// Configuration for a single redemption item
#[derive(Debug, Deserialize, Clone)]
pub struct RewardConfig {
    /// Unique item name
    pub name: String,
    /// Short description
    pub description: String,
    /// `"merch"` or `"donation"`
    pub category: String,
    /// Price in Buds
    pub buds_cost: i64,
}

/// Reconciliation sweep settings
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SweepConfig {
    /// Seconds between two sweeps
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

const fn default_interval_secs() -> u64 {
    3600
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

impl SweepConfig {
    /// Interval between sweeps, never shorter than one second.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

impl Config {
    /// Checks that names are unique within each catalog.
    ///
    /// Amounts and rules are validated again when the entries are written, so this only
    /// catches problems that would otherwise be silently skipped by idempotent seeding.
    pub fn validate(&self) -> Result<()> {
        fn ensure_unique<'a>(kind: &str, names: impl Iterator<Item = &'a str>) -> Result<()> {
            let mut seen = std::collections::HashSet::new();
            for name in names {
                if !seen.insert(name) {
                    return Err(Error::Config {
                        message: format!("Duplicate {kind} '{name}' in catalog"),
                    });
                }
            }
            Ok(())
        }

        ensure_unique("action", self.actions.iter().map(|a| a.title.as_str()))?;
        ensure_unique("badge", self.badges.iter().map(|b| b.name.as_str()))?;
        ensure_unique("reward", self.rewards.iter().map(|r| r.name.as_str()))?;
        Ok(())
    }
}

/// Parses a catalog from TOML text.
pub fn parse_config(contents: &str) -> Result<Config> {
    let config: Config = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse catalog: {e}"),
    })?;
    config.validate()?;
    Ok(config)
}

/// Loads the catalog from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - Required fields are missing or names repeat
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();
    debug!("Loading catalog from {}", path_ref.display());
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;
    parse_config(&contents)
}

/// The catalog compiled into the crate.
pub fn builtin_config() -> Result<Config> {
    parse_config(BUILTIN_CATALOG)
}

/// Loads the catalog from `path` if it exists, otherwise falls back to the built-in one.
pub fn load_config_or_builtin<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();
    if path_ref.exists() {
        load_config(path_ref)
    } else {
        info!(
            "No catalog at {}, using the built-in catalog",
            path_ref.display()
        );
        builtin_config()
    }
}
