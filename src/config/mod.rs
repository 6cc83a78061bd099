/// Database configuration and connection management
pub mod database;

/// Catalog and sweep configuration loading from config.toml
pub mod catalog;
