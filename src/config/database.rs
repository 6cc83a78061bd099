//! Database configuration module.
//!
//! This module handles the database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema always matches the Rust structs. Creation is idempotent (`IF NOT EXISTS`),
//! which lets the sweep binary run against an existing database.

use crate::entities::{
    Badge, EcoAction, RewardItem, Transaction, UserAction, UserBadge, UserIdentity, UserStats,
};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use tracing::{debug, info};

const DEFAULT_DATABASE_URL: &str = "sqlite://bud_ledger.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable, falling back to
/// a local `SQLite` file.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by [`get_database_url`].
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    debug!("Connecting to database at {}", database_url);
    Database::connect(&database_url).await.map_err(Into::into)
}

async fn create_table_for<C, E>(db: &C, schema: &Schema, entity: E) -> Result<()>
where
    C: ConnectionTrait,
    E: EntityTrait + Copy,
{
    let builder = db.get_database_backend();

    let mut table = schema.create_table_from_entity(entity);
    table.if_not_exists();
    db.execute(builder.build(&table)).await?;

    for mut index in schema.create_index_from_entity(entity) {
        index.if_not_exists();
        db.execute(builder.build(&index)).await?;
    }

    Ok(())
}

/// Creates every table (and its declared indexes) the crate needs.
///
/// Catalog tables are created before the tables referencing them so foreign keys resolve
/// on backends that check them at creation time.
pub async fn create_tables<C>(db: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    let schema = Schema::new(db.get_database_backend());

    create_table_for(db, &schema, UserIdentity).await?;
    create_table_for(db, &schema, EcoAction).await?;
    create_table_for(db, &schema, Badge).await?;
    create_table_for(db, &schema, RewardItem).await?;
    create_table_for(db, &schema, Transaction).await?;
    create_table_for(db, &schema, UserAction).await?;
    create_table_for(db, &schema, UserBadge).await?;
    create_table_for(db, &schema, UserStats).await?;

    info!("Database tables ensured");
    Ok(())
}
