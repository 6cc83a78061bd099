use bud_ledger::{
    config::{catalog, database},
    core::{rewards::RewardService, seed, sweep},
    errors::Result,
};
use dotenvy::dotenv;
use std::{env, sync::Arc};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file
    dotenv().ok(); // Non-fatal, env vars can be set externally
    info!("Attempted to load .env file.");

    // 3. Load the catalog
    let config_path =
        env::var("BUD_LEDGER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = catalog::load_config_or_builtin(&config_path)
        .inspect_err(|e| error!("Failed to load catalog: {}", e))?;

    // 4. Connect and make sure the schema exists
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {}", e))?;

    // 5. Seed catalog entries that are missing
    seed::seed_catalog(&db, &config)
        .await
        .inspect_err(|e| error!("Failed to seed catalog: {}", e))?;

    // 6. Reconcile stats, once or on an interval until Ctrl-C
    let service = Arc::new(RewardService::with_defaults(db));
    if env::args().any(|arg| arg == "--once") {
        let report = sweep::reconcile_all(&service).await?;
        for (user_id, e) in &report.failures {
            error!(user_id, "Reconciliation failed: {}", e);
        }
        return Ok(());
    }

    let interval = config.sweep.interval();
    info!("Running reconciliation sweep every {:?}", interval);
    sweep::run_periodic(service, interval, sweep::shutdown_on(tokio::signal::ctrl_c())).await;

    Ok(())
}
