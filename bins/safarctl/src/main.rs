//! `safarctl`: operator command line for the Safar ledger.

use clap::Parser;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use safar_shared::AppConfig;

mod cli;
mod commands;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "safar=debug,sea_orm=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = cli::Cli::parse();
    let config = AppConfig::load()?;
    let db = safar_db::connect_with(&config.database).await?;
    debug!("Connected to database");

    let ledger = commands::Ledger::new(db, &config);
    commands::run_command(&ledger, cli).await
}
