use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use tracing::info;

use crate::config::{self, AppConfig};
use crate::database::{ensure_schema, DatabaseManager};
use crate::server;
use crate::state::AppState;

#[derive(Parser)]
#[command(name = "notes-api")]
#[command(about = "Notes API - per-user notes with shared tags over HTTP")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve {
        #[arg(long, help = "Interface to bind, overrides API_HOST")]
        host: Option<String>,

        #[arg(long, help = "Port to bind, overrides PORT / NOTES_API_PORT")]
        port: Option<u16>,
    },

    #[command(about = "Create the database schema and exit")]
    Migrate,
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = config::config();

    match cli.command.unwrap_or(Commands::Serve { host: None, port: None }) {
        Commands::Serve { host, port } => {
            config.validate().map_err(|e| anyhow!(e))?;
            info!("Starting {} in {:?} mode", config.app_name, config.environment);

            let pool = prepare_database(config).await?;
            let host = host.unwrap_or_else(|| config.api.host.clone());
            let port = port.unwrap_or(config.api.port);
            server::serve(AppState::new(pool), &host, port).await
        }
        Commands::Migrate => {
            prepare_database(config).await?;
            info!("Schema is up to date");
            Ok(())
        }
    }
}

async fn prepare_database(config: &AppConfig) -> anyhow::Result<sqlx::PgPool> {
    let pool = DatabaseManager::connect(&config.database)
        .await
        .context("failed to connect to the database")?;
    ensure_schema(&pool).await.context("failed to apply the schema")?;
    Ok(pool)
}
