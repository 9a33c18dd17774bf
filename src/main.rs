use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clinic_cache::config::AppConfig;
use clinic_cache::logging::init_logging;
use clinic_cache::models::now_millis;
use clinic_cache::{CacheDatabase, CacheRepository};
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about = "Maintain the local clinic cache database", long_about = None)]
struct Cli {
    /// Database file (overrides configuration)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the database and apply pending migrations
    Migrate,
    /// Print schema version and row counts
    Stats,
    /// Delete messages older than the retention window
    Prune {
        /// Maximum message age in days (defaults to configuration)
        #[arg(long)]
        days: Option<u32>,
    },
    /// Delete every cached chat message
    ClearMessages,
    /// Run the engine's integrity check
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load().context("Failed to load configuration")?;
    if let Some(path) = &cli.database {
        config.database.path = path.display().to_string();
    } else {
        config.database.path = config.database_path();
    }

    let _guard = init_logging(
        Some(&config.logging.level),
        config.logging.file_path.as_deref().map(std::path::Path::new),
        config.logging.format == "json",
    )
    .context("Failed to initialize logging")?;

    let db = CacheDatabase::open_with_config(&config.database)
        .with_context(|| format!("Failed to open cache database at {}", config.database.path))?;

    let outcome = run(&db, &config, cli.command).await;
    db.close().await.context("Failed to close cache database")?;
    outcome
}

#[allow(clippy::print_stdout)]
async fn run(db: &CacheDatabase, config: &AppConfig, command: Commands) -> Result<()> {
    match command {
        Commands::Migrate => {
            info!(outcome = ?db.migration_outcome(), "Migration finished");
            println!("schema version {}", db.schema_version().await?);
        },
        Commands::Stats => {
            let stats = db.stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        },
        Commands::Prune { days } => {
            let days = days.unwrap_or(config.retention.message_max_age_days);
            let removed = db.messages().prune(days, now_millis()).await?;
            info!(days, removed, "Pruned messages");
            println!("removed {removed} messages older than {days} days");
        },
        Commands::ClearMessages => {
            let removed = db.messages().clear_all().await?;
            println!("removed {removed} messages");
        },
        Commands::Check => {
            let report = db.integrity_check().await?;
            if report == ["ok"] {
                println!("ok");
            } else {
                for line in &report {
                    warn!(problem = %line, "Integrity check");
                    println!("{line}");
                }
                anyhow::bail!("integrity check reported {} problem(s)", report.len());
            }
        },
    }
    Ok(())
}
