use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use marketpulse::config::Config;
use marketpulse::dedup::{self, CleanupStats};
use marketpulse::storage::{Database, StorageError};
use marketpulse::sync::{
    PgReplica, ReplicaConnection, SqliteReplica, SyncReconciler, SyncScheduler, SyncTable,
    SyncVerifier,
};

/// Get the config directory path (~/.config/marketpulse/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("marketpulse"))
}

#[derive(Parser, Debug)]
#[command(
    name = "marketpulse",
    about = "Deduplication and replica sync for the stock news store"
)]
struct Args {
    /// Path to config file (default: ~/.config/marketpulse/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report duplicates without removing anything
    Analyze,
    /// Remove duplicate articles (dry run unless --force)
    Cleanup {
        /// Actually delete; without this flag nothing is removed
        #[arg(long)]
        force: bool,
    },
    /// Compare table counts between the local store and the remote replica
    Verify,
    /// Verify and copy missing records (requires --force to write)
    Sync {
        /// Actually copy records; without this flag only the verify runs
        #[arg(long)]
        force: bool,
    },
    /// Show article counts for the local store
    Status,
    /// Run sync cycles on the configured interval until interrupted
    Watch,
}

/// Open the remote replica named by `remote_database_url`: a postgres URL
/// gets a PgReplica, anything else is treated as a SQLite path.
async fn connect_remote(url: &str) -> Result<Arc<dyn ReplicaConnection>> {
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        let replica = PgReplica::connect("remote", url)
            .await
            .context("Failed to connect to remote Postgres replica")?;
        Ok(Arc::new(replica))
    } else {
        let replica = SqliteReplica::open("remote", url)
            .await
            .context("Failed to open remote SQLite replica")?;
        Ok(Arc::new(replica))
    }
}

fn remote_url(config: &Config) -> Result<&str> {
    config
        .remote_database_url
        .as_deref()
        .context("No remote_database_url configured; sync commands need one")
}

async fn open_local(config: &Config) -> Result<Database> {
    match Database::open(&config.database_path).await {
        Ok(db) => Ok(db),
        Err(StorageError::Locked) => {
            eprintln!(
                "Error: The article database is locked by another process. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => Err(anyhow::anyhow!("Failed to open database: {}", e)),
    }
}

fn print_cleanup_stats(stats: &CleanupStats, dry_run: bool) {
    println!("Articles scanned:    {}", stats.total_articles);
    println!("URL duplicates:      {}", stats.url_duplicates);
    println!("Content duplicates:  {}", stats.content_duplicates);
    if dry_run {
        println!(
            "Dry run: {} article(s) would be removed. Re-run with --force to delete.",
            stats.marked()
        );
    } else {
        println!("Removed:             {}", stats.removed_articles);
    }
}

async fn run_verify(
    local: &dyn ReplicaConnection,
    remote: &dyn ReplicaConnection,
    max_attempts: u32,
) -> Vec<marketpulse::sync::SyncDiscrepancy> {
    let verifier = SyncVerifier::new(max_attempts);
    let discrepancies = verifier.verify(local, remote, &SyncTable::ALL).await;

    if discrepancies.is_empty() {
        println!("Replicas are in sync across all {} tables.", SyncTable::ALL.len());
    } else {
        for d in &discrepancies {
            println!(
                "{}: {} vs {} (difference {}, severity {:?})",
                d.table, d.count_a, d.count_b, d.difference, d.severity
            );
            for (key, value) in &d.details {
                println!("  {}: {}", key, value);
            }
        }
    }
    discrepancies
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => get_config_dir()?.join("config.toml"),
    };
    let config = Config::load(&config_path).context("Failed to load configuration")?;

    match args.command {
        Command::Analyze => {
            let db = open_local(&config).await?;
            let stats = dedup::analyze(&db).await?;
            print_cleanup_stats(&stats, true);

            let by_source = db.article_counts_by_source().await?;
            if !by_source.is_empty() {
                println!("\nArticles by source:");
                for (source, count) in &by_source {
                    println!("  {:<30} {}", source, count);
                }
            }
            let by_symbol = db.article_counts_by_symbol().await?;
            if !by_symbol.is_empty() {
                println!("\nArticles by symbol:");
                for (symbol, count) in &by_symbol {
                    println!("  {:<10} {}", symbol, count);
                }
            }
        }

        Command::Cleanup { force } => {
            let db = open_local(&config).await?;
            let stats = dedup::scan_and_remove(&db, !force).await?;
            print_cleanup_stats(&stats, !force);
        }

        Command::Verify => {
            let db = open_local(&config).await?;
            let local = SqliteReplica::from_database("local", &db);
            let remote = connect_remote(remote_url(&config)?).await?;
            run_verify(&local, remote.as_ref(), config.sync_max_attempts).await;
        }

        Command::Sync { force } => {
            let db = open_local(&config).await?;
            let local = SqliteReplica::from_database("local", &db);
            let remote = connect_remote(remote_url(&config)?).await?;
            let discrepancies =
                run_verify(&local, remote.as_ref(), config.sync_max_attempts).await;

            if discrepancies.is_empty() {
                return Ok(());
            }
            if !force {
                println!("\nDry run: no records copied. Re-run with --force to reconcile.");
                return Ok(());
            }

            let reconciler = SyncReconciler::new(config.sync_max_attempts);
            let outcome = reconciler
                .reconcile(&local, remote.as_ref(), &discrepancies)
                .await;
            println!("Records copied: {}", outcome.records_synced);
            if !outcome.success {
                eprintln!("Some tables could not be reconciled; see the log for details.");
                std::process::exit(1);
            }
        }

        Command::Status => {
            let db = open_local(&config).await?;
            println!("Database: {}", config.database_path);
            println!("Articles: {}", db.article_count().await?);

            let by_symbol = db.article_counts_by_symbol().await?;
            if !by_symbol.is_empty() {
                println!("\nArticles by symbol:");
                for (symbol, count) in &by_symbol {
                    println!("  {:<10} {}", symbol, count);
                }
            }
        }

        Command::Watch => {
            let db = open_local(&config).await?;
            let local: Arc<dyn ReplicaConnection> =
                Arc::new(SqliteReplica::from_database("local", &db));
            let remote = connect_remote(remote_url(&config)?).await?;
            let scheduler = SyncScheduler::new(
                local,
                remote,
                config.sync_interval_minutes,
                config.sync_max_attempts,
            );

            println!(
                "Watching: sync every {} minute(s). Press Ctrl+C to stop.",
                config.sync_interval_minutes
            );
            tokio::select! {
                _ = scheduler.run() => {}
                _ = tokio::signal::ctrl_c() => {
                    let stats = scheduler.statistics();
                    println!(
                        "\nStopped. {} sync(s), {} record(s) copied, {} discrepancy(ies) seen.",
                        stats.total_syncs, stats.records_synced, stats.discrepancies_found
                    );
                }
            }
        }
    }

    Ok(())
}
