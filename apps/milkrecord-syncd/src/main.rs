//! # MilkRecord Sync Daemon
//!
//! Hosts the sync engine next to the shop's local database and exposes the
//! operator commands.
//!
//! ## Startup Sequence
//! 1. Initialize tracing (logging)
//! 2. Load `sync.toml` + environment overrides
//! 3. Open the local database & run migrations
//! 4. Pick the remote store and connectivity probe
//! 5. Start (or attach to) the sync agent
//! 6. Run the requested command

mod error;
mod seed;

use clap::{Parser, Subcommand};
use milkrecord_core::RecordKind;
use milkrecord_db::{Database, DbConfig};
use milkrecord_sync::{
    ConnectivityProbe, HttpProbe, MemoryRemoteStore, RemoteStore, StaticProbe, SupabaseRemoteStore,
    SyncAgentBuilder, SyncAgentHandle, SyncConfig, SyncStatusReport, TracingEmitter,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::CliResult;

#[derive(Parser)]
#[command(name = "milkrecord-syncd")]
#[command(about = "Offline-first sync daemon for MilkRecord POS")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to sync.toml (defaults to the platform config directory)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Path to the local database file
    #[arg(long, value_name = "PATH", global = true)]
    db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the background sync loop until Ctrl-C
    Run {
        /// Never touch the network; records stay pending
        #[arg(long)]
        offline: bool,
    },
    /// Show pending and conflict counts per table
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run one sync pass now
    ForceSync,
    /// Put conflict records back in the sync queue
    ResetConflicts {
        /// Only this table (e.g. "sales", "milk_collections")
        #[arg(long, value_parser = parse_kind)]
        kind: Option<RecordKind>,
    },
    /// Show the most recent sync log entries
    Logs {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },
    /// Delete sync log entries older than N days
    PruneLogs {
        #[arg(long)]
        days: u32,
    },
    /// Save the starter dairy catalogue through the write path
    Seed,
}

fn parse_kind(raw: &str) -> Result<RecordKind, String> {
    raw.parse().map_err(|e: milkrecord_core::CoreError| e.to_string())
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();

    let mut config = SyncConfig::load(cli.config)?;
    if let Some(path) = cli.db_path {
        config.database.path = Some(path);
    }

    let offline = matches!(cli.command, Commands::Run { offline: true });
    let spawn_loop = matches!(cli.command, Commands::Run { .. });
    let handle = open_agent(config, offline, spawn_loop).await?;

    match cli.command {
        Commands::Run { .. } => {
            info!(device_id = %handle.device().device_id, "Sync daemon running, Ctrl-C to stop");
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl-C, stopping");
            }
        }
        Commands::Status { json } => {
            let status = handle.status().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }
        Commands::ForceSync => {
            let report = handle.force_sync().await;
            if report.skipped_offline {
                println!("Offline, nothing pushed.");
            } else {
                println!(
                    "Attempted {}, synced {}, failed {}, conflicts {}",
                    report.attempted, report.synced, report.failed, report.conflicts
                );
            }
        }
        Commands::ResetConflicts { kind } => {
            let reset = handle.reset_conflicts(kind).await?;
            println!("Reset {} conflict record(s) to pending", reset);
        }
        Commands::Logs { limit } => {
            for entry in handle.recent_logs(limit).await? {
                println!(
                    "{}  {:<8} {:<16} {}  {:<7} v{}{}",
                    entry.created_at.format("%Y-%m-%d %H:%M:%S"),
                    entry.status.as_str(),
                    entry.table_name.table_name(),
                    entry.record_id,
                    entry.action.as_str(),
                    entry.local_version.unwrap_or_default(),
                    entry
                        .error_message
                        .map(|m| format!("  ({})", m))
                        .unwrap_or_default(),
                );
            }
        }
        Commands::PruneLogs { days } => {
            let pruned = handle.prune_logs(days).await?;
            println!("Pruned {} sync log entries", pruned);
        }
        Commands::Seed => {
            let synced = seed::seed_catalogue(handle.writer()).await?;
            println!(
                "Seeded {} products ({} synced)",
                seed::starter_products().len(),
                synced
            );
        }
    }

    handle.shutdown().await?;
    Ok(())
}

/// Opens the database and wires the agent.
///
/// Without a configured remote store every command runs offline: records
/// are kept locally and stay pending.
async fn open_agent(config: SyncConfig, offline: bool, spawn_loop: bool) -> CliResult<SyncAgentHandle> {
    let db_path = config.database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let db = Arc::new(Database::new(DbConfig::new(db_path)).await?);

    let (remote, probe): (Arc<dyn RemoteStore>, Arc<dyn ConnectivityProbe>) =
        if config.remote.is_configured() {
            let remote: Arc<dyn RemoteStore> = Arc::new(SupabaseRemoteStore::from_config(&config)?);
            let probe: Arc<dyn ConnectivityProbe> = if offline {
                Arc::new(StaticProbe::offline())
            } else {
                Arc::new(HttpProbe::from_config(&config)?)
            };
            (remote, probe)
        } else {
            if !offline {
                warn!("Remote store not configured (SUPABASE_URL / SUPABASE_KEY), running offline");
            }
            let remote: Arc<dyn RemoteStore> = Arc::new(MemoryRemoteStore::new());
            let probe: Arc<dyn ConnectivityProbe> = Arc::new(StaticProbe::offline());
            (remote, probe)
        };

    let agent = SyncAgentBuilder::new(config)
        .with_database(db)
        .with_remote(remote)
        .with_probe(probe)
        .with_emitter(Arc::new(TracingEmitter))
        .build()?;

    let handle = if spawn_loop {
        agent.start().await?
    } else {
        agent.attach().await?
    };

    Ok(handle)
}

fn print_status(status: &SyncStatusReport) {
    println!("Device:   {}", status.device_id);
    println!(
        "Internet: {}",
        if status.internet_available { "online" } else { "offline" }
    );
    println!();
    println!("{:<18} {:>8} {:>9}", "TABLE", "PENDING", "CONFLICT");
    for kind in RecordKind::ALL {
        println!(
            "{:<18} {:>8} {:>9}",
            kind.table_name(),
            status.pending_counts_by_table.get(&kind).copied().unwrap_or(0),
            status.conflict_counts_by_table.get(&kind).copied().unwrap_or(0),
        );
    }

    if let Some(pass) = &status.last_pass {
        println!();
        println!(
            "Last pass {}: synced {}, failed {}, conflicts {}",
            pass.finished_at.format("%Y-%m-%d %H:%M:%S"),
            pass.synced,
            pass.failed,
            pass.conflicts
        );
    }
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=milkrecord_sync=trace` - Probe and conflict-check detail
/// - Default: INFO, DEBUG for milkrecord crates
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,milkrecord=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
