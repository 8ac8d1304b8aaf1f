//! legisyncd entry point.
//!
//! Without a subcommand the daemon runs synchronization passes forever,
//! sleeping the configured interval between them. Logging goes to stderr as
//! JSON; command results are printed to stdout.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use legisync_client::{PullClient, ScanFilter, SyncOptions, Synchronizer};
use legisync_core::cache::{FileCache, MonitorAction, open_existence_cache};
use legisync_core::import::{BulkImporter, DirectoryArchive, ImportOptions};
use legisync_core::store::Stance;
use legisync_core::{AppConfig, Reconciler, SignalSink, StoreDb};

#[derive(Parser)]
#[command(name = "legisyncd")]
#[command(about = "Legislative data synchronization daemon", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Import an extracted dataset directory
    Import {
        /// Dataset root containing hash.md5 and the entity directories
        dir: PathBuf,
        /// Refuse the dataset unless its hash matches
        expected_hash: Option<String>,
        /// Decode every entry without writing to the store
        #[arg(long)]
        dry_run: bool,
        /// Import even when this archive hash was already imported
        #[arg(long)]
        force: bool,
    },
    /// Compare published dataset archives with what was imported
    Scan {
        /// Two-letter state abbreviation
        #[arg(long)]
        state: Option<String>,
        /// Year, or the API's relative year codes
        #[arg(long)]
        year: Option<i64>,
        /// Only special sessions
        #[arg(long, conflicts_with = "regular")]
        special: bool,
        /// Only regular sessions
        #[arg(long)]
        regular: bool,
    },
    /// Add bills to the local monitor list
    Monitor {
        /// Comma-separated bill ids
        #[arg(value_delimiter = ',', required = true)]
        bill_ids: Vec<i64>,
        #[arg(long, value_enum, default_value_t = StanceArg::Watch)]
        stance: StanceArg,
        /// Mirror the change to the remote monitor list
        #[arg(long)]
        sync: bool,
    },
    /// Remove bills from the local monitor list
    Unmonitor {
        #[arg(value_delimiter = ',', required = true)]
        bill_ids: Vec<i64>,
        #[arg(long)]
        sync: bool,
    },
    /// Add bills to the local ignore list
    Ignore {
        #[arg(value_delimiter = ',', required = true)]
        bill_ids: Vec<i64>,
        #[arg(long)]
        sync: bool,
    },
    /// Remove bills from the local ignore list
    Unignore {
        #[arg(value_delimiter = ',', required = true)]
        bill_ids: Vec<i64>,
        #[arg(long)]
        sync: bool,
    },
    /// Import the bills on the remote monitor list
    MonitorList {
        /// Also monitor every remote entry locally with its stance
        #[arg(long)]
        sync: bool,
    },
    /// Store the session list of a state
    Sessions {
        /// Two-letter state abbreviation
        state: String,
    },
    /// Purge stale entries from the response cache
    Clean,
    /// Run a single synchronization pass and exit
    Once,
}

#[derive(Clone, Copy, ValueEnum)]
enum StanceArg {
    Watch,
    Support,
    Oppose,
}

impl From<StanceArg> for Stance {
    fn from(stance: StanceArg) -> Self {
        match stance {
            StanceArg::Watch => Stance::Watch,
            StanceArg::Support => Stance::Support,
            StanceArg::Oppose => Stance::Oppose,
        }
    }
}

/// Local list edits accepted on the command line.
#[derive(Clone, Copy)]
enum ListEdit {
    Monitor(Stance),
    Unmonitor,
    Ignore,
    Unignore,
}

impl ListEdit {
    fn remote_action(self) -> MonitorAction {
        match self {
            ListEdit::Monitor(_) => MonitorAction::Monitor,
            ListEdit::Ignore => MonitorAction::Ignore,
            ListEdit::Unmonitor | ListEdit::Unignore => MonitorAction::Remove,
        }
    }

    fn stance(self) -> Stance {
        match self {
            ListEdit::Monitor(stance) => stance,
            _ => Stance::Watch,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load().context("failed to load configuration")?;

    match cli.command {
        Some(Commands::Import { dir, expected_hash, dry_run, force }) => {
            let options = ImportOptions { expected_hash, dry_run, force };
            import(&config, dir, options).await
        }
        Some(Commands::Scan { state, year, special, regular }) => {
            let special = match (special, regular) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            let filter = ScanFilter { state, year, special, ..Default::default() };
            let scanned = synchronizer(&config).await?.scan_datasets(&filter).await?;
            println!("{}", serde_json::to_string_pretty(&scanned)?);
            Ok(())
        }
        Some(Commands::Monitor { bill_ids, stance, sync }) => {
            edit_lists(&config, ListEdit::Monitor(stance.into()), &bill_ids, sync).await
        }
        Some(Commands::Unmonitor { bill_ids, sync }) => edit_lists(&config, ListEdit::Unmonitor, &bill_ids, sync).await,
        Some(Commands::Ignore { bill_ids, sync }) => edit_lists(&config, ListEdit::Ignore, &bill_ids, sync).await,
        Some(Commands::Unignore { bill_ids, sync }) => edit_lists(&config, ListEdit::Unignore, &bill_ids, sync).await,
        Some(Commands::MonitorList { sync }) => {
            let report = synchronizer(&config).await?.sync_remote_monitor_list(sync, config.import_mode).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Some(Commands::Sessions { state }) => {
            let stored = synchronizer(&config).await?.sync_sessions(&state).await?;
            tracing::info!(state = %state, sessions = stored, "sessions stored");
            Ok(())
        }
        Some(Commands::Clean) => clean(&config),
        Some(Commands::Once) => {
            let report = synchronizer(&config).await?.run_pass().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        None => run(&config).await,
    }
}

async fn reconciler(config: &AppConfig) -> Result<Reconciler> {
    let db = StoreDb::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open store at {}", config.db_path.display()))?;
    let existence = open_existence_cache(config)?;
    let documents = FileCache::permanent(&config.doc_cache_dir).context("document cache unavailable")?;
    let signals = SignalSink::from_config(config)?;

    Ok(Reconciler::new(db, existence, Arc::new(documents), signals, config.reconcile_options()))
}

async fn synchronizer(config: &AppConfig) -> Result<Synchronizer> {
    let client = PullClient::from_config(config).context("failed to build API client")?;
    Ok(Synchronizer::new(client, reconciler(config).await?, SyncOptions::from(config)))
}

async fn run(config: &AppConfig) -> Result<()> {
    let mut sync = synchronizer(config).await?;
    let interval = config.update_interval();

    tracing::info!(
        update_type = ?config.update_type,
        interval_secs = interval.as_secs(),
        "Starting legisync daemon"
    );

    loop {
        sync.run_pass().await;

        let next = chrono::Local::now() + chrono::Duration::seconds(interval.as_secs() as i64);
        tracing::info!(next_pass = %next.format("%Y-%m-%d %H:%M:%S"), "sleeping until next pass");

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down legisync daemon");
                return Ok(());
            }
        }
    }
}

async fn import(config: &AppConfig, dir: PathBuf, options: ImportOptions) -> Result<()> {
    let mut reconciler = reconciler(config).await?;
    let archive = DirectoryArchive::open(&dir).with_context(|| format!("failed to open dataset {}", dir.display()))?;

    let report = BulkImporter::new(&mut reconciler).import(&archive, &options).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Apply `edit` to the local lists, then optionally to the remote monitor list.
///
/// The API client is only built when `sync` is set, so local edits work
/// without an API key.
async fn edit_lists(config: &AppConfig, edit: ListEdit, bill_ids: &[i64], sync: bool) -> Result<()> {
    let db = StoreDb::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open store at {}", config.db_path.display()))?;

    let mut changed = 0;
    for &bill_id in bill_ids {
        let applied = match edit {
            ListEdit::Monitor(stance) => db.monitor(bill_id, stance).await.map(|_| true)?,
            ListEdit::Ignore => db.ignore(bill_id).await.map(|_| true)?,
            ListEdit::Unmonitor => db.unmonitor(bill_id).await?,
            ListEdit::Unignore => db.unignore(bill_id).await?,
        };
        if applied {
            changed += 1;
        }
    }
    tracing::info!(requested = bill_ids.len(), changed, "local lists updated");

    if sync {
        let client = PullClient::from_config(config).context("failed to build API client")?;
        let remote = Synchronizer::new(client, reconciler(config).await?, SyncOptions::from(config));
        for (bill_id, message) in remote.push_monitor(edit.remote_action(), bill_ids, edit.stance()).await? {
            println!("{bill_id}: {message}");
        }
    }
    Ok(())
}

fn clean(config: &AppConfig) -> Result<()> {
    let cache = FileCache::ephemeral(&config.api_cache_dir, config.cache_lifetime_secs)
        .context("response cache unavailable")?;
    let report = cache.purge()?;

    tracing::info!(files = report.files, bytes = report.bytes, "response cache purged");
    Ok(())
}
