//! ---
//! ncm_section: "01-core-functionality"
//! ncm_subsection: "binary"
//! ncm_type: "source"
//! ncm_scope: "code"
//! ncm_description: "Binary entrypoint for the NCM daemon."
//! ncm_version: "v0.0.0-prealpha"
//! ncm_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use ncm_baseline::{BaselineManager, TableRenderer};
use ncm_common::config::AppConfig;
use ncm_common::logging::init_tracing;
use ncm_jobs::{DisconnectedBackend, EventBus, JobEngine, NullCommandSink};
use ncm_model::BaselineTrack;
use ncm_platform::ServicePlatformClient;
use ncm_store::{ChangeEvent, ChangeNotifier, FileBaselineStore, Store};
use tokio::signal;
use tracing::{debug, info, warn};

#[derive(Debug, Parser)]
#[command(author, version, about = "NCM daemon", long_about = None)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run the daemon")]
    Run,
    #[command(about = "Load and validate the configuration, then exit")]
    CheckConfig,
}

/// Notification sink used until a northbound transport is attached; change
/// events go to the log stream instead of being dropped silently.
#[derive(Debug, Default)]
struct LogNotifier;

impl ChangeNotifier for LogNotifier {
    fn notify(&self, event: ChangeEvent) {
        debug!(
            kind = ?event.kind,
            action = ?event.action,
            project_id = event.project_id,
            is_patch = event.is_patch,
            "baseline change event"
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/ncm.toml"));
    candidates.push(PathBuf::from("configs/ncm.dev.toml"));

    let loaded = AppConfig::load_with_source(&candidates)?;
    let config = loaded.config;
    init_tracing("ncmd", &config.logging)?;
    info!(source = %loaded.source.display(), "configuration loaded");

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_daemon(config).await,
        Commands::CheckConfig => {
            println!("configuration OK ({})", loaded.source.display());
            Ok(())
        }
    }
}

async fn run_daemon(config: AppConfig) -> Result<()> {
    let store = Arc::new(Store::new());
    let artifacts = Arc::new(FileBaselineStore::new(config.storage.root.clone()));

    recover_baselines(&store, &artifacts)?;

    let platform = Arc::new(ServicePlatformClient::new(&config.platform)?);
    if config.platform.endpoint.is_none() {
        info!("service platform endpoint not configured; baseline registration disabled");
    }

    // Held for the process lifetime; operations are invoked once a
    // northbound management transport attaches.
    let _manager = BaselineManager::new(
        Arc::clone(&store),
        artifacts,
        Arc::new(LogNotifier),
        Arc::new(TableRenderer),
        platform,
    );

    let engine = JobEngine::new(
        Arc::clone(&store),
        Arc::new(DisconnectedBackend),
        Arc::new(NullCommandSink),
        Arc::new(EventBus::default()),
        Duration::from_secs(config.jobs.poll_fallback_secs),
    );

    info!("daemon running; waiting for termination signal");
    signal::ctrl_c().await?;
    info!("ctrl-c received; shutting down");
    engine.shutdown();

    Ok(())
}

/// Re-populate the in-memory baseline sets from the on-disk artifacts. The
/// design-id counter advances past every recovered design id.
fn recover_baselines(store: &Store, artifacts: &FileBaselineStore) -> Result<()> {
    let mut state = store.lock();
    for track in [BaselineTrack::Design, BaselineTrack::Operation] {
        let recovered = match artifacts.load_baselines(track) {
            Ok(recovered) => recovered,
            Err(err) => {
                warn!(%track, %err, "baseline recovery scan failed; starting with an empty set");
                continue;
            }
        };
        let count = recovered.len();
        for baseline in recovered {
            state.restore_baseline(track, baseline);
        }
        info!(%track, count, "baseline artifacts recovered");
    }
    Ok(())
}
