//! # Redaction Bot Runner
//!
//! Processes one region (or, with `--ignore-regions`, one capped batch of
//! candidates) and exits. Exit status is `0` only for a run that committed
//! work without any failure.

use anyhow::Context;
use clap::Parser;
use redaction_bot::config::{CandidateSourceKind, ConfigManager};
use redaction_bot::logging::init_run_logging;
use redaction_bot::models::RedactionIds;
use redaction_bot::orchestration::{MapCandidateSource, RunContext, RunOrchestrator, RunSummary};
use redaction_bot::remote::{OsmApiClient, RemoteEditService, ReqwestTransport};
use redaction_bot::source::{PgSourceStore, UnlinkedCompiler};
use redaction_bot::tracker::{CandidateStore, PgCandidateStore, PgRegionScheduler};
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "run-bot")]
#[command(about = "Claim a region and apply the redaction bot's edits to it")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Output more information to the console
    #[arg(short, long)]
    verbose: bool,

    /// Ignore the list of regions, and just process the candidates directly
    #[arg(short, long)]
    ignore_regions: bool,

    /// Redaction id used for hidden redactions
    #[arg(long, default_value_t = 1)]
    redaction_hidden: i64,

    /// Redaction id used for visible redactions
    #[arg(long, default_value_t = 2)]
    redaction_visible: i64,

    /// Compute and log everything, but change nothing
    #[arg(short = 'n', long)]
    no_action: bool,

    /// Configuration file (default: $REDACTION_BOT_CONFIG or config/redaction-bot.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(status) => ExitCode::from(status),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    let manager = ConfigManager::load(cli.config.clone()).context("Failed to load configuration")?;
    let logging = &manager.config().logging;
    let run_log = init_run_logging(&logging.directory, cli.verbose)
        .with_context(|| format!("Failed to set up logging in {}", logging.directory.display()))?;
    manager.log_loaded();
    let config = manager.into_config();

    if cli.verbose {
        println!("Logging to {}", run_log.path().display());
    }
    if cli.no_action {
        info!("No actions will be taken");
    }

    let tracker_pool = PgPoolOptions::new()
        .max_connections(config.tracker.max_connections)
        .connect(&config.tracker.url)
        .await
        .context("Failed to connect to the tracker database")?;
    let source_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to the source database")?;

    let transport = ReqwestTransport::new(&config.api).context("Failed to build API client")?;
    let remote: Arc<dyn RemoteEditService> =
        Arc::new(OsmApiClient::new(transport, config.limits.throttle_policy()));
    let candidates: Arc<dyn CandidateStore> =
        Arc::new(PgCandidateStore::new(tracker_pool.clone(), cli.no_action));
    let scheduler = Arc::new(PgRegionScheduler::new(
        tracker_pool,
        config.limits.conflict_radius_degrees,
        cli.no_action,
    ));

    let context = RunContext {
        dry_run: cli.no_action,
        ignore_regions: cli.ignore_regions,
        redaction_ids: RedactionIds {
            hidden: cli.redaction_hidden,
            visible: cli.redaction_visible,
        },
        limits: config.limits.clone(),
        changeset_metadata: config.changeset.clone(),
    };

    let mut orchestrator = RunOrchestrator::new(
        context,
        PgSourceStore::new(source_pool),
        UnlinkedCompiler,
        scheduler,
        candidates.clone(),
        remote.clone(),
    );
    if config.candidate_source == CandidateSourceKind::Map {
        orchestrator =
            orchestrator.with_candidate_source(Arc::new(MapCandidateSource::new(remote, candidates)));
    }

    let mut summary = RunSummary::new();
    let result = orchestrator.run(&mut summary).await;
    summary.log();

    if let Err(e) = result {
        error!(error = %e, "Run aborted");
        eprintln!("Run aborted: {e}");
        return Ok(1);
    }

    if cli.no_action {
        warn!("No actions committed");
    }
    Ok(summary.exit_status(cli.no_action))
}
