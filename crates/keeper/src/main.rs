use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::time;

use ramifi_keeper::{create_example_config, FeedIngestor, Keeper, KeeperConfig, TickResult};

#[derive(Parser, Debug)]
#[command(name = "ramifi-keeper")]
#[command(about = "Ramifi elastic supply orchestrator")]
struct Args {
    /// Path to keeper configuration file
    #[arg(short, long, default_value = "keeper.toml")]
    config: String,

    /// Snapshot file; overrides `state_file` from the configuration
    #[arg(short, long)]
    state: Option<PathBuf>,

    /// Rebase check interval in seconds; overrides `update_interval`
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    interval: Option<u64>,

    /// Dry run mode - compute but don't apply rebases
    #[arg(long)]
    dry_run: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Write an example configuration to `--config` and exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .default_filter_or(if args.verbose { "debug" } else { "info" })
    ).init();

    if args.init_config {
        create_example_config(&args.config)
            .with_context(|| format!("writing example config to {}", args.config))?;
        log::info!("Example configuration written to {}", args.config);
        return Ok(());
    }

    log::info!("Starting Ramifi Keeper");

    if args.dry_run {
        log::warn!("Running in DRY RUN mode - no rebases will be applied");
    }

    // Load configuration
    let config = KeeperConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config))?;

    let interval = args.interval.unwrap_or(config.update_interval);
    let state_path = args.state.clone().or_else(|| config.state_file.as_ref().map(PathBuf::from));

    log::info!("Update interval: {}s", interval);
    log::info!("Orchestrator: {}", config.addresses.orchestrator);

    // Initialize keeper
    let keeper = Keeper::new(&config, state_path, args.dry_run).await?;

    log::info!("Keeper initialized successfully");

    // Feed ingestion runs on its own timer and shares the engine lock
    let mut ingestor = FeedIngestor::new(keeper.engine(), &config.feeds, config.retry.clone());
    let poll_interval = config.feeds.poll_interval;
    tokio::spawn(async move {
        let mut timer = time::interval(Duration::from_secs(poll_interval));
        loop {
            timer.tick().await;
            if let Err(e) = ingestor.ingest().await {
                log::error!("Feed ingestion failed: {}", e);
            }
        }
    });

    // Start main rebase loop
    let mut interval_timer = time::interval(Duration::from_secs(interval));
    let mut iteration = 0u64;

    loop {
        interval_timer.tick().await;
        iteration += 1;

        log::debug!("Starting keeper iteration {}", iteration);

        match keeper.run_tick().await {
            Ok(TickResult::Rebased(outcome)) => {
                log::info!("Iteration {}: rebased by {}", iteration, outcome.supply_delta);
            }
            Ok(TickResult::Previewed(_)) | Ok(TickResult::Skipped(_)) => {}
            Err(e) => {
                log::error!("Error in keeper iteration {}: {}", iteration, e);
                // Continue running even if individual iterations fail
            }
        }

        // Basic health report every 100 iterations
        if iteration % 100 == 0 {
            log::info!("Keeper health check - iteration {}", iteration);
            if let Err(e) = keeper.health_check(chrono::Utc::now().timestamp()).await {
                log::warn!("Health check warning: {}", e);
            }
        }
    }
}
