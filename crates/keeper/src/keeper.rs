use std::path::{Path, PathBuf};
use std::sync::Arc;

use ramifi_core::engine::EngineSnapshot;
use ramifi_core::{Address, CoreError, RebaseEngine, RebaseOutcome, SupplyDelta};
use tokio::sync::Mutex;

use crate::config::KeeperConfig;
use crate::error::KeeperResult;

/// What one rebase tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickResult {
    /// Rebase applied and state persisted
    Rebased(RebaseOutcome),
    /// Dry run: the cycle would have produced this delta
    Previewed(SupplyDelta),
    /// Cycle not possible yet; try again next tick
    Skipped(CoreError),
}

/// Orchestrator service: triggers policy cycles and persists the engine
pub struct Keeper {
    /// Shared with the feed ingestion task
    engine: Arc<Mutex<RebaseEngine>>,

    /// Identity passed to the policy as caller
    orchestrator: Address,

    /// Snapshot file, if persistence is enabled
    state_path: Option<PathBuf>,

    /// Dry run mode flag
    dry_run: bool,
}

impl Keeper {
    /// Restore from `state_path` if it exists, otherwise start from genesis
    pub async fn new(config: &KeeperConfig, state_path: Option<PathBuf>, dry_run: bool) -> KeeperResult<Self> {
        let saved = match &state_path {
            Some(path) => tokio::fs::try_exists(path).await?,
            None => false,
        };

        let engine = match &state_path {
            Some(path) if saved => {
                let json = tokio::fs::read_to_string(path).await?;
                let snapshot = EngineSnapshot::from_json(&json)?;
                log::info!("Restoring engine from {}", path.display());
                RebaseEngine::restore(snapshot)?
            }
            _ => {
                log::info!("No saved state, starting from genesis");
                RebaseEngine::genesis(&config.engine_config())?
            }
        };

        Ok(Self {
            engine: Arc::new(Mutex::new(engine)),
            orchestrator: config.addresses.orchestrator,
            state_path,
            dry_run,
        })
    }

    pub fn engine(&self) -> Arc<Mutex<RebaseEngine>> {
        self.engine.clone()
    }

    pub fn state_path(&self) -> Option<&Path> {
        self.state_path.as_deref()
    }

    /// Run one policy cycle at the current wall-clock time
    pub async fn run_tick(&self) -> KeeperResult<TickResult> {
        self.tick(chrono::Utc::now().timestamp()).await
    }

    /// Run one policy cycle at `now`. Waiting conditions come back as
    /// `Skipped`; anything else is an error.
    pub async fn tick(&self, now: i64) -> KeeperResult<TickResult> {
        let mut engine = self.engine.lock().await;

        if self.dry_run {
            return match engine.preview(&self.orchestrator, now) {
                Ok(delta) => {
                    log::info!(
                        "DRY RUN: would rebase by {} (market {}, target {}, deviation {}bps)",
                        delta.supply_delta,
                        delta.market_price,
                        delta.target_price,
                        delta.deviation_bps
                    );
                    Ok(TickResult::Previewed(delta))
                }
                Err(e) => skip_or_fail(e),
            };
        }

        match engine.rebase(&self.orchestrator, now) {
            Ok(outcome) => {
                if let Some(event) = outcome.event {
                    log::info!(
                        "Epoch {} applied: delta {}, supply {}",
                        event.epoch,
                        event.applied_delta,
                        event.resulting_total_supply
                    );
                    if let Err(signal) = event.check_bounds() {
                        log::warn!("{}", signal);
                    }
                }
                // The rebase is already applied; a failed write is retried on
                // the next successful cycle
                if let Err(e) = self.persist(&engine).await {
                    log::error!("Rebase applied but state not saved: {}", e);
                }
                Ok(TickResult::Rebased(outcome))
            }
            Err(e) => skip_or_fail(e),
        }
    }

    /// Write the engine snapshot next to its final path, then rename over it
    async fn persist(&self, engine: &RebaseEngine) -> KeeperResult<()> {
        let Some(path) = &self.state_path else {
            return Ok(());
        };

        let json = engine.snapshot()?.to_json()?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        log::debug!("State saved to {}", path.display());
        Ok(())
    }

    /// Log a summary of the engine and warn on a quiet market feed
    pub async fn health_check(&self, now: i64) -> KeeperResult<()> {
        let engine = self.engine.lock().await;
        let policy = engine.policy();

        log::info!(
            "Supply {}, epoch {}, last rebase {:?}",
            engine.token().total_supply(),
            policy.epoch(),
            policy.last_rebase_timestamp()
        );

        if let Some(quiet) = market_feed_quiet_for(&engine, now) {
            log::warn!("Market feed quiet for {}s", quiet);
        } else if engine.market_oracle().latest().is_none() {
            log::warn!("No market observations yet");
        }

        Ok(())
    }
}

/// Age of the latest market sample when it exceeds the TWAP staleness bound
fn market_feed_quiet_for(engine: &RebaseEngine, now: i64) -> Option<i64> {
    let oracle = engine.market_oracle();
    let age = now.saturating_sub(oracle.latest()?.timestamp);
    (age > oracle.config().max_staleness).then_some(age)
}

fn skip_or_fail(err: CoreError) -> KeeperResult<TickResult> {
    if !err.is_retryable() {
        return Err(err.into());
    }
    match err {
        CoreError::StaleOracleData { .. } => log::warn!("Rebase skipped: {}", err),
        _ => log::debug!("Rebase not due: {}", err),
    }
    Ok(TickResult::Skipped(err))
}
