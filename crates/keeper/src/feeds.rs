//! JSON-lines feeds standing in for the liquidity pool and the index bridge.
//!
//! Each feed is an append-only file with one JSON object per line. A cursor
//! remembers how many complete lines it has handed out; a trailing line
//! without its newline is left for the next read.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ramifi_core::{Address, CoreError, RebaseEngine};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::{FeedConfig, RetryConfig};
use crate::error::{KeeperError, KeeperResult};

/// Cumulative-price sample from the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct MarketSample {
    pub cumulative_price: u128,
    pub timestamp: i64,
}

/// Reference index report from a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct IndexReport {
    pub provider: Address,
    pub value: u128,
    pub timestamp: i64,
}

/// Read position in one feed file
#[derive(Debug, Clone)]
pub struct FeedCursor<T> {
    path: PathBuf,
    consumed: usize,
    _record: PhantomData<T>,
}

impl<T: DeserializeOwned> FeedCursor<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            consumed: 0,
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Complete lines handed out so far
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Records appended since the last read. A missing file reads as empty.
    pub async fn read_new(&mut self) -> KeeperResult<Vec<T>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let (records, complete) = parse_lines(&content, self.consumed, &self.path)?;
        self.consumed = complete;
        Ok(records)
    }

    /// `read_new` with exponential backoff on I/O failures
    pub async fn read_with_retry(&mut self, retry: &RetryConfig) -> KeeperResult<Vec<T>> {
        let mut attempt = 0;
        loop {
            match self.read_new().await {
                Ok(records) => return Ok(records),
                Err(e) if e.is_transient() && attempt < retry.max_retries => {
                    let delay = retry.delay_for_attempt(attempt);
                    log::warn!(
                        "Reading {} failed (attempt {}): {}, retrying in {}ms",
                        self.path.display(),
                        attempt + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Parse complete lines after the first `skip`; returns the records and the
/// new count of complete lines
fn parse_lines<T: DeserializeOwned>(content: &str, skip: usize, path: &Path) -> KeeperResult<(Vec<T>, usize)> {
    let mut complete: Vec<&str> = content.split_inclusive('\n').collect();
    if complete.last().is_some_and(|line| !line.ends_with('\n')) {
        complete.pop();
    }

    let mut records = Vec::new();
    for (index, line) in complete.iter().enumerate().skip(skip) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record = serde_json::from_str(line).map_err(|e| KeeperError::FeedError {
            path: path.display().to_string(),
            line: index + 1,
            reason: e.to_string(),
        })?;
        records.push(record);
    }

    Ok((records, complete.len()))
}

/// Outcome of one ingestion pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub observations: usize,
    pub reports: usize,
    pub rejected: usize,
}

/// Moves new feed records into the shared engine
pub struct FeedIngestor {
    engine: Arc<Mutex<RebaseEngine>>,
    market: FeedCursor<MarketSample>,
    index: FeedCursor<IndexReport>,
    retry: RetryConfig,
}

impl FeedIngestor {
    pub fn new(engine: Arc<Mutex<RebaseEngine>>, feeds: &FeedConfig, retry: RetryConfig) -> Self {
        Self {
            engine,
            market: FeedCursor::new(&feeds.market_path),
            index: FeedCursor::new(&feeds.index_path),
            retry,
        }
    }

    /// Read both feeds and apply every new record. Records the engine
    /// rejects are logged and counted; they do not stop the pass. After a
    /// restart the feeds are replayed from the top and records already in the
    /// restored state fall out as out-of-order.
    pub async fn ingest(&mut self) -> KeeperResult<IngestStats> {
        let samples = self.market.read_with_retry(&self.retry).await?;
        let reports = self.index.read_with_retry(&self.retry).await?;

        let mut stats = IngestStats::default();
        if samples.is_empty() && reports.is_empty() {
            return Ok(stats);
        }

        let mut engine = self.engine.lock().await;
        for sample in samples {
            match engine.ingest_observation(sample.cumulative_price, sample.timestamp) {
                Ok(()) => stats.observations += 1,
                Err(e) => {
                    log_rejection(&e, "market sample", sample.timestamp);
                    stats.rejected += 1;
                }
            }
        }
        for report in reports {
            match engine.push_index(&report.provider, report.value, report.timestamp) {
                Ok(()) => stats.reports += 1,
                Err(e) => {
                    log_rejection(&e, "index report", report.timestamp);
                    stats.rejected += 1;
                }
            }
        }

        log::debug!(
            "Ingested {} samples, {} reports, {} rejected",
            stats.observations,
            stats.reports,
            stats.rejected
        );
        Ok(stats)
    }
}

/// Replayed records are expected after a restart
fn log_rejection(err: &CoreError, kind: &str, timestamp: i64) {
    match err {
        CoreError::OutOfOrderObservation { .. } | CoreError::NonMonotonicTimestamp { .. } => {
            log::debug!("Skipped {} at {}: {}", kind, timestamp, err)
        }
        _ => log::warn!("Rejected {} at {}: {}", kind, timestamp, err),
    }
}
