//! Incremental block scanner: owns the scan cursor, pulls block ranges,
//! classifies transactions and fans matches out to every sink.
//!
//! The cursor only moves at the very end of a cycle that completed without
//! any connectivity or delivery error, so a failed cycle is always retried
//! from its original starting height.

use std::fmt;
use std::sync::Arc;

use futures::future::{join_all, try_join_all};
use job_watch_domain::ports::{
    ChainReader, ConnectivityError, DeliveryError, NotificationSink, WhitelistSource,
};
use job_watch_domain::{Address, Block, Selector, Transaction, Whitelist, WorkDetector};
use metrics::{counter, gauge};
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};

/// Inclusive range of block heights covered by one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub from: u64,
    pub to: u64,
}

impl BlockRange {
    pub fn new(from: u64, to: u64) -> Self {
        debug_assert!(from <= to);
        Self { from, to }
    }

    /// Number of heights covered; never zero.
    pub fn block_count(&self) -> u64 {
        self.to - self.from + 1
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.from, self.to)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Bootstrap,
    Tick,
}

impl CyclePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bootstrap => "bootstrap",
            Self::Tick => "tick",
        }
    }
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single sink invocation that failed during a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub sink: String,
    pub job: Address,
    pub tx_hash: String,
    pub height: u64,
    pub error: DeliveryError,
}

impl fmt::Display for DeliveryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} (tx {} at block {}): {}",
            self.sink, self.job, self.tx_hash, self.height, self.error
        )
    }
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("tick requested before a successful bootstrap")]
    NotBootstrapped,
    #[error("{phase}: failed to read chain head: {source}")]
    Head {
        phase: CyclePhase,
        #[source]
        source: ConnectivityError,
    },
    #[error("{phase}: failed to resolve whitelist for blocks {range}: {source}")]
    Whitelist {
        phase: CyclePhase,
        range: BlockRange,
        #[source]
        source: ConnectivityError,
    },
    #[error("{phase}: failed to fetch block {height} while scanning {range}: {source}")]
    Block {
        phase: CyclePhase,
        range: BlockRange,
        height: u64,
        #[source]
        source: ConnectivityError,
    },
    #[error("{phase}: {} notification(s) failed while scanning {range}", .failures.len())]
    Delivery {
        phase: CyclePhase,
        range: BlockRange,
        failures: Vec<DeliveryFailure>,
    },
}

impl ScanError {
    /// Delivery failures collected by the cycle, if that is why it failed.
    pub fn delivery_failures(&self) -> &[DeliveryFailure] {
        match self {
            Self::Delivery { failures, .. } => failures,
            _ => &[],
        }
    }
}

/// Summary of a completed cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// `None` when the head had not moved past the cursor.
    pub range: Option<BlockRange>,
    pub blocks_scanned: u64,
    pub blocks_missing: u64,
    pub matches: u64,
    pub notifications: u64,
}

impl CycleReport {
    fn for_range(range: BlockRange) -> Self {
        Self {
            range: Some(range),
            ..Self::default()
        }
    }
}

struct Match<'a> {
    job: Address,
    tx: &'a Transaction,
}

/// Scans a chain for whitelisted job executions.
///
/// Holds the cursor for one chain; run several engines for several chains.
/// `bootstrap` and `tick` take `&mut self`, so overlapping cycles on the same
/// engine are rejected at compile time.
pub struct ScanEngine<C, W> {
    chain: C,
    whitelist: W,
    detector: WorkDetector,
    selector: Selector,
    sinks: Vec<Arc<dyn NotificationSink>>,
    fetch_concurrency: usize,
    cursor: Option<u64>,
}

impl<C, W> ScanEngine<C, W>
where
    C: ChainReader,
    W: WhitelistSource,
{
    pub fn new(
        chain: C,
        whitelist: W,
        selector: Selector,
        sinks: Vec<Arc<dyn NotificationSink>>,
    ) -> Self {
        Self {
            chain,
            whitelist,
            detector: WorkDetector::new(),
            selector,
            sinks,
            fetch_concurrency: 1,
            cursor: None,
        }
    }

    /// Number of block fetches kept in flight at once. Values below one are
    /// treated as one.
    pub fn with_fetch_concurrency(mut self, concurrency: usize) -> Self {
        self.fetch_concurrency = concurrency.max(1);
        self
    }

    /// Height of the last fully processed block, `None` before bootstrap.
    pub fn cursor(&self) -> Option<u64> {
        self.cursor
    }

    /// Scans `[head - lookback_blocks, head]` (clamped at genesis) and, on
    /// success, parks the cursor at `head`.
    pub async fn bootstrap(&mut self, lookback_blocks: u64) -> Result<CycleReport, ScanError> {
        let phase = CyclePhase::Bootstrap;
        let head = self.read_head(phase).await?;
        let range = BlockRange::new(head.saturating_sub(lookback_blocks), head);

        let report = self.run_cycle(phase, range).await?;
        self.advance(head);
        Ok(report)
    }

    /// Scans everything between the cursor and the current head. A head that
    /// has not moved is a no-op that touches no other collaborator.
    pub async fn tick(&mut self) -> Result<CycleReport, ScanError> {
        let phase = CyclePhase::Tick;
        let cursor = self.cursor.ok_or(ScanError::NotBootstrapped)?;
        let head = self.read_head(phase).await?;

        if head <= cursor {
            debug!(head, cursor, "no new blocks");
            return Ok(CycleReport::default());
        }

        let range = BlockRange::new(cursor + 1, head);
        let report = self.run_cycle(phase, range).await?;
        self.advance(head);
        Ok(report)
    }

    async fn read_head(&self, phase: CyclePhase) -> Result<u64, ScanError> {
        self.chain
            .current_height()
            .await
            .map_err(|source| ScanError::Head { phase, source })
    }

    fn advance(&mut self, head: u64) {
        self.cursor = Some(head);
        gauge!("monitor_cursor_height").set(head as f64);
    }

    async fn run_cycle(
        &self,
        phase: CyclePhase,
        range: BlockRange,
    ) -> Result<CycleReport, ScanError> {
        let span = info_span!("scan_cycle", %phase, from = range.from, to = range.to);
        let result = self.scan(phase, range).instrument(span).await;

        let outcome = if result.is_ok() { "ok" } else { "error" };
        counter!("monitor_cycles_total", "phase" => phase.as_str(), "result" => outcome)
            .increment(1);
        result
    }

    async fn scan(&self, phase: CyclePhase, range: BlockRange) -> Result<CycleReport, ScanError> {
        let whitelist: Whitelist = self
            .whitelist
            .addresses()
            .await
            .map_err(|source| ScanError::Whitelist {
                phase,
                range,
                source,
            })?
            .into_iter()
            .collect();
        if whitelist.is_empty() {
            warn!(%range, "whitelist is empty, no transaction can match");
        } else {
            debug!(jobs = whitelist.len(), "whitelist resolved");
        }

        let mut report = CycleReport::for_range(range);
        let mut failures = Vec::new();
        let chunk = self.fetch_concurrency as u64;
        let mut start = range.from;

        loop {
            let end = start.saturating_add(chunk - 1).min(range.to);
            let blocks = try_join_all((start..=end).map(|height| async move {
                self.chain
                    .block_at(height)
                    .await
                    .map(|block| (height, block))
                    .map_err(|source| ScanError::Block {
                        phase,
                        range,
                        height,
                        source,
                    })
            }))
            .await?;

            for (height, block) in blocks {
                match block {
                    Some(block) => {
                        self.process_block(&block, &whitelist, &mut report, &mut failures)
                            .await;
                    }
                    None => {
                        debug!(height, "block not available, skipping");
                        report.blocks_missing += 1;
                        counter!("monitor_blocks_missing_total").increment(1);
                    }
                }
            }

            if end >= range.to {
                break;
            }
            start = end + 1;
        }

        if !failures.is_empty() {
            return Err(ScanError::Delivery {
                phase,
                range,
                failures,
            });
        }

        info!(
            %phase,
            %range,
            requested = range.block_count(),
            blocks = report.blocks_scanned,
            missing = report.blocks_missing,
            matches = report.matches,
            "scan cycle complete"
        );
        Ok(report)
    }

    async fn process_block(
        &self,
        block: &Block,
        whitelist: &Whitelist,
        report: &mut CycleReport,
        failures: &mut Vec<DeliveryFailure>,
    ) {
        report.blocks_scanned += 1;
        counter!("monitor_blocks_scanned_total").increment(1);

        let matches: Vec<Match<'_>> = block
            .transactions
            .iter()
            .filter_map(|tx| {
                self.detector
                    .detect(tx, whitelist, &self.selector)
                    .job()
                    .cloned()
                    .map(|job| Match { job, tx })
            })
            .collect();
        if matches.is_empty() {
            return;
        }

        report.matches += matches.len() as u64;
        counter!("monitor_matches_total").increment(matches.len() as u64);

        let deliveries = matches.iter().flat_map(|found| {
            self.sinks.iter().map(move |sink| async move {
                let result = sink.notify(&found.job, &found.tx.hash).await;
                (sink, found, result)
            })
        });

        for (sink, found, result) in join_all(deliveries).await {
            match result {
                Ok(()) => {
                    report.notifications += 1;
                    counter!("monitor_notifications_total", "result" => "ok").increment(1);
                }
                Err(error) => {
                    counter!("monitor_notifications_total", "result" => "error").increment(1);
                    warn!(
                        sink = sink.name(),
                        job = %found.job,
                        tx_hash = %found.tx.hash,
                        height = block.number,
                        %error,
                        "notification failed"
                    );
                    failures.push(DeliveryFailure {
                        sink: sink.name().to_string(),
                        job: found.job.clone(),
                        tx_hash: found.tx.hash.clone(),
                        height: block.number,
                        error,
                    });
                }
            }
        }
    }
}
