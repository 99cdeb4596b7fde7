use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use job_watch_domain::{
    config::{BootstrapConfig, ConfigError},
    ports::{ChainReader, NotificationSink, WhitelistSource},
    services::telemetry::TelemetryError,
};
use thiserror::Error;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::{
    client::JsonRpcClient,
    engine::{CyclePhase, ScanEngine, ScanError},
    notifiers::{ConsoleNotifier, DiscordNotifier, SlackNotifier},
    rpc::{RpcChainReader, SequencerWhitelist},
};

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("rpc error: {0}")]
    Rpc(String),
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),
    #[error("{phase} cycle timed out after {}s", .timeout.as_secs())]
    Timeout {
        phase: CyclePhase,
        timeout: Duration,
    },
}

impl From<reqwest::Error> for MonitorError {
    fn from(value: reqwest::Error) -> Self {
        Self::Rpc(value.to_string())
    }
}

/// Engine wired to a JSON-RPC node and the on-chain Sequencer registry.
pub type RpcScanEngine = ScanEngine<RpcChainReader, SequencerWhitelist>;

/// Timing knobs for [`run_until`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub lookback_blocks: u64,
    pub poll_interval: Duration,
    pub cycle_timeout: Duration,
}

impl Schedule {
    pub fn from_config(config: &BootstrapConfig) -> Self {
        Self {
            lookback_blocks: config.lookback_blocks(),
            poll_interval: config.poll_interval(),
            cycle_timeout: config.cycle_timeout(),
        }
    }
}

/// Builds the notification sinks in delivery order: Discord, Slack, console.
pub fn build_sinks(
    config: &BootstrapConfig,
    http: reqwest::Client,
) -> Vec<Arc<dyn NotificationSink>> {
    let mut sinks: Vec<Arc<dyn NotificationSink>> = Vec::new();
    if let Some(url) = config.discord_webhook_url() {
        sinks.push(Arc::new(DiscordNotifier::new(http.clone(), url)));
    }
    if let Some(url) = config.slack_webhook_url() {
        sinks.push(Arc::new(SlackNotifier::new(http, url)));
    }
    sinks.push(Arc::new(ConsoleNotifier));
    sinks
}

pub fn build_rpc_engine(config: &BootstrapConfig) -> Result<RpcScanEngine, MonitorError> {
    let client = Arc::new(JsonRpcClient::new(config.rpc_url(), config.rpc_timeout())?);
    let http = reqwest::Client::builder()
        .timeout(config.rpc_timeout())
        .build()?;

    let chain = RpcChainReader::new(Arc::clone(&client));
    let whitelist = SequencerWhitelist::new(client, config.sequencer_address().clone());
    let sinks = build_sinks(config, http);

    Ok(ScanEngine::new(chain, whitelist, config.work_selector(), sinks)
        .with_fetch_concurrency(config.fetch_concurrency()))
}

/// Bootstraps the engine and then ticks it on the configured interval until
/// Ctrl-C.
pub async fn run_monitor<C, W>(
    config: &BootstrapConfig,
    mut engine: ScanEngine<C, W>,
) -> Result<(), MonitorError>
where
    C: ChainReader,
    W: WhitelistSource,
{
    info!(
        rpc = config.rpc_url(),
        sequencer = %config.sequencer_address(),
        selector = %config.work_selector(),
        signature = config.work_signature(),
        "monitor starting"
    );
    run_until(&mut engine, Schedule::from_config(config), shutdown_signal()).await
}

/// Runs one bootstrap, then one tick per interval until `shutdown`
/// resolves. Bootstrap failures are fatal; tick failures are logged and the
/// unprocessed range is retried on the next interval.
pub async fn run_until<C, W, F>(
    engine: &mut ScanEngine<C, W>,
    schedule: Schedule,
    shutdown: F,
) -> Result<(), MonitorError>
where
    C: ChainReader,
    W: WhitelistSource,
    F: Future<Output = ()>,
{
    info!(lookback = schedule.lookback_blocks, "scanning historical blocks");
    let report = timeout(schedule.cycle_timeout, engine.bootstrap(schedule.lookback_blocks))
        .await
        .map_err(|_| MonitorError::Timeout {
            phase: CyclePhase::Bootstrap,
            timeout: schedule.cycle_timeout,
        })??;
    info!(
        cursor = engine.cursor(),
        matches = report.matches,
        "historical scan complete, following new blocks"
    );

    let start = Instant::now() + schedule.poll_interval;
    let mut ticker = interval_at(start, schedule.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!(cursor = engine.cursor(), "shutdown requested, stopping monitor");
                return Ok(());
            }
            _ = ticker.tick() => {
                match timeout(schedule.cycle_timeout, engine.tick()).await {
                    Ok(Ok(report)) => {
                        if report.range.is_some() {
                            info!(
                                cursor = engine.cursor(),
                                matches = report.matches,
                                notifications = report.notifications,
                                "tick complete"
                            );
                        }
                    }
                    Ok(Err(err)) => {
                        warn!(
                            error = %err,
                            cursor = engine.cursor(),
                            "scan cycle failed, retrying next interval"
                        );
                    }
                    Err(_) => {
                        let err = MonitorError::Timeout {
                            phase: CyclePhase::Tick,
                            timeout: schedule.cycle_timeout,
                        };
                        warn!(
                            error = %err,
                            cursor = engine.cursor(),
                            "scan cycle abandoned, retrying next interval"
                        );
                    }
                }
            }
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(?err, "failed to listen for ctrl-c, running until killed");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use job_watch_domain::ports::{ConnectivityError, SourceResult};
    use job_watch_domain::{Address, Block, Selector};
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::Mutex;

    static ENV_GUARD: Mutex<()> = Mutex::new(());

    const WORK: Selector = Selector::new([0x1d, 0x2a, 0xb0, 0x00]);

    /// Head grows by one per read; the read numbered `fail_on_call` fails.
    #[derive(Clone, Default)]
    struct GrowingChain {
        head: Arc<AtomicU64>,
        calls: Arc<AtomicUsize>,
        fail_on_call: Option<usize>,
    }

    #[async_trait]
    impl ChainReader for GrowingChain {
        async fn current_height(&self) -> SourceResult<u64> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if Some(call) == self.fail_on_call {
                return Err(ConnectivityError::transport("eth_blockNumber", "refused"));
            }
            Ok(self.head.fetch_add(1, Ordering::SeqCst))
        }

        async fn block_at(&self, height: u64) -> SourceResult<Option<Block>> {
            Ok(Some(Block::new(height, Vec::new())))
        }
    }

    struct NoJobs;

    #[async_trait]
    impl WhitelistSource for NoJobs {
        async fn addresses(&self) -> SourceResult<Vec<Address>> {
            Ok(Vec::new())
        }
    }

    fn schedule() -> Schedule {
        Schedule {
            lookback_blocks: 2,
            poll_interval: Duration::from_secs(10),
            cycle_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn bootstrap_failure_is_fatal() {
        let chain = GrowingChain {
            fail_on_call: Some(1),
            ..GrowingChain::default()
        };
        let mut engine = ScanEngine::new(chain, NoJobs, WORK, Vec::new());

        let err = run_until(&mut engine, schedule(), std::future::pending())
            .await
            .unwrap_err();

        assert!(matches!(err, MonitorError::Scan(ScanError::Head { .. })));
        assert_eq!(engine.cursor(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn tick_failures_are_retried_until_shutdown() {
        let chain = GrowingChain {
            head: Arc::new(AtomicU64::new(10)),
            fail_on_call: Some(2),
            ..GrowingChain::default()
        };
        let calls = Arc::clone(&chain.calls);
        let mut engine = ScanEngine::new(chain, NoJobs, WORK, Vec::new());

        run_until(
            &mut engine,
            schedule(),
            tokio::time::sleep(Duration::from_secs(35)),
        )
        .await
        .expect("clean shutdown");

        // bootstrap + ticks at 10s, 20s and 30s; the first tick failed.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(engine.cursor(), Some(12));
    }

    #[test]
    fn sinks_follow_configured_order() {
        let _guard = ENV_GUARD.lock().unwrap();
        std::env::set_var("JOB_WATCH_SKIP_DOTENV", "1");
        std::env::set_var("RPC_URL", "http://localhost:8545");
        std::env::set_var("DISCORD_WEBHOOK_URL", "https://discord.example/hook");
        std::env::set_var("SLACK_WEBHOOK_URL", "https://slack.example/hook");

        let config = BootstrapConfig::load_from_env().expect("config loads");
        let names: Vec<String> = build_sinks(&config, reqwest::Client::new())
            .iter()
            .map(|sink| sink.name().to_string())
            .collect();
        assert_eq!(names, vec!["discord", "slack", "console"]);

        std::env::remove_var("DISCORD_WEBHOOK_URL");
        std::env::remove_var("SLACK_WEBHOOK_URL");
        let config = BootstrapConfig::load_from_env().expect("config loads");
        assert_eq!(build_sinks(&config, reqwest::Client::new()).len(), 1);
    }
}
