// Scheduler
//
// Two independent periodic tasks: reward scanning and stats publication.
// `interval` fires its first tick immediately, which gives the startup run.
// The scan task holds the pipeline lock for a whole cycle, so a slow RPC
// delays the next tick instead of overlapping it.

use crate::chain::ChainReader;
use crate::notifier::Notifier;
use crate::pipeline::{PipelineState, RewardScanner};
use crate::stats::StatsPublisher;
use crate::types::TokenMeta;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// How long `shutdown` waits for an in-flight cycle before aborting it
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub scan_interval: Duration,
    pub stats_interval: Duration,
}

pub struct Scheduler {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Spawn both tasks on the current runtime.
    pub fn spawn<R, N>(
        config: SchedulerConfig,
        scanner: Arc<RewardScanner<R, N>>,
        state: Arc<Mutex<PipelineState>>,
        stats: StatsPublisher,
        reader: Arc<R>,
        notifier: Arc<N>,
        token_meta: TokenMeta,
    ) -> Self
    where
        R: ChainReader + ?Sized + 'static,
        N: Notifier + ?Sized + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let scan_handle =
            spawn_scan_task(config.scan_interval, scanner, state, shutdown_rx.clone());
        let stats_handle = spawn_stats_task(
            config.stats_interval,
            stats,
            reader,
            notifier,
            token_meta,
            shutdown_rx,
        );

        info!(
            scan_interval_secs = config.scan_interval.as_secs(),
            stats_interval_secs = config.stats_interval.as_secs(),
            "scheduler started"
        );

        Self {
            shutdown_tx,
            handles: vec![scan_handle, stats_handle],
        }
    }

    /// Stop both tasks. A cycle still running after the grace period is
    /// aborted; nothing it did after its last commit is kept.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);

        for mut handle in self.handles {
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "scheduler task ended abnormally"),
                Err(_) => {
                    warn!("scheduler task still busy after grace period, aborting");
                    handle.abort();
                }
            }
        }
        info!("scheduler stopped");
    }
}

fn spawn_scan_task<R, N>(
    period: Duration,
    scanner: Arc<RewardScanner<R, N>>,
    state: Arc<Mutex<PipelineState>>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    R: ChainReader + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    tokio::spawn(async move {
        let mut tick = interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tick.tick() => {
                    let mut state = state.lock().await;
                    match scanner.scan_once(&mut state).await {
                        Ok(report) => debug!(?report, "reward scan cycle finished"),
                        Err(e) => warn!(
                            error = %e,
                            last_processed = state.cursor.last_processed(),
                            "reward scan failed, window retried next interval"
                        ),
                    }
                }
            }
        }
        debug!("reward scan task exiting");
    })
}

fn spawn_stats_task<R, N>(
    period: Duration,
    stats: StatsPublisher,
    reader: Arc<R>,
    notifier: Arc<N>,
    token_meta: TokenMeta,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    R: ChainReader + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    tokio::spawn(async move {
        let mut tick = interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tick.tick() => {
                    let result = stats
                        .publish_once(reader.as_ref(), notifier.as_ref(), &token_meta)
                        .await;
                    if let Err(e) = result {
                        warn!(error = %e, "stats cycle failed");
                    }
                }
            }
        }
        debug!("stats task exiting");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::CursorTracker;
    use crate::ledger::DedupLedger;
    use crate::pipeline::ScannerConfig;
    use crate::test_utils::{reward_event, MockChain, RecordingNotifier};
    use crate::types::KeyMode;
    use crate::validator::{EventValidator, ValidatorConfig};
    use alloy_primitives::{address, U256};
    use rust_decimal_macros::dec;

    fn meta() -> TokenMeta {
        TokenMeta {
            symbol: "USDC".to_string(),
            decimals: 6,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn both_tasks_run_immediately_then_on_interval() {
        let holder = address!("00000000000000000000000000000000000000aa");
        let chain = Arc::new(
            MockChain::new()
                .with_head(105)
                .with_events([reward_event(1, 0, 103, holder, U256::from(500_000u64))])
                .with_stats(Some(U256::from(1_000_000u64)), None, None),
        );
        let notifier = Arc::new(RecordingNotifier::new());
        let scanner = Arc::new(RewardScanner::new(
            chain.clone(),
            notifier.clone(),
            EventValidator::new(ValidatorConfig {
                min_amount: dec!(0.000001),
                max_amount: dec!(1000),
                readback: false,
            }),
            ScannerConfig {
                key_mode: KeyMode::TxHashAndLogIndex,
                notify_delay: Duration::ZERO,
                media: None,
            },
        ));
        let state = Arc::new(Mutex::new(PipelineState::new(
            CursorTracker::new(100, 500),
            DedupLedger::new(1000),
            meta(),
        )));

        let scheduler = Scheduler::spawn(
            SchedulerConfig {
                scan_interval: Duration::from_secs(60),
                stats_interval: Duration::from_secs(3600),
            },
            scanner,
            state.clone(),
            StatsPublisher::default(),
            chain.clone(),
            notifier.clone(),
            meta(),
        );

        // Startup run: one reward + one stats message
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(notifier.sent().len(), 2);
        assert_eq!(state.lock().await.cursor.last_processed(), 105);

        // Next scan tick rescans nothing new
        chain.set_head(110);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(state.lock().await.cursor.last_processed(), 110);
        assert_eq!(notifier.sent().len(), 2);
        assert_eq!(chain.queried_windows().len(), 2);

        scheduler.shutdown().await;
    }
}
