// Reward Notifier
//
// Watches a reward distributor on an EVM chain and announces each payout:
// 1. Polls the chain head and scans [last processed, head] for reward events
// 2. Skips anything already announced, validates amounts against thresholds
// 3. Delivers one message per reward to Telegram or NATS
// 4. Publishes a periodic stats snapshot of the distributor
//
// Architecture:
//   RPC → ChainReader → RewardScanner (cursor, ledger, validator) → Notifier

use eyre::{Result, WrapErr};
use reward_notifier::chain::RpcChainReader;
use reward_notifier::config::{Config, NotifierKind};
use reward_notifier::cursor::CursorTracker;
use reward_notifier::health;
use reward_notifier::notifier::{AnyNotifier, NatsNotifier, Notifier, TelegramNotifier};
use reward_notifier::persist::StateStore;
use reward_notifier::pipeline::{PipelineState, RewardScanner, ScannerConfig};
use reward_notifier::scheduler::{Scheduler, SchedulerConfig};
use reward_notifier::stats::StatsPublisher;
use reward_notifier::token_meta::resolve_token_meta;
use reward_notifier::validator::EventValidator;
use reward_notifier::{ChainReader, DedupLedger};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Default to `info` when RUST_LOG is unset or invalid
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = Config::from_env()?;
    info!(
        distributor = %config.distributor,
        token = %config.reward_token,
        kind = ?config.event_kind,
        notifier = ?config.notifier,
        "starting reward notifier"
    );

    let reader = Arc::new(
        RpcChainReader::connect(
            &config.rpc_url,
            config.distributor,
            config.reward_token,
            config.event_kind,
        )
        .await?,
    );

    let token_meta = resolve_token_meta(reader.as_ref(), config.fallback_token.clone()).await;

    // ========================================================================
    // PIPELINE STATE
    // ========================================================================

    let store = config.state_path.clone().map(StateStore::new);
    let persisted = match &store {
        Some(store) => store.load()?,
        None => None,
    };

    let state = match persisted {
        Some(saved) => {
            info!(
                last_processed = saved.last_processed_block,
                ledger_keys = saved.ledger.len(),
                "resuming from persisted state"
            );
            PipelineState::new(
                CursorTracker::new(saved.last_processed_block, config.lookback_blocks),
                saved.restore_ledger(config.ledger_capacity),
                token_meta.clone(),
            )
        }
        None => {
            let start = match config.start_block {
                Some(block) => block,
                None => reader
                    .block_number()
                    .await
                    .wrap_err("failed to read initial block number")?,
            };
            info!(start_block = start, "starting from fresh cursor");
            PipelineState::new(
                CursorTracker::new(start, config.lookback_blocks),
                DedupLedger::new(config.ledger_capacity),
                token_meta.clone(),
            )
        }
    };
    let state = Arc::new(Mutex::new(state));

    // ========================================================================
    // NOTIFIER
    // ========================================================================

    let notifier = Arc::new(match config.notifier {
        NotifierKind::Telegram => {
            if !config.telegram.is_configured() {
                warn!("Telegram credentials missing, notifications will only be logged");
            }
            AnyNotifier::Telegram(TelegramNotifier::new(config.telegram.clone())?)
        }
        NotifierKind::Nats => AnyNotifier::Nats(
            NatsNotifier::connect(&config.nats_url, config.nats_subject.clone()).await?,
        ),
    });

    let scanner = Arc::new(
        RewardScanner::new(
            reader.clone(),
            notifier.clone(),
            EventValidator::new(config.validator.clone()),
            ScannerConfig {
                key_mode: config.key_mode,
                notify_delay: config.notify_delay,
                media: config.reward_media.clone(),
            },
        )
        .with_store(store),
    );

    // ========================================================================
    // TASKS
    // ========================================================================

    let listener = health::bind(config.health_addr).await?;
    let (health_stop_tx, health_stop_rx) = oneshot::channel::<()>();
    let health_handle = tokio::spawn(health::serve(listener, async move {
        let _ = health_stop_rx.await;
    }));

    let scheduler = Scheduler::spawn(
        SchedulerConfig {
            scan_interval: config.scan_interval,
            stats_interval: config.stats_interval,
        },
        scanner,
        state.clone(),
        StatsPublisher::new(config.stats_media.clone()),
        reader,
        notifier.clone(),
        token_meta,
    );

    wait_for_shutdown_signal().await;
    info!("shutdown signal received");

    scheduler.shutdown().await;

    let _ = health_stop_tx.send(());
    match health_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "health endpoint stopped with error"),
        Err(e) => warn!(error = %e, "health task panicked"),
    }

    if let Err(e) = notifier.close().await {
        error!(error = %e, "failed to close notifier");
    }

    let last_processed = state.lock().await.cursor.last_processed();
    info!(last_processed, "reward notifier stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler, waiting for ctrl-c only");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
