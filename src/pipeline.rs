//! Reward scan cycle.
//!
//! ```text
//!   head ──► CursorTracker.advance ──► ChainReader.query_events
//!                                             │
//!          ┌──────────────────────────────────┘
//!          ▼
//!   DedupLedger.seen? ──► EventValidator ──► Notifier.send ──► DedupLedger.record
//!                                                                     │
//!   CursorTracker.commit ◄──────────── (all events handled) ◄─────────┘
//! ```
//!
//! Delivery is at-least-once. A key is recorded only after its notification
//! went out, and the cursor is committed only after the whole window was
//! handled. A crash between send and record re-sends that one event.

use crate::chain::ChainReader;
use crate::cursor::CursorTracker;
use crate::ledger::DedupLedger;
use crate::notifier::{reward_text, Notification, Notifier};
use crate::persist::{PersistedState, StateStore};
use crate::types::{KeyMode, ScanWindow, TokenMeta};
use crate::validator::{EventValidator, Validation};
use eyre::{Result, WrapErr};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Everything a scan mutates, owned in one place.
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub cursor: CursorTracker,
    pub ledger: DedupLedger,
    pub token_meta: TokenMeta,
}

impl PipelineState {
    pub fn new(cursor: CursorTracker, ledger: DedupLedger, token_meta: TokenMeta) -> Self {
        Self {
            cursor,
            ledger,
            token_meta,
        }
    }

    pub fn snapshot(&self) -> PersistedState {
        PersistedState::capture(self.cursor.last_processed(), &self.ledger)
    }
}

/// Outcome of one `scan_once`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// `None` when the head had not moved
    pub window: Option<ScanWindow>,
    pub fetched: usize,
    pub duplicates: usize,
    pub rejected: usize,
    pub notified: usize,
}

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub key_mode: KeyMode,
    /// Pause after each delivered notification (downstream rate limits)
    pub notify_delay: Duration,
    pub media: Option<String>,
}

pub struct RewardScanner<R: ?Sized, N: ?Sized> {
    reader: Arc<R>,
    notifier: Arc<N>,
    validator: EventValidator,
    config: ScannerConfig,
    store: Option<StateStore>,
}

impl<R, N> RewardScanner<R, N>
where
    R: ChainReader + ?Sized,
    N: Notifier + ?Sized,
{
    pub fn new(
        reader: Arc<R>,
        notifier: Arc<N>,
        validator: EventValidator,
        config: ScannerConfig,
    ) -> Self {
        Self {
            reader,
            notifier,
            validator,
            config,
            store: None,
        }
    }

    pub fn with_store(mut self, store: Option<StateStore>) -> Self {
        self.store = store;
        self
    }

    /// Run one cycle against `state`.
    ///
    /// Errors (RPC failure, undeliverable notification) abort the cycle with
    /// the cursor untouched, so the same window is retried next tick. Keys
    /// delivered before the failure stay recorded and are not re-sent.
    pub async fn scan_once(&self, state: &mut PipelineState) -> Result<ScanReport> {
        let head = self.reader.block_number().await?;
        let Some(window) = state.cursor.advance(head) else {
            return Ok(ScanReport::default());
        };

        let events = self.reader.query_events(window).await?;
        let mut report = ScanReport {
            window: Some(window),
            fetched: events.len(),
            ..Default::default()
        };

        debug!(
            from_block = window.from,
            to_block = window.to,
            blocks = window.block_count(),
            events = events.len(),
            "scanning reward window"
        );

        for event in &events {
            let key = event.key(self.config.key_mode);
            if state.ledger.seen(&key) {
                report.duplicates += 1;
                continue;
            }

            let reward = match self
                .validator
                .validate(self.reader.as_ref(), event, &state.token_meta)
                .await
            {
                Validation::Accepted(reward) => reward,
                Validation::Rejected(reason) => {
                    info!(
                        tx = %event.tx_hash,
                        log_index = event.log_index,
                        %reason,
                        "reward rejected"
                    );
                    report.rejected += 1;
                    continue;
                }
            };

            let notification = Notification::text(reward_text(&reward, &state.token_meta))
                .with_media(self.config.media.clone());
            self.notifier
                .send(&notification)
                .await
                .wrap_err_with(|| format!("failed to deliver reward notification for {key}"))?;

            state.ledger.record(key);
            report.notified += 1;
            info!(
                tx = %reward.source_tx_hash,
                recipient = %reward.recipient,
                amount = %reward.amount,
                source = ?reward.amount_source,
                "reward notified"
            );

            if !self.config.notify_delay.is_zero() {
                tokio::time::sleep(self.config.notify_delay).await;
            }
        }

        state.cursor.commit(window.to);

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&state.snapshot()) {
                warn!(
                    error = %e,
                    path = %store.path().display(),
                    "failed to persist pipeline state"
                );
            }
        }

        if report.notified > 0 || report.rejected > 0 {
            info!(
                from_block = window.from,
                to_block = window.to,
                fetched = report.fetched,
                duplicates = report.duplicates,
                rejected = report.rejected,
                notified = report.notified,
                "reward scan complete"
            );
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{reward_event, MockChain, RecordingNotifier};
    use crate::validator::ValidatorConfig;
    use alloy_primitives::{address, Address, U256};
    use rust_decimal_macros::dec;

    const HOLDER: Address = address!("00000000000000000000000000000000000000aa");

    fn scanner(
        chain: &Arc<MockChain>,
        notifier: &Arc<RecordingNotifier>,
    ) -> RewardScanner<MockChain, RecordingNotifier> {
        RewardScanner::new(
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
        )
    }

    fn state(last_processed: u64) -> PipelineState {
        PipelineState::new(
            CursorTracker::new(last_processed, 500),
            DedupLedger::new(1000),
            TokenMeta {
                symbol: "USDC".to_string(),
                decimals: 6,
            },
        )
    }

    #[tokio::test]
    async fn idle_when_head_has_not_moved() {
        let chain = Arc::new(MockChain::new().with_head(100));
        let notifier = Arc::new(RecordingNotifier::new());
        let mut st = state(100);

        let report = scanner(&chain, &notifier).scan_once(&mut st).await.unwrap();
        assert_eq!(report, ScanReport::default());
        assert!(chain.queried_windows().is_empty());
    }

    #[tokio::test]
    async fn notifies_and_commits() {
        let chain = Arc::new(
            MockChain::new()
                .with_head(105)
                .with_events([reward_event(1, 0, 103, HOLDER, U256::from(500_000u64))]),
        );
        let notifier = Arc::new(RecordingNotifier::new());
        let mut st = state(100);

        let report = scanner(&chain, &notifier).scan_once(&mut st).await.unwrap();
        assert_eq!(report.window, Some(ScanWindow { from: 100, to: 105 }));
        assert_eq!(report.notified, 1);
        assert_eq!(st.cursor.last_processed(), 105);
        assert!(notifier.sent()[0].text.contains("0.50 USDC"));
    }

    #[tokio::test]
    async fn rejected_events_do_not_block_commit() {
        let chain = Arc::new(MockChain::new().with_head(105).with_events([
            reward_event(1, 0, 101, HOLDER, U256::ZERO),
            reward_event(2, 0, 102, HOLDER, U256::from(2_000_000_000u64)),
        ]));
        let notifier = Arc::new(RecordingNotifier::new());
        let mut st = state(100);

        let report = scanner(&chain, &notifier).scan_once(&mut st).await.unwrap();
        assert_eq!(report.rejected, 2);
        assert_eq!(report.notified, 0);
        assert_eq!(st.cursor.last_processed(), 105);
        assert!(st.ledger.is_empty());
    }

    #[tokio::test]
    async fn delivery_failure_aborts_cycle_but_keeps_delivered_keys() {
        let chain = Arc::new(MockChain::new().with_head(105).with_events([
            reward_event(1, 0, 101, HOLDER, U256::from(1_000_000u64)),
            reward_event(2, 0, 102, HOLDER, U256::from(2_000_000u64)),
        ]));
        let notifier = Arc::new(RecordingNotifier::new());
        notifier.fail_after(1);
        let mut st = state(100);
        let scanner = scanner(&chain, &notifier);

        assert!(scanner.scan_once(&mut st).await.is_err());
        assert_eq!(st.cursor.last_processed(), 100);
        assert_eq!(st.ledger.len(), 1);

        notifier.recover();
        let report = scanner.scan_once(&mut st).await.unwrap();
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.notified, 1);
        assert_eq!(notifier.sent().len(), 2);
        assert_eq!(st.cursor.last_processed(), 105);
    }

    #[tokio::test]
    async fn persists_state_after_commit() {
        let path = std::env::temp_dir().join(format!(
            "reward_pipeline_{}.json",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        let chain = Arc::new(
            MockChain::new()
                .with_head(105)
                .with_events([reward_event(1, 4, 103, HOLDER, U256::from(500_000u64))]),
        );
        let notifier = Arc::new(RecordingNotifier::new());
        let mut st = state(100);
        let store = StateStore::new(&path);

        scanner(&chain, &notifier)
            .with_store(Some(store.clone()))
            .scan_once(&mut st)
            .await
            .unwrap();

        let saved = store.load().unwrap().unwrap();
        assert_eq!(saved.last_processed_block, 105);
        assert_eq!(saved.ledger.len(), 1);
        assert!(saved.ledger[0].ends_with(":4"));
    }
}
