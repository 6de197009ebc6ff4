// In-memory collaborators for unit and integration tests.
//
// MockChain scripts head heights, events and view results; RecordingNotifier
// captures every delivered notification and can be switched into failure.

use crate::chain::ChainReader;
use crate::notifier::{Notification, Notifier};
use crate::types::{BlockNumber, EventArgs, RawEvent, ScanWindow, TokenMeta};
use alloy_primitives::{address, Address, B256, U256};
use async_trait::async_trait;
use eyre::{eyre, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Distributor address used by `reward_event`
pub const TEST_DISTRIBUTOR: Address = address!("1111111111111111111111111111111111111111");

/// Build a Distribution event with a tx hash derived from `tx`.
pub fn reward_event(
    tx: u8,
    log_index: u64,
    block_number: BlockNumber,
    recipient: Address,
    value: U256,
) -> RawEvent {
    RawEvent {
        tx_hash: B256::with_last_byte(tx),
        log_index,
        contract_address: TEST_DISTRIBUTOR,
        args: EventArgs::Distribution {
            recipient,
            amount: value,
        },
        block_number,
        block_timestamp: None,
    }
}

#[derive(Default)]
struct MockState {
    head: BlockNumber,
    /// Consumed one per `block_number` call before falling back to `head`
    scripted_heads: VecDeque<BlockNumber>,
    fail_head: bool,
    events: Vec<RawEvent>,
    failing_queries: u32,
    queried: Vec<ScanWindow>,
    distributions: HashMap<Address, U256>,
    token: Option<TokenMeta>,
    total_distributed: Option<U256>,
    pool_balance: Option<U256>,
    holder_count: Option<U256>,
}

#[derive(Default)]
pub struct MockChain {
    state: Mutex<MockState>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_head(self, head: BlockNumber) -> Self {
        self.set_head(head);
        self
    }

    pub fn with_events(self, events: impl IntoIterator<Item = RawEvent>) -> Self {
        for event in events {
            self.push_event(event);
        }
        self
    }

    pub fn with_distribution(self, recipient: Address, amount: U256) -> Self {
        self.lock().distributions.insert(recipient, amount);
        self
    }

    pub fn with_token(self, symbol: &str, decimals: u8) -> Self {
        self.lock().token = Some(TokenMeta {
            symbol: symbol.to_string(),
            decimals,
        });
        self
    }

    /// `None` makes the corresponding view call fail
    pub fn with_stats(
        self,
        total_distributed: Option<U256>,
        pool_balance: Option<U256>,
        holder_count: Option<U256>,
    ) -> Self {
        {
            let mut state = self.lock();
            state.total_distributed = total_distributed;
            state.pool_balance = pool_balance;
            state.holder_count = holder_count;
        }
        self
    }

    pub fn set_head(&self, head: BlockNumber) {
        self.lock().head = head;
    }

    pub fn script_heads(&self, heads: impl IntoIterator<Item = BlockNumber>) {
        self.lock().scripted_heads.extend(heads);
    }

    pub fn set_head_failing(&self, failing: bool) {
        self.lock().fail_head = failing;
    }

    pub fn push_event(&self, event: RawEvent) {
        self.lock().events.push(event);
    }

    /// The next `n` `query_events` calls fail
    pub fn fail_next_queries(&self, n: u32) {
        self.lock().failing_queries = n;
    }

    /// Windows requested so far, in call order
    pub fn queried_windows(&self) -> Vec<ScanWindow> {
        self.lock().queried.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn block_number(&self) -> Result<BlockNumber> {
        let mut state = self.lock();
        if state.fail_head {
            return Err(eyre!("mock: head unavailable"));
        }
        if let Some(head) = state.scripted_heads.pop_front() {
            state.head = head;
        }
        Ok(state.head)
    }

    async fn query_events(&self, window: ScanWindow) -> Result<Vec<RawEvent>> {
        let mut state = self.lock();
        state.queried.push(window);
        if state.failing_queries > 0 {
            state.failing_queries -= 1;
            return Err(eyre!("mock: eth_getLogs failed"));
        }
        let mut events: Vec<RawEvent> = state
            .events
            .iter()
            .filter(|e| window.contains(e.block_number))
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.block_number, e.log_index));
        Ok(events)
    }

    async fn distribution_amount(&self, recipient: Address) -> Result<U256> {
        self.lock()
            .distributions
            .get(&recipient)
            .copied()
            .ok_or_else(|| eyre!("mock: getDistributionAmount reverted"))
    }

    async fn token_decimals(&self) -> Result<u8> {
        self.lock()
            .token
            .as_ref()
            .map(|t| t.decimals)
            .ok_or_else(|| eyre!("mock: decimals reverted"))
    }

    async fn token_symbol(&self) -> Result<String> {
        self.lock()
            .token
            .as_ref()
            .map(|t| t.symbol.clone())
            .ok_or_else(|| eyre!("mock: symbol reverted"))
    }

    async fn total_distributed(&self) -> Result<U256> {
        self.lock()
            .total_distributed
            .ok_or_else(|| eyre!("mock: totalDistributed reverted"))
    }

    async fn pool_balance(&self) -> Result<U256> {
        self.lock()
            .pool_balance
            .ok_or_else(|| eyre!("mock: balanceOf reverted"))
    }

    async fn holder_count(&self) -> Result<U256> {
        self.lock()
            .holder_count
            .ok_or_else(|| eyre!("mock: holderCount reverted"))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    /// Deliveries that succeed before the notifier starts failing
    fail_after: Mutex<Option<usize>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Succeed `n` more times, then fail every send
    pub fn fail_after(&self, n: usize) {
        let delivered = self.sent().len();
        *self.fail_after.lock().unwrap_or_else(|e| e.into_inner()) = Some(delivered + n);
    }

    pub fn recover(&self) {
        *self.fail_after.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        let limit = *self.fail_after.lock().unwrap_or_else(|e| e.into_inner());
        let mut sent = self.sent.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(limit) = limit {
            if sent.len() >= limit {
                return Err(eyre!("mock: delivery failed"));
            }
        }
        sent.push(notification.clone());
        Ok(())
    }
}
