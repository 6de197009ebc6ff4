// Reward Pipeline Types
//
// Data model shared by the chain reader, validator, ledger and notifier.

use alloy_primitives::{Address, B256, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type BlockNumber = u64;

/// Inclusive block range queried in one scan cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanWindow {
    pub from: BlockNumber,
    pub to: BlockNumber,
}

impl ScanWindow {
    /// Number of blocks covered (both ends inclusive).
    pub fn block_count(&self) -> u64 {
        self.to - self.from + 1
    }

    pub fn contains(&self, block: BlockNumber) -> bool {
        self.from <= block && block <= self.to
    }
}

/// Which on-chain event the distributor is watched for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// ERC20 `Transfer` emitted by the reward token with `from == distributor`
    Transfer,
    /// `RewardDistributed` emitted by the distributor itself
    Distribution,
}

impl FromStr for EventKind {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "transfer" => Ok(EventKind::Transfer),
            "distribution" => Ok(EventKind::Distribution),
            other => Err(eyre::eyre!("unknown event kind '{other}'")),
        }
    }
}

/// Decoded arguments of a reward event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventArgs {
    Transfer {
        from: Address,
        to: Address,
        value: U256,
    },
    Distribution {
        recipient: Address,
        amount: U256,
    },
}

impl EventArgs {
    pub fn recipient(&self) -> Address {
        match self {
            EventArgs::Transfer { to, .. } => *to,
            EventArgs::Distribution { recipient, .. } => *recipient,
        }
    }

    /// Nominal value carried by the event (raw integer, token base units)
    pub fn raw_value(&self) -> U256 {
        match self {
            EventArgs::Transfer { value, .. } => *value,
            EventArgs::Distribution { amount, .. } => *amount,
        }
    }
}

/// One event as returned by the chain reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub tx_hash: B256,
    pub log_index: u64,
    pub contract_address: Address,
    pub args: EventArgs,
    pub block_number: BlockNumber,
    /// Present when the node includes `blockTimestamp` in log responses
    pub block_timestamp: Option<u64>,
}

impl RawEvent {
    pub fn key(&self, mode: KeyMode) -> EventKey {
        match mode {
            KeyMode::TxHash => EventKey::Tx(self.tx_hash),
            KeyMode::TxHashAndLogIndex => EventKey::TxLog(self.tx_hash, self.log_index),
        }
    }
}

/// How event keys are derived for deduplication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyMode {
    /// One qualifying event per transaction
    TxHash,
    /// Contracts that emit several qualifying events per transaction
    #[default]
    TxHashAndLogIndex,
}

impl FromStr for KeyMode {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tx" => Ok(KeyMode::TxHash),
            "tx_log" => Ok(KeyMode::TxHashAndLogIndex),
            other => Err(eyre::eyre!("unknown event key mode '{other}'")),
        }
    }
}

/// Dedup identifier of one logical notification.
///
/// Text form is `0x<hash>` or `0x<hash>:<log_index>`, which is also what the
/// state file stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKey {
    Tx(B256),
    TxLog(B256, u64),
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKey::Tx(hash) => write!(f, "{hash:#x}"),
            EventKey::TxLog(hash, index) => write!(f, "{hash:#x}:{index}"),
        }
    }
}

impl FromStr for EventKey {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((hash, index)) => Ok(EventKey::TxLog(
                hash.parse()
                    .map_err(|e| eyre::eyre!("invalid tx hash in key '{s}': {e}"))?,
                index
                    .parse()
                    .map_err(|e| eyre::eyre!("invalid log index in key '{s}': {e}"))?,
            )),
            None => Ok(EventKey::Tx(
                s.parse()
                    .map_err(|e| eyre::eyre!("invalid tx hash in key '{s}': {e}"))?,
            )),
        }
    }
}

/// Where a reward amount came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmountSource {
    /// Read back from the distributor contract
    Authoritative,
    /// Nominal value carried by the event
    Fallback,
}

/// A reward that passed every filter. `amount` is already divided by
/// `10^decimals`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedReward {
    pub recipient: Address,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub amount_source: AmountSource,
    pub source_tx_hash: B256,
    pub block_number: BlockNumber,
    /// Unix seconds
    pub timestamp: u64,
}

/// Display metadata of the reward token, resolved once at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMeta {
    pub symbol: String,
    pub decimals: u8,
}
