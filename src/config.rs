//! Environment configuration.
//!
//! Read once at startup; nothing is hot-reloaded. Required values fail
//! startup with an eyre report, everything else has a default.

use crate::ledger::DEFAULT_CAPACITY;
use crate::notifier::TelegramConfig;
use crate::types::{EventKind, KeyMode, TokenMeta};
use crate::validator::ValidatorConfig;
use alloy_primitives::Address;
use eyre::{eyre, Result};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierKind {
    Telegram,
    Nats,
}

impl FromStr for NotifierKind {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "telegram" => Ok(NotifierKind::Telegram),
            "nats" => Ok(NotifierKind::Nats),
            other => Err(eyre!("unknown notifier '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub rpc_url: String,
    pub distributor: Address,
    pub reward_token: Address,
    pub event_kind: EventKind,
    pub key_mode: KeyMode,

    pub scan_interval: Duration,
    pub stats_interval: Duration,
    pub lookback_blocks: u64,
    pub notify_delay: Duration,

    pub validator: ValidatorConfig,
    pub ledger_capacity: usize,
    pub fallback_token: TokenMeta,
    pub start_block: Option<u64>,
    pub state_path: Option<PathBuf>,

    pub notifier: NotifierKind,
    pub telegram: TelegramConfig,
    pub reward_media: Option<String>,
    pub stats_media: Option<String>,
    pub nats_url: String,
    pub nats_subject: String,

    pub health_addr: SocketAddr,
}

impl Config {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_vars(std::env::vars().collect())
    }

    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        let env = Env(vars);

        let min_amount: Decimal = env.parse_or("MIN_REWARD_AMOUNT", Decimal::new(1, 6))?;
        let max_amount: Decimal = env.parse_or("MAX_REWARD_AMOUNT", Decimal::from(1000))?;
        if min_amount > max_amount {
            return Err(eyre!(
                "MIN_REWARD_AMOUNT ({min_amount}) exceeds MAX_REWARD_AMOUNT ({max_amount})"
            ));
        }

        let scan_secs: u64 = env.parse_or("SCAN_INTERVAL_SECS", 300)?;
        let stats_secs: u64 = env.parse_or("STATS_INTERVAL_SECS", 3600)?;
        if scan_secs == 0 || stats_secs == 0 {
            return Err(eyre!("SCAN_INTERVAL_SECS and STATS_INTERVAL_SECS must be positive"));
        }

        let lookback_blocks: u64 = env.parse_or("LOOKBACK_BLOCKS", 500)?;
        if lookback_blocks == 0 {
            return Err(eyre!("LOOKBACK_BLOCKS must be positive"));
        }

        let health_port: u16 = env.parse_or("HEALTH_PORT", 8080)?;

        Ok(Self {
            rpc_url: env.required("RPC_URL")?,
            distributor: env.parse_required("DISTRIBUTOR_ADDRESS")?,
            reward_token: env.parse_required("REWARD_TOKEN_ADDRESS")?,
            event_kind: env.parse_or("EVENT_KIND", EventKind::Transfer)?,
            key_mode: env.parse_or("EVENT_KEY_MODE", KeyMode::TxHashAndLogIndex)?,

            scan_interval: Duration::from_secs(scan_secs),
            stats_interval: Duration::from_secs(stats_secs),
            lookback_blocks,
            notify_delay: Duration::from_millis(env.parse_or("NOTIFY_DELAY_MS", 1000)?),

            validator: ValidatorConfig {
                min_amount,
                max_amount,
                readback: env.parse_or("AMOUNT_READBACK", true)?,
            },
            ledger_capacity: env.parse_or("LEDGER_CAPACITY", DEFAULT_CAPACITY)?,
            fallback_token: TokenMeta {
                symbol: env.get("FALLBACK_TOKEN_SYMBOL").unwrap_or("TOKEN").to_string(),
                decimals: env.parse_or("FALLBACK_TOKEN_DECIMALS", 18)?,
            },
            start_block: env.parse_optional("START_BLOCK")?,
            state_path: env.get("STATE_PATH").map(PathBuf::from),

            notifier: env.parse_or("NOTIFIER", NotifierKind::Telegram)?,
            telegram: TelegramConfig {
                bot_token: env.get("TELEGRAM_BOT_TOKEN").unwrap_or_default().to_string(),
                chat_id: env.get("TELEGRAM_CHAT_ID").unwrap_or_default().to_string(),
            },
            reward_media: env.get("REWARD_MEDIA_URL").map(str::to_string),
            stats_media: env.get("STATS_MEDIA_URL").map(str::to_string),
            nats_url: env
                .get("NATS_URL")
                .unwrap_or("nats://localhost:4222")
                .to_string(),
            nats_subject: env
                .get("NATS_SUBJECT")
                .unwrap_or("rewards.notifications")
                .to_string(),

            health_addr: SocketAddr::from(([0, 0, 0, 0], health_port)),
        })
    }
}

/// Lookup helper; empty values count as unset
struct Env(HashMap<String, String>);

impl Env {
    fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.get(key)
            .map(str::to_string)
            .ok_or_else(|| eyre!("{key} env var required"))
    }

    fn parse_required<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.required(key)?;
        raw.parse()
            .map_err(|e| eyre!("invalid {key} '{raw}': {e}"))
    }

    fn parse_optional<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(key)
            .map(|raw| raw.parse().map_err(|e| eyre!("invalid {key} '{raw}': {e}")))
            .transpose()
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        Ok(self.parse_optional(key)?.unwrap_or(default))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn base() -> HashMap<String, String> {
        [
            ("RPC_URL", "http://localhost:8545"),
            ("DISTRIBUTOR_ADDRESS", "0x1111111111111111111111111111111111111111"),
            ("REWARD_TOKEN_ADDRESS", "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn defaults() {
        let config = Config::from_vars(base()).unwrap();
        assert_eq!(config.event_kind, EventKind::Transfer);
        assert_eq!(config.key_mode, KeyMode::TxHashAndLogIndex);
        assert_eq!(config.scan_interval, Duration::from_secs(300));
        assert_eq!(config.lookback_blocks, 500);
        assert_eq!(config.validator.min_amount, dec!(0.000001));
        assert_eq!(config.validator.max_amount, dec!(1000));
        assert!(config.validator.readback);
        assert_eq!(config.ledger_capacity, 1000);
        assert_eq!(config.notify_delay, Duration::from_secs(1));
        assert_eq!(config.notifier, NotifierKind::Telegram);
        assert!(!config.telegram.is_configured());
        assert_eq!(config.state_path, None);
        assert_eq!(config.health_addr.port(), 8080);
    }

    #[test]
    fn overrides() {
        let mut vars = base();
        for (k, v) in [
            ("EVENT_KIND", "distribution"),
            ("EVENT_KEY_MODE", "tx"),
            ("LOOKBACK_BLOCKS", "100"),
            ("MIN_REWARD_AMOUNT", "0.0001"),
            ("MAX_REWARD_AMOUNT", "1000000"),
            ("AMOUNT_READBACK", "false"),
            ("START_BLOCK", "42"),
            ("NOTIFIER", "nats"),
            ("STATE_PATH", "/var/lib/rewards/state.json"),
        ] {
            vars.insert(k.to_string(), v.to_string());
        }

        let config = Config::from_vars(vars).unwrap();
        assert_eq!(config.event_kind, EventKind::Distribution);
        assert_eq!(config.key_mode, KeyMode::TxHash);
        assert_eq!(config.lookback_blocks, 100);
        assert_eq!(config.validator.min_amount, dec!(0.0001));
        assert_eq!(config.validator.max_amount, dec!(1000000));
        assert!(!config.validator.readback);
        assert_eq!(config.start_block, Some(42));
        assert_eq!(config.notifier, NotifierKind::Nats);
        assert_eq!(
            config.state_path,
            Some(PathBuf::from("/var/lib/rewards/state.json"))
        );
    }

    #[test]
    fn missing_required_value_fails() {
        let mut vars = base();
        vars.remove("RPC_URL");
        let err = Config::from_vars(vars).unwrap_err();
        assert!(err.to_string().contains("RPC_URL"));
    }

    #[test]
    fn invalid_address_fails() {
        let mut vars = base();
        vars.insert("DISTRIBUTOR_ADDRESS".to_string(), "0x123".to_string());
        assert!(Config::from_vars(vars).is_err());
    }

    #[test]
    fn inverted_thresholds_fail() {
        let mut vars = base();
        vars.insert("MIN_REWARD_AMOUNT".to_string(), "5".to_string());
        vars.insert("MAX_REWARD_AMOUNT".to_string(), "1".to_string());
        assert!(Config::from_vars(vars).is_err());
    }

    #[test]
    fn zero_lookback_fails() {
        let mut vars = base();
        vars.insert("LOOKBACK_BLOCKS".to_string(), "0".to_string());
        let err = Config::from_vars(vars).unwrap_err();
        assert!(err.to_string().contains("LOOKBACK_BLOCKS"));
    }

    #[test]
    fn zero_interval_fails() {
        let mut vars = base();
        vars.insert("SCAN_INTERVAL_SECS".to_string(), "0".to_string());
        assert!(Config::from_vars(vars).is_err());
    }

    #[test]
    fn empty_values_count_as_unset() {
        let mut vars = base();
        vars.insert("START_BLOCK".to_string(), "  ".to_string());
        assert_eq!(Config::from_vars(vars).unwrap().start_block, None);
    }
}
