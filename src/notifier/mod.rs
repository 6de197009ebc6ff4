//! Outbound notification sinks.
//!
//! The pipeline only needs "deliver this text (and maybe an animation) to
//! the one configured destination". Each sink owns its retries and its
//! rich-media → plain-text fallback; an `Err` means the plain path failed
//! too and the caller should treat the notification as undelivered.

mod nats;
mod telegram;

pub use nats::NatsNotifier;
pub use telegram::{TelegramConfig, TelegramNotifier};

use crate::stats::StatsSnapshot;
use crate::token_meta::format_amount;
use crate::types::{TokenMeta, ValidatedReward};
use async_trait::async_trait;
use eyre::Result;
use serde::{Deserialize, Serialize};

/// One outbound message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub text: String,
    /// Animation / media reference, sent as a caption-bearing attachment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<String>,
}

impl Notification {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            media: None,
        }
    }

    pub fn with_media(mut self, media: Option<String>) -> Self {
        self.media = media;
        self
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<()>;

    /// Flush and release the underlying channel
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// The sink selected by `NOTIFIER`
pub enum AnyNotifier {
    Telegram(TelegramNotifier),
    Nats(NatsNotifier),
}

#[async_trait]
impl Notifier for AnyNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        match self {
            AnyNotifier::Telegram(n) => n.send(notification).await,
            AnyNotifier::Nats(n) => n.send(notification).await,
        }
    }

    async fn close(&self) -> Result<()> {
        match self {
            AnyNotifier::Telegram(n) => n.close().await,
            AnyNotifier::Nats(n) => n.close().await,
        }
    }
}

/// Plain reward line
pub fn reward_text(reward: &ValidatedReward, meta: &TokenMeta) -> String {
    format!(
        "Reward distributed: {} {} to {}\nTx: {:#x}",
        format_amount(reward.amount),
        meta.symbol,
        reward.recipient,
        reward.source_tx_hash
    )
}

/// Stats summary containing only the fields that were read successfully
pub fn stats_text(stats: &StatsSnapshot, meta: &TokenMeta) -> String {
    let mut lines = vec!["Reward stats".to_string()];
    if let Some(total) = stats.total_distributed {
        lines.push(format!(
            "Total distributed: {} {}",
            format_amount(total),
            meta.symbol
        ));
    }
    if let Some(balance) = stats.pool_balance {
        lines.push(format!(
            "Pool balance: {} {}",
            format_amount(balance),
            meta.symbol
        ));
    }
    if let Some(holders) = stats.holder_count {
        lines.push(format!("Holders: {holders}"));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AmountSource;
    use alloy_primitives::{address, B256};
    use rust_decimal_macros::dec;

    fn meta() -> TokenMeta {
        TokenMeta {
            symbol: "USDC".to_string(),
            decimals: 6,
        }
    }

    #[test]
    fn reward_text_uses_display_amount() {
        let reward = ValidatedReward {
            recipient: address!("00000000000000000000000000000000000000aa"),
            amount: dec!(0.5),
            amount_source: AmountSource::Fallback,
            source_tx_hash: B256::ZERO,
            block_number: 103,
            timestamp: 0,
        };
        let text = reward_text(&reward, &meta());
        assert!(text.contains("0.50 USDC"), "{text}");
    }

    #[test]
    fn stats_text_omits_missing_fields() {
        let stats = StatsSnapshot {
            total_distributed: Some(dec!(1234.5)),
            pool_balance: None,
            holder_count: None,
        };
        let text = stats_text(&stats, &meta());
        assert!(text.contains("Total distributed: 1234.50 USDC"));
        assert!(!text.contains("Pool balance"));
        assert!(!text.contains("Holders"));
    }

    #[test]
    fn notification_json_skips_empty_media() {
        let json = serde_json::to_string(&Notification::text("hi")).unwrap();
        assert_eq!(json, r#"{"text":"hi"}"#);

        let with_media = Notification::text("hi").with_media(Some("gif".to_string()));
        let back: Notification =
            serde_json::from_str(&serde_json::to_string(&with_media).unwrap()).unwrap();
        assert_eq!(back, with_media);
    }
}
