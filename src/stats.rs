// Stats Publisher
//
// Periodic snapshot of distributor views. Not an event stream, so there is
// no cursor and no dedup: every cycle reads, formats and sends once.

use crate::chain::ChainReader;
use crate::notifier::{stats_text, Notification, Notifier};
use crate::token_meta::u256_to_decimal;
use crate::types::TokenMeta;
use eyre::{eyre, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

/// Fields that were read successfully this cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    #[serde(with = "rust_decimal::serde::str_option")]
    pub total_distributed: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::str_option")]
    pub pool_balance: Option<Decimal>,
    pub holder_count: Option<u64>,
}

impl StatsSnapshot {
    pub fn is_empty(&self) -> bool {
        self.total_distributed.is_none()
            && self.pool_balance.is_none()
            && self.holder_count.is_none()
    }

    pub fn is_complete(&self) -> bool {
        self.total_distributed.is_some()
            && self.pool_balance.is_some()
            && self.holder_count.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatsPublisher {
    media: Option<String>,
}

impl StatsPublisher {
    pub fn new(media: Option<String>) -> Self {
        Self { media }
    }

    /// Read every view concurrently; a failed view just drops its field.
    pub async fn collect<R: ChainReader + ?Sized>(
        &self,
        reader: &R,
        meta: &TokenMeta,
    ) -> StatsSnapshot {
        let (total_distributed, pool_balance, holder_count) = futures::join!(
            reader.total_distributed(),
            reader.pool_balance(),
            reader.holder_count()
        );

        let total_distributed = match total_distributed {
            Ok(raw) => Some(u256_to_decimal(raw, meta.decimals)),
            Err(e) => {
                warn!(error = %e, "totalDistributed view failed");
                None
            }
        };
        let pool_balance = match pool_balance {
            Ok(raw) => Some(u256_to_decimal(raw, meta.decimals)),
            Err(e) => {
                warn!(error = %e, "pool balance view failed");
                None
            }
        };
        let holder_count = match holder_count {
            Ok(raw) => Some(raw.saturating_to::<u64>()),
            Err(e) => {
                warn!(error = %e, "holderCount view failed");
                None
            }
        };

        StatsSnapshot {
            total_distributed,
            pool_balance,
            holder_count,
        }
    }

    /// One stats cycle. Errors when no field could be read or delivery failed.
    pub async fn publish_once<R, N>(
        &self,
        reader: &R,
        notifier: &N,
        meta: &TokenMeta,
    ) -> Result<StatsSnapshot>
    where
        R: ChainReader + ?Sized,
        N: Notifier + ?Sized,
    {
        let snapshot = self.collect(reader, meta).await;
        if snapshot.is_empty() {
            return Err(eyre!("all stats views failed, nothing to publish"));
        }
        if !snapshot.is_complete() {
            info!("publishing reduced stats message");
        }

        let notification =
            Notification::text(stats_text(&snapshot, meta)).with_media(self.media.clone());
        notifier.send(&notification).await?;

        info!(
            total_distributed = ?snapshot.total_distributed,
            pool_balance = ?snapshot.pool_balance,
            holder_count = ?snapshot.holder_count,
            "stats published"
        );
        Ok(snapshot)
    }
}
