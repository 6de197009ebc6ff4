// Event Validator
//
// Turns a raw reward event into a display-precision reward or a rejection.
// Rejection is routine control flow (dust, no-op transfers, implausible
// values) and is never surfaced as an error.

use crate::chain::ChainReader;
use crate::token_meta::u256_to_decimal;
use crate::types::{AmountSource, RawEvent, TokenMeta, ValidatedReward};
use alloy_primitives::U256;
use rust_decimal::Decimal;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Thresholds in display units (already divided by `10^decimals`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorConfig {
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    /// Try `getDistributionAmount(recipient)` before trusting the event value
    pub readback: bool,
}

/// Amount resolution outcome, tagged with the path that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedAmount {
    Authoritative(U256),
    Fallback(U256),
}

impl ResolvedAmount {
    pub fn raw(&self) -> U256 {
        match self {
            ResolvedAmount::Authoritative(v) | ResolvedAmount::Fallback(v) => *v,
        }
    }

    pub fn source(&self) -> AmountSource {
        match self {
            ResolvedAmount::Authoritative(_) => AmountSource::Authoritative,
            ResolvedAmount::Fallback(_) => AmountSource::Fallback,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The event moved nothing
    ZeroValue,
    BelowMinimum { amount: Decimal, minimum: Decimal },
    AboveCeiling { amount: Decimal, ceiling: Decimal },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::ZeroValue => write!(f, "zero-value event"),
            Rejection::BelowMinimum { amount, minimum } => {
                write!(f, "amount {amount} below minimum {minimum}")
            }
            Rejection::AboveCeiling { amount, ceiling } => {
                write!(f, "amount {amount} above sanity ceiling {ceiling}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Accepted(ValidatedReward),
    Rejected(Rejection),
}

#[derive(Debug, Clone)]
pub struct EventValidator {
    config: ValidatorConfig,
}

impl EventValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Prefer the distributor's own record of the payout; the event value
    /// can be a pre-adjustment figure on batching distributors. A failed or
    /// zero read-back falls back to the event value.
    pub async fn resolve_amount<R: ChainReader + ?Sized>(
        &self,
        reader: &R,
        event: &RawEvent,
    ) -> ResolvedAmount {
        let raw = event.args.raw_value();
        if !self.config.readback {
            return ResolvedAmount::Fallback(raw);
        }

        let recipient = event.args.recipient();
        match reader.distribution_amount(recipient).await {
            Ok(amount) if !amount.is_zero() => ResolvedAmount::Authoritative(amount),
            Ok(_) => {
                debug!(
                    tx = %event.tx_hash,
                    recipient = %recipient,
                    "read-back returned zero, using event value"
                );
                ResolvedAmount::Fallback(raw)
            }
            Err(e) => {
                debug!(
                    tx = %event.tx_hash,
                    recipient = %recipient,
                    error = %e,
                    "read-back failed, using event value"
                );
                ResolvedAmount::Fallback(raw)
            }
        }
    }

    pub async fn validate<R: ChainReader + ?Sized>(
        &self,
        reader: &R,
        event: &RawEvent,
        meta: &TokenMeta,
    ) -> Validation {
        if event.args.raw_value().is_zero() {
            return Validation::Rejected(Rejection::ZeroValue);
        }

        let resolved = self.resolve_amount(reader, event).await;
        let amount = u256_to_decimal(resolved.raw(), meta.decimals);

        if amount < self.config.min_amount {
            return Validation::Rejected(Rejection::BelowMinimum {
                amount,
                minimum: self.config.min_amount,
            });
        }
        if amount > self.config.max_amount {
            return Validation::Rejected(Rejection::AboveCeiling {
                amount,
                ceiling: self.config.max_amount,
            });
        }

        Validation::Accepted(ValidatedReward {
            recipient: event.args.recipient(),
            amount,
            amount_source: resolved.source(),
            source_tx_hash: event.tx_hash,
            block_number: event.block_number,
            timestamp: event.block_timestamp.unwrap_or_else(now_secs),
        })
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
