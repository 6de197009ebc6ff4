//! Reward token decimals and symbol.
//!
//! Resolved once at startup. Reward tokens differ in precision (wrapped
//! native tokens use 18 decimals, stablecoins 6), so raw amounts are never
//! scaled without knowing the token's own `decimals()`.

use crate::chain::ChainReader;
use crate::types::TokenMeta;
use alloy_primitives::U256;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{info, warn};

/// Resolve symbol and decimals from the token contract.
///
/// Degraded mode: when either call fails the whole `fallback` is used, so a
/// symbol from one token is never paired with decimals from another.
pub async fn resolve_token_meta<R: ChainReader + ?Sized>(
    reader: &R,
    fallback: TokenMeta,
) -> TokenMeta {
    let decimals = reader.token_decimals().await;
    let symbol = reader.token_symbol().await;

    match (decimals, symbol) {
        (Ok(decimals), Ok(symbol)) => {
            info!(symbol = %symbol, decimals, "resolved reward token metadata");
            TokenMeta { symbol, decimals }
        }
        (decimals, symbol) => {
            warn!(
                decimals_error = ?decimals.err(),
                symbol_error = ?symbol.err(),
                fallback_symbol = %fallback.symbol,
                fallback_decimals = fallback.decimals,
                "token metadata resolution failed, using fallback"
            );
            fallback
        }
    }
}

/// Convert a raw U256 amount to a display Decimal given token decimals.
///
/// E.g. U256(500_000) with 6 decimals → Decimal(0.500000)
pub fn u256_to_decimal(raw: U256, decimals: u8) -> Decimal {
    // Decimal holds 28-29 significant digits, which covers realistic reward
    // amounts; anything larger clamps to MAX and fails the sanity ceiling.
    let s = raw.to_string();
    let d = match Decimal::from_str_exact(&s) {
        Ok(d) => d,
        Err(_) => {
            warn!(raw = %s, decimals, "U256 exceeds Decimal range, clamping");
            return Decimal::MAX;
        }
    };

    // Decimal scale tops out at 28; deeper tokens are shifted in two steps.
    let mut value = d;
    let mut remaining = decimals as u32;
    while remaining > 0 {
        let step = remaining.min(28);
        value = match value.checked_mul(Decimal::new(1, step)) {
            Some(v) => v,
            None => return Decimal::MAX,
        };
        remaining -= step;
    }
    value
}

/// Render an amount for a message: at least 2 and at most 6 decimal places.
pub fn format_amount(amount: Decimal) -> String {
    let mut rounded = amount
        .round_dp_with_strategy(6, RoundingStrategy::MidpointAwayFromZero)
        .normalize();
    if rounded.scale() < 2 {
        rounded.rescale(2);
    }
    rounded.to_string()
}
