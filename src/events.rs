// Reward Event and View Definitions
//
// Solidity ABI for the distributor + reward token, and log decoding into
// the pipeline's RawEvent arguments.

use crate::types::{EventArgs, EventKind};
use alloy_primitives::{Address, Log, B256};
use alloy_sol_types::{sol, SolEvent};

// ============================================================================
// EVENTS
// ============================================================================
// NOTE: Event names in sol! MUST match on-chain names for signature calculation

sol! {
    /// ERC20 Transfer emitted by the reward token
    #[derive(Debug)]
    event Transfer(address indexed from, address indexed to, uint256 value);

    /// Emitted by distributors that announce each payout explicitly
    #[derive(Debug)]
    event RewardDistributed(address indexed recipient, uint256 amount);
}

// ============================================================================
// READ-ONLY VIEWS
// ============================================================================

pub mod views {
    use alloy_sol_types::sol;

    sol! {
        /// Precise amount last distributed to `recipient`
        function getDistributionAmount(address recipient) external view returns (uint256);

        function totalDistributed() external view returns (uint256);

        function holderCount() external view returns (uint256);

        function decimals() external view returns (uint8);

        function symbol() external view returns (string);

        function balanceOf(address account) external view returns (uint256);
    }
}

/// topic0 the chain reader filters on for the configured kind
pub fn event_signature(kind: EventKind) -> B256 {
    match kind {
        EventKind::Transfer => Transfer::SIGNATURE_HASH,
        EventKind::Distribution => RewardDistributed::SIGNATURE_HASH,
    }
}

/// Decode a log as a reward event of `kind`.
///
/// Transfer logs only count when they originate from `distributor`; every
/// other transfer of the token is ordinary holder activity. ERC721 transfers
/// carry four topics and are rejected by the ABI decoder.
pub fn decode_reward_log(log: &Log, kind: EventKind, distributor: Address) -> Option<EventArgs> {
    let topic0 = log.topics().first()?;

    match kind {
        EventKind::Transfer => {
            if *topic0 != Transfer::SIGNATURE_HASH {
                return None;
            }
            let decoded = Transfer::decode_log(log).ok()?;
            if decoded.data.from != distributor {
                return None;
            }
            Some(EventArgs::Transfer {
                from: decoded.data.from,
                to: decoded.data.to,
                value: decoded.data.value,
            })
        }
        EventKind::Distribution => {
            if *topic0 != RewardDistributed::SIGNATURE_HASH || log.address != distributor {
                return None;
            }
            let decoded = RewardDistributed::decode_log(log).ok()?;
            Some(EventArgs::Distribution {
                recipient: decoded.data.recipient,
                amount: decoded.data.amount,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, U256};

    const DISTRIBUTOR: Address = address!("1111111111111111111111111111111111111111");
    const TOKEN: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
    const HOLDER: Address = address!("dEAD000000000000000000000000000000000000");

    fn transfer_log(from: Address, to: Address, value: U256) -> Log {
        let event = Transfer { from, to, value };
        let log_data = event.encode_log_data();
        Log::new(TOKEN, log_data.topics().to_vec(), log_data.data.clone()).unwrap()
    }

    #[test]
    fn test_event_signatures() {
        // Transfer(address,address,uint256)
        assert_eq!(
            Transfer::SIGNATURE_HASH.to_string(),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
        assert_eq!(RewardDistributed::SIGNATURE, "RewardDistributed(address,uint256)");
        assert_eq!(
            event_signature(EventKind::Distribution),
            RewardDistributed::SIGNATURE_HASH
        );
    }

    #[test]
    fn decodes_transfer_from_distributor() {
        let log = transfer_log(DISTRIBUTOR, HOLDER, U256::from(500_000u64));
        let args = decode_reward_log(&log, EventKind::Transfer, DISTRIBUTOR).unwrap();
        assert_eq!(args.recipient(), HOLDER);
        assert_eq!(args.raw_value(), U256::from(500_000u64));
    }

    #[test]
    fn ignores_transfer_from_other_sender() {
        let log = transfer_log(HOLDER, DISTRIBUTOR, U256::from(1u64));
        assert!(decode_reward_log(&log, EventKind::Transfer, DISTRIBUTOR).is_none());
    }

    #[test]
    fn distribution_kind_ignores_transfers() {
        let log = transfer_log(DISTRIBUTOR, HOLDER, U256::from(1u64));
        assert!(decode_reward_log(&log, EventKind::Distribution, DISTRIBUTOR).is_none());
    }

    #[test]
    fn decodes_reward_distributed_from_distributor_only() {
        let event = RewardDistributed {
            recipient: HOLDER,
            amount: U256::from(42u64),
        };
        let data = event.encode_log_data();
        let log = Log::new(DISTRIBUTOR, data.topics().to_vec(), data.data.clone()).unwrap();

        let args = decode_reward_log(&log, EventKind::Distribution, DISTRIBUTOR).unwrap();
        assert_eq!(
            args,
            EventArgs::Distribution {
                recipient: HOLDER,
                amount: U256::from(42u64)
            }
        );

        let foreign = Log::new(TOKEN, data.topics().to_vec(), data.data.clone()).unwrap();
        assert!(decode_reward_log(&foreign, EventKind::Distribution, DISTRIBUTOR).is_none());
    }
}
