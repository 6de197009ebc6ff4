// Chain Reader
//
// Read-only view of the node: head height, reward logs in a block range,
// and the handful of contract views the pipeline and stats task need.
// Every failure surfaces as a recoverable eyre error; callers decide
// whether it aborts a cycle or the process.

use crate::events::{decode_reward_log, event_signature, views};
use crate::types::{BlockNumber, EventKind, RawEvent, ScanWindow};
use alloy_primitives::{Address, Bytes, U256};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_types_eth::{Filter, TransactionInput, TransactionRequest};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use eyre::{eyre, Result, WrapErr};
use tracing::{debug, info, warn};

#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Current chain head
    async fn block_number(&self) -> Result<BlockNumber>;

    /// Reward events in `window` (inclusive), ascending by block then log index
    async fn query_events(&self, window: ScanWindow) -> Result<Vec<RawEvent>>;

    /// `getDistributionAmount(recipient)` on the distributor
    async fn distribution_amount(&self, recipient: Address) -> Result<U256>;

    async fn token_decimals(&self) -> Result<u8>;

    async fn token_symbol(&self) -> Result<String>;

    async fn total_distributed(&self) -> Result<U256>;

    /// Reward token balance held by the distributor
    async fn pool_balance(&self) -> Result<U256>;

    async fn holder_count(&self) -> Result<U256>;
}

/// JSON-RPC backed reader for one distributor / reward token pair
pub struct RpcChainReader {
    provider: DynProvider,
    distributor: Address,
    token: Address,
    kind: EventKind,
}

impl RpcChainReader {
    /// Connect over HTTP and verify the endpoint answers.
    pub async fn connect(
        rpc_url: &str,
        distributor: Address,
        token: Address,
        kind: EventKind,
    ) -> Result<Self> {
        let url = rpc_url.parse().wrap_err("invalid RPC_URL")?;
        let provider = ProviderBuilder::new().connect_http(url).erased();

        let chain_id = provider
            .get_chain_id()
            .await
            .map_err(|e| eyre!("failed to reach RPC endpoint: {e}"))?;

        info!(
            chain_id,
            distributor = %distributor,
            token = %token,
            kind = ?kind,
            "chain reader connected"
        );

        Ok(Self {
            provider,
            distributor,
            token,
            kind,
        })
    }

    fn filter(&self, window: ScanWindow) -> Filter {
        let filter = Filter::new()
            .event_signature(event_signature(self.kind))
            .from_block(window.from)
            .to_block(window.to);

        match self.kind {
            // Token transfers out of the distributor: topic1 is `from`
            EventKind::Transfer => filter
                .address(self.token)
                .topic1(self.distributor.into_word()),
            EventKind::Distribution => filter.address(self.distributor),
        }
    }

    async fn view<C: SolCall + Send>(&self, to: Address, call: C) -> Result<C::Return> {
        let tx = TransactionRequest::default()
            .to(to)
            .input(TransactionInput::new(Bytes::from(call.abi_encode())));

        let output = self
            .provider
            .call(tx)
            .await
            .map_err(|e| eyre!("{} call failed: {e}", C::SIGNATURE))?;

        C::abi_decode_returns(&output)
            .map_err(|e| eyre!("{} returned malformed data: {e}", C::SIGNATURE))
    }
}

#[async_trait]
impl ChainReader for RpcChainReader {
    async fn block_number(&self) -> Result<BlockNumber> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| eyre!("failed to get block number: {e}"))
    }

    async fn query_events(&self, window: ScanWindow) -> Result<Vec<RawEvent>> {
        let logs = self
            .provider
            .get_logs(&self.filter(window))
            .await
            .map_err(|e| eyre!("failed to query logs {}..={}: {e}", window.from, window.to))?;

        let mut events = Vec::with_capacity(logs.len());
        for log in logs {
            if log.removed {
                continue;
            }

            // Pending logs have no position yet; they show up again once mined
            let (Some(tx_hash), Some(log_index), Some(block_number)) =
                (log.transaction_hash, log.log_index, log.block_number)
            else {
                warn!(address = %log.inner.address, "skipping log without tx position");
                continue;
            };

            let Some(args) = decode_reward_log(&log.inner, self.kind, self.distributor) else {
                debug!(tx = %tx_hash, log_index, "log did not decode as reward event");
                continue;
            };

            events.push(RawEvent {
                tx_hash,
                log_index,
                contract_address: log.inner.address,
                args,
                block_number,
                block_timestamp: log.block_timestamp,
            });
        }

        events.sort_by_key(|e| (e.block_number, e.log_index));
        Ok(events)
    }

    async fn distribution_amount(&self, recipient: Address) -> Result<U256> {
        self.view(
            self.distributor,
            views::getDistributionAmountCall { recipient },
        )
        .await
    }

    async fn token_decimals(&self) -> Result<u8> {
        self.view(self.token, views::decimalsCall {}).await
    }

    async fn token_symbol(&self) -> Result<String> {
        self.view(self.token, views::symbolCall {}).await
    }

    async fn total_distributed(&self) -> Result<U256> {
        self.view(self.distributor, views::totalDistributedCall {}).await
    }

    async fn pool_balance(&self) -> Result<U256> {
        self.view(
            self.token,
            views::balanceOfCall {
                account: self.distributor,
            },
        )
        .await
    }

    async fn holder_count(&self) -> Result<U256> {
        self.view(self.distributor, views::holderCountCall {}).await
    }
}
