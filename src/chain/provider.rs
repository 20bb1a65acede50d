//! HTTP provider implementation of the chain client and gas oracle

use crate::chain::{ChainClient, GasOracle, TxReceipt};
use crate::error::{Error, Result};

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Address, BlockNumber, Bytes, H256, U256};
use std::time::Duration;
use tracing::{debug, warn};

/// JSON-RPC backed [`ChainClient`] over a single HTTP endpoint.
pub struct EthClient {
    provider: Provider<Http>,
}

impl EthClient {
    /// Connect to a node and verify it answers.
    ///
    /// Fails with [`Error::Connection`] when the URL is invalid or the node
    /// is unreachable.
    pub async fn connect(url: &str) -> Result<Self> {
        let provider = Provider::<Http>::try_from(url)
            .map_err(|e| Error::Connection {
                message: e.to_string(),
            })?
            .interval(Duration::from_millis(100));

        // Probe the endpoint so a dead node fails construction, not the
        // first transaction.
        provider
            .get_block_number()
            .await
            .map_err(|e| Error::Connection {
                message: e.to_string(),
            })?;

        debug!("Connected to RPC endpoint {}", url);
        Ok(Self { provider })
    }

    /// Access the underlying provider for calls outside the orchestrator.
    pub fn provider(&self) -> &Provider<Http> {
        &self.provider
    }
}

#[async_trait]
impl ChainClient for EthClient {
    async fn balance_of(&self, address: Address) -> Result<U256> {
        self.provider
            .get_balance(address, None)
            .await
            .map_err(|e| Error::Client(e.to_string()))
    }

    async fn pending_nonce_at(&self, address: Address) -> Result<U256> {
        self.provider
            .get_transaction_count(address, Some(BlockNumber::Pending.into()))
            .await
            .map_err(|e| Error::Client(e.to_string()))
    }

    async fn send_transaction(&self, raw: Bytes) -> Result<H256> {
        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .map_err(|e| Error::Submission(e.to_string()))?;
        Ok(pending.tx_hash())
    }

    async fn wait_mined(&self, tx_hash: H256, poll_interval: Duration) -> Result<TxReceipt> {
        loop {
            match self.provider.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    if let Some(block_number) = receipt.block_number {
                        return Ok(TxReceipt {
                            tx_hash: receipt.transaction_hash,
                            block_number: block_number.as_u64(),
                            success: receipt.status == Some(1.into()),
                        });
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    // Transient RPC failures just delay the next poll.
                    warn!("Receipt poll failed for {:?}: {}", tx_hash, e);
                }
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    async fn block_number_by_tx_hash(&self, tx_hash: H256) -> Result<u64> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| Error::Client(e.to_string()))?
            .ok_or_else(|| Error::Client(format!("no receipt for transaction {tx_hash:?}")))?;

        receipt
            .block_number
            .map(|b| b.as_u64())
            .ok_or_else(|| Error::Client(format!("transaction {tx_hash:?} not yet mined")))
    }

    async fn current_block_number(&self) -> Result<u64> {
        self.provider
            .get_block_number()
            .await
            .map(|b| b.as_u64())
            .map_err(|e| Error::Client(e.to_string()))
    }
}

#[async_trait]
impl GasOracle for EthClient {
    async fn suggested_gas_price(&self) -> Option<U256> {
        match self.provider.get_gas_price().await {
            Ok(price) => Some(price),
            Err(e) => {
                debug!("Gas price query failed, keeping previous price: {}", e);
                None
            }
        }
    }
}
