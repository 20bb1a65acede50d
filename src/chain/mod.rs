//! Chain module - the seam between the orchestrator and the network
//!
//! This module provides:
//! - The [`ChainClient`] trait covering every RPC capability the orchestrator
//!   consumes (balance, pending nonce, broadcast, mine-wait, block heights)
//! - The [`GasOracle`] trait for fee recommendations
//! - [`EthClient`], a production implementation of both over an HTTP provider

pub mod provider;

pub use provider::EthClient;

use crate::error::Result;

use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256, U256};
use std::time::Duration;

#[cfg(test)]
use mockall::automock;

/// Receipt summary for a mined transaction
#[derive(Debug, Clone, Copy)]
pub struct TxReceipt {
    /// Hash of the mined transaction
    pub tx_hash: H256,
    /// Block the transaction was included in
    pub block_number: u64,
    /// Whether execution succeeded (status == 1)
    pub success: bool,
}

/// Read and broadcast capabilities the orchestrator needs from a node.
///
/// Implementations must tolerate concurrent use from multiple accounts; the
/// orchestrator adds no locking around the client itself.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Balance of `address` as of the latest block.
    async fn balance_of(&self, address: Address) -> Result<U256>;

    /// Next usable nonce for `address`, including pending transactions.
    async fn pending_nonce_at(&self, address: Address) -> Result<U256>;

    /// Broadcast a signed, RLP-encoded transaction.
    async fn send_transaction(&self, raw: Bytes) -> Result<H256>;

    /// Block until the transaction is mined, polling at `poll_interval`.
    ///
    /// This wait is unbounded; the orchestrator bounds it with a per-attempt
    /// deadline.
    async fn wait_mined(&self, tx_hash: H256, poll_interval: Duration) -> Result<TxReceipt>;

    /// Block number a mined transaction was included in.
    async fn block_number_by_tx_hash(&self, tx_hash: H256) -> Result<u64>;

    /// Current chain head height.
    async fn current_block_number(&self) -> Result<u64>;
}

/// Source of fee recommendations, consulted before every submission attempt.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GasOracle: Send + Sync {
    /// Currently recommended gas price, or `None` when the oracle has no
    /// opinion. Failures are treated as no-opinion by the refresh path.
    async fn suggested_gas_price(&self) -> Option<U256>;
}
