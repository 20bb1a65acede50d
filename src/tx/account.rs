//! Per-address account state and the built-in transfer instruction

use crate::chain::{ChainClient, EthClient, GasOracle};
use crate::config::OrchestratorConfig;
use crate::error::{Error, Result};
use crate::tx::TxOutcome;

use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, TransactionRequest, U256};
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Gas limit for a plain value transfer to a non-contract address
pub const TRANSFER_GAS_LIMIT: u64 = 21_000;

/// Caller-supplied predicate bracketing a transaction (pre- or post-condition)
pub type Condition = Box<dyn Fn() -> BoxFuture<'static, bool> + Send + Sync>;

/// Mutable submission state, guarded by the account mutex.
///
/// `nonce` is the next sequence number to use. It only moves while the lock
/// is held: forward by one per successful submission (or a too-low
/// correction), backward by one when the network reports it too high.
pub(crate) struct TxState {
    pub nonce: U256,
    pub gas_price: Option<U256>,
}

/// Transact options snapshot handed to a transaction builder for one attempt
#[derive(Debug, Clone, Copy)]
pub struct TxOptions {
    /// Submitting address
    pub from: Address,
    /// Nonce this attempt will be submitted with
    pub nonce: U256,
    /// Last-known recommended gas price, if any
    pub gas_price: Option<U256>,
    /// Chain the transaction is bound to
    pub chain_id: u64,
}

/// An account that can perform write transactions against one chain.
///
/// Holds the only authority over the address's nonce within this process;
/// all writers serialize through the internal mutex.
pub struct Account<C: ChainClient> {
    pub(crate) client: Arc<C>,
    pub(crate) oracle: Arc<dyn GasOracle>,
    pub(crate) signer: LocalWallet,
    pub(crate) address: Address,
    pub(crate) chain_id: u64,
    pub(crate) config: OrchestratorConfig,
    pub(crate) state: Mutex<TxState>,
}

impl<C: ChainClient + 'static> Account<C> {
    /// Create an account over an existing client connection.
    ///
    /// Primes the nonce from the network's pending view and the gas price
    /// from the oracle (no-op when the oracle has no opinion). Fails with
    /// [`Error::NonceFetch`] when the initial nonce cannot be read.
    pub async fn new(
        client: Arc<C>,
        oracle: Arc<dyn GasOracle>,
        signer: LocalWallet,
        config: OrchestratorConfig,
    ) -> Result<Self> {
        let address = signer.address();
        let chain_id = signer.chain_id();

        let nonce = client
            .pending_nonce_at(address)
            .await
            .map_err(|e| Error::NonceFetch(e.to_string()))?;

        let gas_price = oracle.suggested_gas_price().await;

        debug!(
            "Initialized account {:?} with nonce {} on chain {}",
            address, nonce, chain_id
        );

        Ok(Self {
            client,
            oracle,
            signer,
            address,
            chain_id,
            config,
            state: Mutex::new(TxState { nonce, gas_price }),
        })
    }

    /// Address of the account. No side effects.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Transfer native currency to `to`, then wait for `confirm_blocks`
    /// confirmations.
    ///
    /// Pre-condition: the account balance must exceed `value`; an unreadable
    /// balance counts as insufficient (fail closed). No post-condition — a
    /// mined transfer is evidence enough.
    pub async fn transfer(
        &self,
        ctx: &CancellationToken,
        to: Address,
        value: U256,
        confirm_blocks: u64,
    ) -> Result<TxOutcome> {
        let client = Arc::clone(&self.client);
        let from = self.address;
        let pre: Condition = Box::new(move || {
            let client = Arc::clone(&client);
            Box::pin(async move {
                match client.balance_of(from).await {
                    Ok(balance) => balance > value,
                    Err(_) => false,
                }
            })
        });

        let build = move |opts: &TxOptions| {
            let mut request = TransactionRequest::new()
                .from(opts.from)
                .to(to)
                .value(value)
                .gas(TRANSFER_GAS_LIMIT);
            if let Some(price) = opts.gas_price {
                request = request.gas_price(price);
            }
            Ok(TypedTransaction::Legacy(request))
        };

        self.transact(ctx, Some(pre), build, None, confirm_blocks)
            .await
    }
}

impl Account<EthClient> {
    /// Connect to a node and create an account in one step.
    ///
    /// The client doubles as the gas oracle. Fails with
    /// [`Error::Connection`] when the node is unreachable.
    pub async fn connect(
        url: &str,
        signer: LocalWallet,
        config: OrchestratorConfig,
    ) -> Result<Self> {
        let client = Arc::new(EthClient::connect(url).await?);
        let oracle = Arc::clone(&client) as Arc<dyn GasOracle>;
        Self::new(client, oracle, signer, config).await
    }
}
