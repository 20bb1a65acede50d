//! Transaction orchestration state machine
//!
//! Drives one intent through:
//! precondition check -> submit-and-mine -> postcondition poll ->
//! confirmation wait, with failure reachable from every stage.

use crate::backoff::Backoff;
use crate::chain::ChainClient;
use crate::error::{Error, Result};
use crate::tx::account::{Account, Condition, TxOptions};
use crate::tx::gas::refresh_gas_price;
use crate::tx::nonce::Submitter;

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::H256;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outcome of a completed orchestration
#[derive(Debug, Clone, Copy)]
pub struct TxOutcome {
    /// Hash of the transaction that satisfied the orchestration
    pub tx_hash: H256,
    /// Block it was included in
    pub block_number: u64,
}

impl<C: ChainClient + 'static> Account<C> {
    /// Submit a transaction and wait until it is mined and buried under
    /// `confirm_blocks` additional blocks.
    ///
    /// `pre`, when supplied, gates the whole operation: a false (or failing)
    /// predicate returns [`Error::PreConditionFailed`] before anything is
    /// submitted. `post`, when supplied, must eventually observe the
    /// transaction's intended effect; while it evaluates false the intent is
    /// re-submitted after an exponential backoff. Because a false
    /// post-condition triggers a *fresh* transaction rather than a re-poll,
    /// the builder must be idempotent whenever a post-condition is supplied.
    ///
    /// The account lock is held for each submit-and-mine attempt and released
    /// during post-condition backoff and confirmation waiting. Cancelling
    /// `ctx` aborts any wait with [`Error::Cancelled`].
    pub async fn transact<B>(
        &self,
        ctx: &CancellationToken,
        pre: Option<Condition>,
        build: B,
        post: Option<Condition>,
        confirm_blocks: u64,
    ) -> Result<TxOutcome>
    where
        B: Fn(&TxOptions) -> Result<TypedTransaction> + Send + Sync,
    {
        if let Some(check) = &pre {
            if !check().await {
                return Err(Error::PreConditionFailed);
            }
        }

        let mut backoff = Backoff::new(
            self.config.post_backoff_initial_ms,
            self.config.post_backoff_multiplier,
            self.config.post_backoff_cap_ms,
        );

        let tx_hash = loop {
            let tx_hash = self.submit_and_mine(ctx, &build).await?;

            match &post {
                None => break tx_hash,
                Some(check) if check().await => break tx_hash,
                Some(_) => {
                    let delay = backoff.next_delay();
                    debug!(
                        "Post-condition not yet satisfied, re-submitting in {:?}",
                        delay
                    );
                    tokio::select! {
                        _ = ctx.cancelled() => return Err(Error::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        };

        let block_number = self.wait_confirmed(ctx, tx_hash, confirm_blocks).await?;
        info!(
            "Transaction {:?} confirmed at depth {} (block {})",
            tx_hash, confirm_blocks, block_number
        );

        Ok(TxOutcome {
            tx_hash,
            block_number,
        })
    }

    /// One attempt: under the account lock, refresh the gas price, submit
    /// through the nonce retry engine, and wait for inclusion, all within
    /// the configured attempt deadline so a stuck node cannot pin the lock.
    async fn submit_and_mine<B>(&self, ctx: &CancellationToken, build: &B) -> Result<H256>
    where
        B: Fn(&TxOptions) -> Result<TypedTransaction> + Send + Sync,
    {
        let mut state = self.state.lock().await;

        let submitter = Submitter {
            client: self.client.as_ref(),
            signer: &self.signer,
            from: self.address,
            chain_id: self.chain_id,
            config: &self.config,
        };

        let attempt = async {
            refresh_gas_price(self.oracle.as_ref(), &mut state).await;

            let tx_hash = submitter.submit(ctx, &mut state, build).await?;
            debug!("Submitted transaction {:?}, waiting for inclusion", tx_hash);

            let receipt = self
                .client
                .wait_mined(tx_hash, self.config.mine_poll_interval())
                .await?;
            if !receipt.success {
                warn!("Transaction {:?} mined but reverted", receipt.tx_hash);
            }
            Ok::<H256, Error>(receipt.tx_hash)
        };

        tokio::select! {
            _ = ctx.cancelled() => Err(Error::Cancelled),
            result = tokio::time::timeout(self.config.attempt_timeout(), attempt) => {
                match result {
                    Ok(inner) => inner,
                    Err(_) => Err(Error::Timeout {
                        operation: "submit and mine".to_string(),
                    }),
                }
            }
        }
    }

    /// Poll the chain head until the transaction has `confirm_blocks`
    /// confirmations. Failing to resolve the inclusion block is fatal;
    /// transient errors while polling the head are retried after a short
    /// delay. Returns the inclusion block.
    async fn wait_confirmed(
        &self,
        ctx: &CancellationToken,
        tx_hash: H256,
        confirm_blocks: u64,
    ) -> Result<u64> {
        let tx_block = self.client.block_number_by_tx_hash(tx_hash).await?;
        let mut current = self.client.current_block_number().await?;

        while current.saturating_sub(tx_block) < confirm_blocks {
            tokio::select! {
                _ = ctx.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(self.config.confirm_poll_delay()) => {}
            }

            match self.client.current_block_number().await {
                Ok(head) => current = head,
                Err(err) => {
                    debug!("Chain head poll failed, retrying: {}", err);
                }
            }
        }

        Ok(tx_block)
    }
}
