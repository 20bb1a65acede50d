//! Nonce-conflict retry engine
//!
//! Submits a caller-built transaction with the account's held nonce and
//! absorbs the nonce-conflict classes of failure:
//! - too low: skip forward by one and retry immediately (another submitter
//!   consumed nonces this process never observed)
//! - too high: step back by one and retry immediately
//! - any other nonce complaint: bounded recovery loop re-fetching the
//!   authoritative pending nonce from the network

use crate::chain::ChainClient;
use crate::config::OrchestratorConfig;
use crate::error::{Error, NonceIssue, Result};
use crate::tx::account::{TxOptions, TxState};

use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, H256, U256};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// One-attempt submitter bound to an account's identity.
///
/// Callers hold the account lock for the lifetime of a `submit` call; the
/// engine mutates the locked state directly.
pub(crate) struct Submitter<'a, C: ChainClient> {
    pub client: &'a C,
    pub signer: &'a LocalWallet,
    pub from: Address,
    pub chain_id: u64,
    pub config: &'a OrchestratorConfig,
}

impl<C: ChainClient> Submitter<'_, C> {
    /// Build, sign and broadcast with the held nonce, correcting nonce
    /// conflicts until the submission sticks or a non-nonce error surfaces.
    ///
    /// On success the held nonce advances by exactly one.
    pub async fn submit<B>(
        &self,
        ctx: &CancellationToken,
        state: &mut TxState,
        build: &B,
    ) -> Result<H256>
    where
        B: Fn(&TxOptions) -> Result<TypedTransaction> + Send + Sync,
    {
        loop {
            match self.try_once(state, build).await {
                Ok(tx_hash) => {
                    state.nonce += U256::one();
                    return Ok(tx_hash);
                }
                Err(err) => match NonceIssue::classify(&err) {
                    Some(NonceIssue::TooLow) => {
                        state.nonce += U256::one();
                        debug!("Nonce too low, advancing to {}", state.nonce);
                    }
                    Some(NonceIssue::TooHigh) => {
                        state.nonce = state.nonce.saturating_sub(U256::one());
                        debug!("Nonce too high, stepping back to {}", state.nonce);
                    }
                    Some(NonceIssue::Unclassified) => {
                        return self.recover(ctx, state, build, err).await;
                    }
                    None => return Err(err),
                },
            }
        }
    }

    /// Bounded recovery for nonce complaints the classifier cannot map to a
    /// directional correction: re-fetch the pending nonce, overwrite local
    /// state, retry. Surfaces the last error once the budget is exhausted.
    async fn recover<B>(
        &self,
        ctx: &CancellationToken,
        state: &mut TxState,
        build: &B,
        first_err: Error,
    ) -> Result<H256>
    where
        B: Fn(&TxOptions) -> Result<TypedTransaction> + Send + Sync,
    {
        warn!(
            "Unclassified nonce error, entering recovery (up to {} attempts): {}",
            self.config.nonce_recovery_attempts, first_err
        );

        let mut last_err = first_err;
        for attempt in 1..=self.config.nonce_recovery_attempts {
            tokio::select! {
                _ = ctx.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(self.config.nonce_recovery_interval()) => {}
            }

            state.nonce = match self.client.pending_nonce_at(self.from).await {
                Ok(nonce) => nonce,
                Err(err) => {
                    debug!("Pending nonce fetch failed during recovery: {}", err);
                    last_err = err;
                    continue;
                }
            };

            match self.try_once(state, build).await {
                Ok(tx_hash) => {
                    state.nonce += U256::one();
                    debug!("Nonce recovery succeeded on attempt {}", attempt);
                    return Ok(tx_hash);
                }
                Err(err) => {
                    if !err.is_nonce_related() {
                        return Err(err);
                    }
                    last_err = err;
                }
            }
        }

        Err(last_err)
    }

    /// One build-sign-broadcast pass with the current held state.
    ///
    /// The engine owns sequencing: the held nonce, identity and chain are
    /// stamped onto the built transaction regardless of what the builder set.
    async fn try_once<B>(&self, state: &TxState, build: &B) -> Result<H256>
    where
        B: Fn(&TxOptions) -> Result<TypedTransaction> + Send + Sync,
    {
        let opts = TxOptions {
            from: self.from,
            nonce: state.nonce,
            gas_price: state.gas_price,
            chain_id: self.chain_id,
        };

        let mut tx = build(&opts)?;
        tx.set_from(opts.from);
        tx.set_nonce(opts.nonce);
        tx.set_chain_id(opts.chain_id);
        if let Some(price) = opts.gas_price {
            tx.set_gas_price(price);
        }

        let signature = self
            .signer
            .sign_transaction(&tx)
            .await
            .map_err(|e| Error::Wallet(e.to_string()))?;
        let raw = tx.rlp_signed(&signature);

        self.client.send_transaction(raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockChainClient;
    use crate::tx::account::tests::test_signer;
    use ethers::types::TransactionRequest;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn recording_builder(
        log: &'static Mutex<Vec<U256>>,
    ) -> impl Fn(&TxOptions) -> Result<TypedTransaction> + Send + Sync {
        move |opts: &TxOptions| {
            log.lock().unwrap().push(opts.nonce);
            Ok(TypedTransaction::Legacy(
                TransactionRequest::new()
                    .to(Address::repeat_byte(0x22))
                    .value(1u64),
            ))
        }
    }

    fn nonce_log() -> &'static Mutex<Vec<U256>> {
        Box::leak(Box::new(Mutex::new(Vec::new())))
    }

    async fn run_submit(
        client: &MockChainClient,
        config: &OrchestratorConfig,
        state: &mut TxState,
        build: &(impl Fn(&TxOptions) -> Result<TypedTransaction> + Send + Sync),
    ) -> Result<H256> {
        let signer = test_signer();
        let submitter = Submitter {
            client,
            signer: &signer,
            from: signer.address(),
            chain_id: 1,
            config,
        };
        submitter
            .submit(&CancellationToken::new(), state, build)
            .await
    }

    #[tokio::test]
    async fn successful_submissions_use_strictly_increasing_nonces() {
        let mut client = MockChainClient::new();
        client
            .expect_send_transaction()
            .times(3)
            .returning(|_| Ok(H256::repeat_byte(0x01)));

        let log = nonce_log();
        let build = recording_builder(log);
        let config = OrchestratorConfig::default();
        let mut state = TxState {
            nonce: U256::zero(),
            gas_price: None,
        };

        for _ in 0..3 {
            run_submit(&client, &config, &mut state, &build).await.unwrap();
        }

        let nonces = log.lock().unwrap().clone();
        assert_eq!(nonces, vec![U256::from(0), U256::from(1), U256::from(2)]);
        assert_eq!(state.nonce, U256::from(3));
    }

    #[tokio::test]
    async fn nonce_too_low_advances_until_accepted() {
        let mut client = MockChainClient::new();
        let rejections = AtomicU32::new(0);
        client.expect_send_transaction().returning(move |_| {
            if rejections.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(Error::Submission("nonce too low".to_string()))
            } else {
                Ok(H256::repeat_byte(0x02))
            }
        });

        let log = nonce_log();
        let build = recording_builder(log);
        let config = OrchestratorConfig::default();
        let mut state = TxState {
            nonce: U256::from(5),
            gas_price: None,
        };

        run_submit(&client, &config, &mut state, &build).await.unwrap();

        let nonces = log.lock().unwrap().clone();
        assert_eq!(nonces, vec![U256::from(5), U256::from(6), U256::from(7)]);
        // Two skipped nonces plus the successful one.
        assert_eq!(state.nonce, U256::from(8));
    }

    #[tokio::test]
    async fn nonce_too_high_steps_back_once() {
        let mut client = MockChainClient::new();
        let rejections = AtomicU32::new(0);
        client.expect_send_transaction().returning(move |_| {
            if rejections.fetch_add(1, Ordering::SeqCst) < 1 {
                Err(Error::Submission("nonce too high".to_string()))
            } else {
                Ok(H256::repeat_byte(0x03))
            }
        });

        let log = nonce_log();
        let build = recording_builder(log);
        let config = OrchestratorConfig::default();
        let mut state = TxState {
            nonce: U256::from(5),
            gas_price: None,
        };

        run_submit(&client, &config, &mut state, &build).await.unwrap();

        let nonces = log.lock().unwrap().clone();
        assert_eq!(nonces, vec![U256::from(5), U256::from(4)]);
        assert_eq!(state.nonce, U256::from(5));
    }

    #[tokio::test(start_paused = true)]
    async fn unclassified_nonce_error_recovers_from_pending_nonce() {
        let mut client = MockChainClient::new();
        let rejections = AtomicU32::new(0);
        client.expect_send_transaction().returning(move |_| {
            if rejections.fetch_add(1, Ordering::SeqCst) < 1 {
                Err(Error::Submission("invalid nonce for sender".to_string()))
            } else {
                Ok(H256::repeat_byte(0x04))
            }
        });
        client
            .expect_pending_nonce_at()
            .times(1)
            .returning(|_| Ok(U256::from(12)));

        let log = nonce_log();
        let build = recording_builder(log);
        let config = OrchestratorConfig::default();
        let mut state = TxState {
            nonce: U256::from(5),
            gas_price: None,
        };

        run_submit(&client, &config, &mut state, &build).await.unwrap();

        let nonces = log.lock().unwrap().clone();
        assert_eq!(nonces, vec![U256::from(5), U256::from(12)]);
        assert_eq!(state.nonce, U256::from(13));
    }

    #[tokio::test(start_paused = true)]
    async fn recovery_budget_exhaustion_surfaces_last_error() {
        let mut client = MockChainClient::new();
        client
            .expect_send_transaction()
            .returning(|_| Err(Error::Submission("invalid nonce for sender".to_string())));
        client
            .expect_pending_nonce_at()
            .times(2)
            .returning(|_| Ok(U256::from(9)));

        let config = OrchestratorConfig {
            nonce_recovery_attempts: 2,
            ..OrchestratorConfig::default()
        };
        let log = nonce_log();
        let build = recording_builder(log);
        let mut state = TxState {
            nonce: U256::from(5),
            gas_price: None,
        };

        let result = run_submit(&client, &config, &mut state, &build).await;
        match result {
            Err(Error::Submission(msg)) => assert!(msg.contains("invalid nonce")),
            other => panic!("expected submission error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_nonce_errors_surface_immediately() {
        let mut client = MockChainClient::new();
        client
            .expect_send_transaction()
            .times(1)
            .returning(|_| Err(Error::Submission("insufficient funds".to_string())));
        // No pending_nonce_at expectation: recovery must not start.

        let log = nonce_log();
        let build = recording_builder(log);
        let config = OrchestratorConfig::default();
        let mut state = TxState {
            nonce: U256::from(5),
            gas_price: None,
        };

        let result = run_submit(&client, &config, &mut state, &build).await;
        assert!(matches!(result, Err(Error::Submission(m)) if m == "insufficient funds"));
        assert_eq!(state.nonce, U256::from(5));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_recovery() {
        let mut client = MockChainClient::new();
        client
            .expect_send_transaction()
            .returning(|_| Err(Error::Submission("invalid nonce for sender".to_string())));

        let signer = test_signer();
        let config = OrchestratorConfig::default();
        let submitter = Submitter {
            client: &client,
            signer: &signer,
            from: signer.address(),
            chain_id: 1,
            config: &config,
        };

        let log = nonce_log();
        let build = recording_builder(log);
        let mut state = TxState {
            nonce: U256::from(5),
            gas_price: None,
        };

        let ctx = CancellationToken::new();
        ctx.cancel();
        let result = submitter.submit(&ctx, &mut state, &build).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
