//! eth-transactor - single-account Ethereum transaction orchestration
//!
//! Submits write transactions for one account with a correct, monotonically
//! advancing nonce, recovers from transient nonce conflicts, adapts to
//! changing gas conditions, and reports success only after a caller-chosen
//! confirmation depth.
//!
//! The network seam is the [`ChainClient`] and [`GasOracle`] traits;
//! [`EthClient`] implements both over an HTTP JSON-RPC endpoint.
//!
//! ```no_run
//! use eth_transactor::{Account, OrchestratorConfig};
//! use ethers::signers::LocalWallet;
//! use ethers::types::{Address, U256};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> eth_transactor::Result<()> {
//! let signer: LocalWallet = std::env::var("PRIVATE_KEY")
//!     .expect("PRIVATE_KEY not set")
//!     .parse()
//!     .expect("invalid private key");
//! let account =
//!     Account::connect("http://localhost:8545", signer, OrchestratorConfig::default()).await?;
//!
//! let ctx = CancellationToken::new();
//! account
//!     .transfer(&ctx, Address::zero(), U256::exp10(18), 12)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod chain;
pub mod config;
pub mod error;
pub mod tx;

pub use backoff::Backoff;
pub use chain::{ChainClient, EthClient, GasOracle, TxReceipt};
pub use config::OrchestratorConfig;
pub use error::{Error, NonceIssue, Result};
pub use tx::{Account, Condition, TxOptions, TxOutcome, TRANSFER_GAS_LIMIT};
