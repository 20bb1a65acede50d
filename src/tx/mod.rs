//! Transaction orchestration: account state, nonce recovery, confirmation tracking

mod account;
mod gas;
mod nonce;
mod orchestrator;

pub use account::{Account, Condition, TxOptions, TRANSFER_GAS_LIMIT};
pub use orchestrator::TxOutcome;
