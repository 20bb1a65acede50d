//! Best-effort gas price refresh

use crate::chain::GasOracle;
use crate::tx::account::TxState;

use tracing::debug;

/// Overwrite the held gas price with the oracle's current recommendation.
///
/// A no-opinion oracle leaves the previous price in place; this path never
/// fails an orchestration.
pub(crate) async fn refresh_gas_price(oracle: &dyn GasOracle, state: &mut TxState) {
    if let Some(price) = oracle.suggested_gas_price().await {
        debug!("Refreshed gas price to {}", price);
        state.gas_price = Some(price);
    }
}
