//! Integration contracts for the engine's external collaborators.
//!
//! Exactly one implementation of each trait is active per deployment: the
//! custody ledger is wired in at construction and the oracle and execution
//! backend are installed (or replaced wholesale) through admin-gated setters.
//! Swapping is a configuration change, never a per-call dispatch decision.

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

/// Ledger of record for asset custody.
///
/// The engine composes these primitives atomically with position lifecycle:
/// `deposit` backs `create_position`, `release` backs `close_position`,
/// swaps, and the emergency sweep.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CustodyLedger: Send + Sync {
    /// Move `amount` units of `asset` from `from` into system custody.
    async fn deposit(&self, from: &str, asset: &str, amount: u128) -> anyhow::Result<()>;

    /// Move `amount` units of `asset` out of system custody to `to`.
    async fn release(&self, to: &str, asset: &str, amount: u128) -> anyhow::Result<()>;
}

/// External price feed, normalized to the system fixed-point scale.
///
/// Implementations must fail when no price is available rather than return a
/// placeholder; a returned zero still fails downstream grid derivation.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn get_price(&self, asset: &str) -> anyhow::Result<u128>;
}

/// Trade-execution backend (router, DEX).
///
/// Trusted to have received `amount_in` before `execute_swap` is invoked and
/// to enforce `amount_out >= min_amount_out` or fail.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Custody account the engine funds before invoking the backend.
    fn account(&self) -> &str;

    /// Swap `amount_in` of `asset_in` for at least `min_amount_out` of
    /// `asset_out`, returning the amount actually received.
    async fn execute_swap(
        &self,
        asset_in: &str,
        asset_out: &str,
        amount_in: u128,
        min_amount_out: u128,
    ) -> anyhow::Result<u128>;
}
