//! Deterministic in-memory collaborators for tests and simulation runs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::traits::{CustodyLedger, ExecutionBackend, PriceOracle};
use crate::engine::math::{mul_div, BPS_DENOMINATOR, PRICE_SCALE};

/// Account name the custody mock books system-held funds under.
pub const SYSTEM_ACCOUNT: &str = "system";

/// In-memory custody ledger with per-(account, asset) balances.
///
/// Both primitives are all-or-nothing: an insufficient source balance fails
/// the transfer without moving anything.
#[derive(Debug, Default)]
pub struct MockCustody {
    balances: Arc<RwLock<HashMap<(String, String), u128>>>,
}

impl MockCustody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account with funds.
    pub async fn fund(&self, account: &str, asset: &str, amount: u128) {
        let mut balances = self.balances.write().await;
        let entry = balances
            .entry((account.to_string(), asset.to_string()))
            .or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    pub async fn balance_of(&self, account: &str, asset: &str) -> u128 {
        self.balances
            .read()
            .await
            .get(&(account.to_string(), asset.to_string()))
            .copied()
            .unwrap_or(0)
    }

    async fn transfer(&self, from: &str, to: &str, asset: &str, amount: u128) -> anyhow::Result<()> {
        let mut balances = self.balances.write().await;

        let source = balances
            .get(&(from.to_string(), asset.to_string()))
            .copied()
            .unwrap_or(0);
        anyhow::ensure!(
            source >= amount,
            "insufficient {asset} balance for {from}: have {source}, need {amount}"
        );

        balances.insert((from.to_string(), asset.to_string()), source - amount);
        let dest = balances
            .entry((to.to_string(), asset.to_string()))
            .or_insert(0);
        *dest += amount;

        debug!(%from, %to, %asset, amount, "Custody transfer");
        Ok(())
    }
}

#[async_trait]
impl CustodyLedger for MockCustody {
    async fn deposit(&self, from: &str, asset: &str, amount: u128) -> anyhow::Result<()> {
        self.transfer(from, SYSTEM_ACCOUNT, asset, amount).await
    }

    async fn release(&self, to: &str, asset: &str, amount: u128) -> anyhow::Result<()> {
        self.transfer(SYSTEM_ACCOUNT, to, asset, amount).await
    }
}

/// Price oracle backed by a settable price table.
///
/// Unknown assets fail the read; there is no placeholder price.
#[derive(Debug, Default)]
pub struct MockOracle {
    prices: Arc<RwLock<HashMap<String, u128>>>,
}

impl MockOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_price(&self, asset: &str, price: u128) {
        self.prices.write().await.insert(asset.to_string(), price);
    }
}

#[async_trait]
impl PriceOracle for MockOracle {
    async fn get_price(&self, asset: &str) -> anyhow::Result<u128> {
        self.prices
            .read()
            .await
            .get(asset)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("no price available for {asset}"))
    }
}

/// Fixed-rate swap router with a taker fee in basis points.
///
/// `amount_out = amount_in * rate / PRICE_SCALE`, minus the fee, truncating.
/// Rejects pairs without a configured rate and outputs below
/// `min_amount_out`.
pub struct MockDexRouter {
    rates: Arc<RwLock<HashMap<(String, String), u128>>>,
    fee_bps: u32,
    swap_count: AtomicU64,
}

impl MockDexRouter {
    pub fn new(fee_bps: u32) -> Self {
        Self {
            rates: Arc::new(RwLock::new(HashMap::new())),
            fee_bps,
            swap_count: AtomicU64::new(0),
        }
    }

    /// Set the scaled exchange rate for a pair (1.0 = `PRICE_SCALE`).
    pub async fn set_rate(&self, asset_in: &str, asset_out: &str, rate: u128) {
        self.rates
            .write()
            .await
            .insert((asset_in.to_string(), asset_out.to_string()), rate);
    }

    pub fn swap_count(&self) -> u64 {
        self.swap_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionBackend for MockDexRouter {
    fn account(&self) -> &str {
        "mock-router"
    }

    async fn execute_swap(
        &self,
        asset_in: &str,
        asset_out: &str,
        amount_in: u128,
        min_amount_out: u128,
    ) -> anyhow::Result<u128> {
        let rate = self
            .rates
            .read()
            .await
            .get(&(asset_in.to_string(), asset_out.to_string()))
            .copied()
            .ok_or_else(|| anyhow::anyhow!("no rate configured for {asset_in}/{asset_out}"))?;

        let gross = mul_div(amount_in, rate, PRICE_SCALE)?;
        let amount_out = mul_div(gross, BPS_DENOMINATOR - self.fee_bps as u128, BPS_DENOMINATOR)?;

        anyhow::ensure!(
            amount_out >= min_amount_out,
            "swap output {amount_out} below minimum {min_amount_out}"
        );

        self.swap_count.fetch_add(1, Ordering::SeqCst);
        debug!(%asset_in, %asset_out, amount_in, amount_out, "Mock swap executed");
        Ok(amount_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE: u128 = PRICE_SCALE;

    #[tokio::test]
    async fn custody_moves_funds_between_accounts() {
        let custody = MockCustody::new();
        custody.fund("alice", "USDC", 100).await;

        custody.deposit("alice", "USDC", 60).await.unwrap();
        assert_eq!(custody.balance_of("alice", "USDC").await, 40);
        assert_eq!(custody.balance_of(SYSTEM_ACCOUNT, "USDC").await, 60);

        custody.release("bob", "USDC", 25).await.unwrap();
        assert_eq!(custody.balance_of("bob", "USDC").await, 25);
        assert_eq!(custody.balance_of(SYSTEM_ACCOUNT, "USDC").await, 35);
    }

    #[tokio::test]
    async fn custody_rejects_insufficient_balance_without_moving_funds() {
        let custody = MockCustody::new();
        custody.fund("alice", "USDC", 10).await;

        assert!(custody.deposit("alice", "USDC", 11).await.is_err());
        assert_eq!(custody.balance_of("alice", "USDC").await, 10);
        assert_eq!(custody.balance_of(SYSTEM_ACCOUNT, "USDC").await, 0);
    }

    #[tokio::test]
    async fn oracle_fails_on_unknown_asset() {
        let oracle = MockOracle::new();
        oracle.set_price("ETH", 2000 * ONE).await;

        assert_eq!(oracle.get_price("ETH").await.unwrap(), 2000 * ONE);
        assert!(oracle.get_price("DOGE").await.is_err());
    }

    #[tokio::test]
    async fn router_applies_rate_and_fee() {
        let router = MockDexRouter::new(30); // 0.3%
        router.set_rate("USDC", "ETH", PRICE_SCALE / 2000).await;

        // 2000 USDC -> 1 ETH gross -> 0.997 ETH net of fee.
        let out = router
            .execute_swap("USDC", "ETH", 2000 * ONE, 0)
            .await
            .unwrap();
        assert_eq!(out, 997 * ONE / 1000);
        assert_eq!(router.swap_count(), 1);
    }

    #[tokio::test]
    async fn router_enforces_min_amount_out() {
        let router = MockDexRouter::new(0);
        router.set_rate("USDC", "ETH", PRICE_SCALE).await;

        assert!(router
            .execute_swap("USDC", "ETH", ONE, 2 * ONE)
            .await
            .is_err());
        assert_eq!(router.swap_count(), 0);
    }
}
