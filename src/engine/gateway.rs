//! Engine facade and adapter gateway.
//!
//! `GridEngine` composes the position store, fill ledger, and access
//! controller with the external collaborators (custody ledger, price oracle,
//! execution backend) and is the only public mutation surface. Mutating
//! operations run one at a time (`&mut self`) and additionally hold a
//! per-entry reentrancy lock across any call out to external code; reads
//! never take the lock.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::adapters::{CustodyLedger, ExecutionBackend, PriceOracle};

use super::access::{AccessController, Capability};
use super::error::{EngineError, EngineResult};
use super::fills::FillLedger;
use super::math;
use super::position::{Position, PositionStore};

/// In-progress flag for top-level mutating entry calls.
///
/// External collaborators are invoked while a mutation is underway; if one of
/// them finds a way back into the engine, the nested entry must be rejected
/// rather than interleaved.
#[derive(Debug, Default)]
struct ReentrancyFlag(Arc<AtomicBool>);

/// RAII lease on the flag; releases on drop, so every exit path (including
/// `?` failures) unlocks.
struct EntryGuard(Arc<AtomicBool>);

impl ReentrancyFlag {
    fn enter(&self) -> EngineResult<EntryGuard> {
        if self
            .0
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(EngineError::Reentrancy);
        }
        Ok(EntryGuard(self.0.clone()))
    }
}

impl Drop for EntryGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Aggregate engine statistics for monitoring.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub total_positions: usize,
    pub active_positions: usize,
    pub total_fills: u64,
    /// Total quote-asset volume recorded across all grid slots.
    pub recorded_volume: u128,
    /// Sum of active position balances, per quote asset.
    pub active_balances: HashMap<String, u128>,
}

/// Deterministic grid-trading accounting and execution core.
pub struct GridEngine {
    access: AccessController,
    positions: PositionStore,
    fills: FillLedger,
    custody: Arc<dyn CustodyLedger>,
    oracle: Option<Arc<dyn PriceOracle>>,
    backend: Option<Arc<dyn ExecutionBackend>>,
    entry_flag: ReentrancyFlag,
}

impl GridEngine {
    /// Create an engine wired to `custody`, with `bootstrap` holding the
    /// `Admin` and `Keeper` capabilities.
    pub fn new(bootstrap: &str, custody: Arc<dyn CustodyLedger>) -> Self {
        Self {
            access: AccessController::new(bootstrap),
            positions: PositionStore::new(),
            fills: FillLedger::new(),
            custody,
            oracle: None,
            backend: None,
            entry_flag: ReentrancyFlag::default(),
        }
    }

    // ---- adapter and role management -------------------------------------

    /// Install or replace the price oracle. Admin-gated.
    pub fn set_price_oracle(
        &mut self,
        oracle: Arc<dyn PriceOracle>,
        caller: &str,
    ) -> EngineResult<()> {
        self.access.require_admin(caller)?;
        self.oracle = Some(oracle);
        info!(set_by = %caller, "Price oracle configured");
        Ok(())
    }

    /// Install or replace the execution backend. Admin-gated.
    pub fn set_execution_backend(
        &mut self,
        backend: Arc<dyn ExecutionBackend>,
        caller: &str,
    ) -> EngineResult<()> {
        self.access.require_admin(caller)?;
        info!(account = backend.account(), set_by = %caller, "Execution backend configured");
        self.backend = Some(backend);
        Ok(())
    }

    /// Grant a capability to an identity. Admin-gated.
    pub fn grant_role(
        &mut self,
        identity: &str,
        capability: Capability,
        caller: &str,
    ) -> EngineResult<()> {
        self.access.grant(identity, capability, caller)
    }

    /// Revoke a capability from an identity. Admin-gated.
    pub fn revoke_role(
        &mut self,
        identity: &str,
        capability: Capability,
        caller: &str,
    ) -> EngineResult<()> {
        self.access.revoke(identity, capability, caller)
    }

    pub fn has_capability(&self, identity: &str, capability: Capability) -> bool {
        self.access.has_capability(identity, capability)
    }

    // ---- position lifecycle ----------------------------------------------

    /// Move `amount` of `asset` from `owner` into system custody and open a
    /// position funded with it, as one atomic unit: arguments are validated
    /// before the deposit, so record creation cannot fail afterwards.
    pub async fn create_position(
        &mut self,
        owner: &str,
        asset: &str,
        lower_price: u128,
        upper_price: u128,
        grid_count: u32,
        amount: u128,
    ) -> EngineResult<u64> {
        let _guard = self.entry_flag.enter()?;

        PositionStore::validate_params(asset, lower_price, upper_price, grid_count, amount)?;

        self.custody
            .deposit(owner, asset, amount)
            .await
            .map_err(EngineError::Custody)?;

        self.positions
            .open(owner, asset, lower_price, upper_price, grid_count, amount)
    }

    /// Close a position and release its balance back to the owner.
    /// Irreversible. Preconditions are verified before custody moves, so a
    /// failed release leaves the position untouched.
    pub async fn close_position(&mut self, id: u64, caller: &str) -> EngineResult<u128> {
        let _guard = self.entry_flag.enter()?;

        let (owner, asset, amount) = {
            let position = self.positions.require_active(id)?;
            if position.owner != caller {
                return Err(EngineError::Unauthorized(caller.to_string()));
            }
            (
                position.owner.clone(),
                position.asset.clone(),
                position.balance,
            )
        };

        self.custody
            .release(&owner, &asset, amount)
            .await
            .map_err(EngineError::Custody)?;

        self.positions.close(id, caller)?;
        Ok(amount)
    }

    // ---- fill recording ---------------------------------------------------

    /// Record a real trade outcome against one grid slot and adjust the
    /// position balance by `received - spent`. Sole mutator of `balance`
    /// after creation; carries no knowledge of why the fill occurred.
    pub fn record_fill(
        &mut self,
        id: u64,
        grid_index: u32,
        spent: u128,
        received: u128,
        price: u128,
        caller: &str,
    ) -> EngineResult<u128> {
        let _guard = self.entry_flag.enter()?;
        self.record_fill_inner(id, grid_index, spent, received, price, caller)
    }

    fn record_fill_inner(
        &mut self,
        id: u64,
        grid_index: u32,
        spent: u128,
        received: u128,
        price: u128,
        caller: &str,
    ) -> EngineResult<u128> {
        let (grid_count, owner) = {
            let position = self.positions.require_active(id)?;
            (position.grid_count, position.owner.clone())
        };
        if grid_index >= grid_count {
            return Err(EngineError::OutOfRange {
                index: grid_index,
                grid_count,
            });
        }
        self.access.authorize_execution(caller, &owner)?;

        // Validate every arithmetic step before committing any of them.
        let volume = spent
            .checked_add(received)
            .ok_or(EngineError::ArithmeticOverflow)?;
        let slot_total = self.fills.prepare(id, grid_index, volume)?;
        let new_balance = self.positions.apply_fill(id, spent, received)?;
        self.fills.commit(id, grid_index, slot_total);

        info!(
            position_id = id,
            grid_index,
            spent,
            received,
            price,
            balance = new_balance,
            caller = %caller,
            "Recorded fill"
        );
        Ok(new_balance)
    }

    // ---- execution --------------------------------------------------------

    /// Move `amount_in` of `asset_in` to the execution backend, invoke the
    /// swap, and pull the proceeds back into system custody. Does not record
    /// a fill; the caller (or [`auto_execute_and_record`]) does that.
    ///
    /// [`auto_execute_and_record`]: GridEngine::auto_execute_and_record
    pub async fn dispatch_execution(
        &mut self,
        id: u64,
        asset_in: &str,
        asset_out: &str,
        amount_in: u128,
        min_amount_out: u128,
        caller: &str,
    ) -> EngineResult<u128> {
        let _guard = self.entry_flag.enter()?;
        self.dispatch_inner(id, asset_in, asset_out, amount_in, min_amount_out, caller)
            .await
    }

    async fn dispatch_inner(
        &mut self,
        id: u64,
        asset_in: &str,
        asset_out: &str,
        amount_in: u128,
        min_amount_out: u128,
        caller: &str,
    ) -> EngineResult<u128> {
        let backend = self
            .backend
            .clone()
            .ok_or(EngineError::InvalidState("execution backend not configured"))?;

        let owner = {
            let position = self.positions.require_active(id)?;
            position.owner.clone()
        };
        self.access.authorize_execution(caller, &owner)?;
        if amount_in == 0 {
            return Err(EngineError::InvalidArgument("swap amount must be positive"));
        }

        self.custody
            .release(backend.account(), asset_in, amount_in)
            .await
            .map_err(EngineError::Custody)?;

        let amount_out = backend
            .execute_swap(asset_in, asset_out, amount_in, min_amount_out)
            .await
            .map_err(EngineError::Execution)?;

        self.custody
            .deposit(backend.account(), asset_out, amount_out)
            .await
            .map_err(EngineError::Custody)?;

        info!(
            position_id = id,
            asset_in = %asset_in,
            asset_out = %asset_out,
            amount_in,
            amount_out,
            caller = %caller,
            "Dispatched execution"
        );
        Ok(amount_out)
    }

    /// Dispatch a swap and record the resulting fill as one externally
    /// atomic unit: everything the recording step needs is validated before
    /// the swap leaves the engine.
    ///
    /// `received` is the swap output when `asset_out` is the position's
    /// quote asset and zero otherwise; the cross-asset mismatch is an
    /// accepted limitation, the balance tracks only the native asset.
    #[allow(clippy::too_many_arguments)]
    pub async fn auto_execute_and_record(
        &mut self,
        id: u64,
        grid_index: u32,
        asset_in: &str,
        asset_out: &str,
        amount_in: u128,
        min_amount_out: u128,
        caller: &str,
    ) -> EngineResult<u128> {
        let _guard = self.entry_flag.enter()?;

        let (grid_count, owner, asset, balance) = {
            let position = self.positions.require_active(id)?;
            (
                position.grid_count,
                position.owner.clone(),
                position.asset.clone(),
                position.balance,
            )
        };
        if grid_index >= grid_count {
            return Err(EngineError::OutOfRange {
                index: grid_index,
                grid_count,
            });
        }
        self.access.authorize_execution(caller, &owner)?;

        // Worst-case balance check under the backend's min-out guarantee, so
        // the fill cannot underflow after the swap has already executed.
        let min_received = if asset_out == asset { min_amount_out } else { 0 };
        if amount_in > min_received && balance < amount_in - min_received {
            return Err(EngineError::ArithmeticUnderflow);
        }

        let amount_out = self
            .dispatch_inner(id, asset_in, asset_out, amount_in, min_amount_out, caller)
            .await?;

        let received = if asset_out == asset { amount_out } else { 0 };
        let price = if received > 0 {
            math::mul_div(received, math::PRICE_SCALE, amount_in)?
        } else {
            0
        };
        self.record_fill_inner(id, grid_index, amount_in, received, price, caller)?;
        Ok(amount_out)
    }

    /// Move held funds out of system custody, bypassing position accounting.
    /// Admin-only recovery tool.
    pub async fn emergency_sweep(
        &mut self,
        asset: &str,
        amount: u128,
        destination: &str,
        caller: &str,
    ) -> EngineResult<()> {
        let _guard = self.entry_flag.enter()?;
        self.access.require_admin(caller)?;

        self.custody
            .release(destination, asset, amount)
            .await
            .map_err(EngineError::Custody)?;

        warn!(
            asset = %asset,
            amount,
            destination = %destination,
            caller = %caller,
            "Emergency sweep executed"
        );
        Ok(())
    }

    // ---- estimation (read-only) ------------------------------------------

    /// Theoretical round-trip profit over the position's own grid, funded
    /// with its current balance.
    pub fn estimate_position_profit(&self, id: u64) -> EngineResult<u128> {
        let position = self.positions.require_active(id)?;
        math::estimate_grid_profit(
            position.lower_price,
            position.upper_price,
            position.grid_count,
            position.balance,
        )
    }

    /// Derive a symmetric grid around the oracle price and estimate profit
    /// over it with the position's grid count and balance. Pure composition;
    /// no mutation.
    pub async fn estimate_from_oracle(&self, id: u64, spread_bps: u32) -> EngineResult<u128> {
        let oracle = self
            .oracle
            .clone()
            .ok_or(EngineError::InvalidState("price oracle not configured"))?;
        let position = self.positions.require_active(id)?;

        let price = oracle
            .get_price(&position.asset)
            .await
            .map_err(EngineError::Oracle)?;
        let (lower, upper) = math::symmetric_grid(price, spread_bps)?;
        math::estimate_grid_profit(lower, upper, position.grid_count, position.balance)
    }

    // ---- reads ------------------------------------------------------------

    pub fn position(&self, id: u64) -> Option<&Position> {
        self.positions.get(id)
    }

    /// All positions created by `owner`, in creation order. Empty for
    /// unknown owners.
    pub fn positions_for_owner(&self, owner: &str) -> Vec<&Position> {
        self.positions
            .ids_for_owner(owner)
            .iter()
            .filter_map(|id| self.positions.get(*id))
            .collect()
    }

    /// Accumulated volume recorded against one grid slot.
    pub fn grid_volume(&self, id: u64, grid_index: u32) -> u128 {
        self.fills.grid_volume(id, grid_index)
    }

    /// Aggregate statistics across all positions.
    pub fn stats(&self) -> EngineStats {
        let mut active_positions = 0usize;
        let mut total_fills = 0u64;
        let mut recorded_volume = 0u128;
        let mut active_balances: HashMap<String, u128> = HashMap::new();

        for position in self.positions.iter() {
            total_fills += position.fill_count;
            recorded_volume = recorded_volume.saturating_add(self.fills.position_volume(position.id));
            if position.active {
                active_positions += 1;
                let entry = active_balances.entry(position.asset.clone()).or_insert(0);
                *entry = entry.saturating_add(position.balance);
            }
        }

        EngineStats {
            total_positions: self.positions.len(),
            active_positions,
            total_fills,
            recorded_volume,
            active_balances,
        }
    }
}
