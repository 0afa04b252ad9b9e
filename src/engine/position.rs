//! Position records and lifecycle.
//!
//! The store is the single owner of `Position` records: balances and the
//! active flag are only ever mutated through it. Ids are assigned
//! monotonically starting at 1 and never reused.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;

use super::error::{EngineError, EngineResult};

/// A user's grid-trading commitment.
#[derive(Debug, Clone, Serialize)]
pub struct Position {
    pub id: u64,
    /// Identity that created the position; the only identity allowed to
    /// close it.
    pub owner: String,
    /// Quote asset the balance is denominated in.
    pub asset: String,
    /// Scaled lower price bound, exclusive of zero.
    pub lower_price: u128,
    /// Scaled upper price bound, strictly above `lower_price`.
    pub upper_price: u128,
    /// Number of equal steps the range is divided into.
    pub grid_count: u32,
    /// Quote-asset units attributed to the position. Mutated only by
    /// recorded fills; meaningless once the position is inactive.
    pub balance: u128,
    pub active: bool,
    /// Fills recorded against this position over its life.
    pub fill_count: u64,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// Owner, asset, and releasable balance of a just-closed position.
#[derive(Debug, Clone)]
pub struct ClosedPosition {
    pub owner: String,
    pub asset: String,
    pub amount: u128,
}

/// Owns all position records and the per-owner index.
#[derive(Debug, Default)]
pub struct PositionStore {
    positions: HashMap<u64, Position>,
    owner_index: HashMap<String, Vec<u64>>,
    next_id: u64,
}

impl PositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate creation parameters without touching any state. The engine
    /// runs this before the custody deposit so that `open` cannot fail once
    /// funds have moved.
    pub fn validate_params(
        asset: &str,
        lower_price: u128,
        upper_price: u128,
        grid_count: u32,
        amount: u128,
    ) -> EngineResult<()> {
        if asset.is_empty() {
            return Err(EngineError::InvalidArgument("asset must be non-empty"));
        }
        if grid_count == 0 {
            return Err(EngineError::InvalidArgument("grid count must be positive"));
        }
        if lower_price == 0 || upper_price <= lower_price {
            return Err(EngineError::InvalidArgument(
                "price bounds must satisfy 0 < lower < upper",
            ));
        }
        if amount == 0 {
            return Err(EngineError::InvalidArgument("amount must be positive"));
        }
        Ok(())
    }

    /// Create a position funded with `amount`. The caller must already have
    /// moved `amount` of `asset` into system custody; deposit and record
    /// creation are composed as one atomic unit by the engine.
    pub fn open(
        &mut self,
        owner: &str,
        asset: &str,
        lower_price: u128,
        upper_price: u128,
        grid_count: u32,
        amount: u128,
    ) -> EngineResult<u64> {
        Self::validate_params(asset, lower_price, upper_price, grid_count, amount)?;

        self.next_id += 1;
        let id = self.next_id;

        self.positions.insert(
            id,
            Position {
                id,
                owner: owner.to_string(),
                asset: asset.to_string(),
                lower_price,
                upper_price,
                grid_count,
                balance: amount,
                active: true,
                fill_count: 0,
                opened_at: Utc::now(),
                closed_at: None,
            },
        );
        self.owner_index.entry(owner.to_string()).or_default().push(id);

        info!(
            position_id = id,
            owner = %owner,
            asset = %asset,
            grid_count,
            "Opened position"
        );
        Ok(id)
    }

    /// Close a position. Irreversible: the record stays for auditing but can
    /// never be re-activated or re-filled. Returns what custody must release
    /// back to the owner.
    pub fn close(&mut self, id: u64, caller: &str) -> EngineResult<ClosedPosition> {
        let position = self.positions.get_mut(&id).ok_or(EngineError::NotFound(id))?;
        if !position.active {
            return Err(EngineError::InvalidState("position is closed"));
        }
        if position.owner != caller {
            return Err(EngineError::Unauthorized(caller.to_string()));
        }

        position.active = false;
        position.closed_at = Some(Utc::now());

        info!(
            position_id = id,
            owner = %position.owner,
            released = position.balance,
            fills = position.fill_count,
            "Closed position"
        );
        Ok(ClosedPosition {
            owner: position.owner.clone(),
            asset: position.asset.clone(),
            amount: position.balance,
        })
    }

    pub fn get(&self, id: u64) -> Option<&Position> {
        self.positions.get(&id)
    }

    /// Lookup that fails with `NotFound` for unknown ids.
    pub fn require(&self, id: u64) -> EngineResult<&Position> {
        self.positions.get(&id).ok_or(EngineError::NotFound(id))
    }

    /// Lookup that additionally requires the position to be active.
    pub fn require_active(&self, id: u64) -> EngineResult<&Position> {
        let position = self.require(id)?;
        if !position.active {
            return Err(EngineError::InvalidState("position is closed"));
        }
        Ok(position)
    }

    /// Apply a fill's net effect to a position balance. The new balance is
    /// computed before anything is written, so a failing fill commits
    /// nothing. The balance may legitimately fall below the original
    /// deposit, but never below zero.
    pub fn apply_fill(&mut self, id: u64, spent: u128, received: u128) -> EngineResult<u128> {
        let position = self
            .positions
            .get_mut(&id)
            .ok_or(EngineError::NotFound(id))?;
        if !position.active {
            return Err(EngineError::InvalidState("position is closed"));
        }

        let new_balance = if received >= spent {
            position
                .balance
                .checked_add(received - spent)
                .ok_or(EngineError::ArithmeticOverflow)?
        } else {
            position
                .balance
                .checked_sub(spent - received)
                .ok_or(EngineError::ArithmeticUnderflow)?
        };

        position.balance = new_balance;
        position.fill_count += 1;
        Ok(new_balance)
    }

    /// Ids of every position `owner` has created, in creation order. Empty
    /// for unknown owners.
    pub fn ids_for_owner(&self, owner: &str) -> &[u64] {
        self.owner_index.get(owner).map_or(&[], Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Iterate over all positions, active and closed.
    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::math::PRICE_SCALE;

    const ONE: u128 = PRICE_SCALE;

    fn open_default(store: &mut PositionStore) -> u64 {
        store
            .open("alice", "USDC", ONE, 2 * ONE, 10, 100 * ONE)
            .unwrap()
    }

    #[test]
    fn ids_are_sequential_from_one() {
        let mut store = PositionStore::new();
        assert_eq!(open_default(&mut store), 1);
        assert_eq!(open_default(&mut store), 2);
        assert_eq!(store.ids_for_owner("alice"), &[1, 2]);
    }

    #[test]
    fn open_sets_balance_and_active() {
        let mut store = PositionStore::new();
        let id = open_default(&mut store);

        let position = store.get(id).unwrap();
        assert_eq!(position.balance, 100 * ONE);
        assert!(position.active);
        assert_eq!(position.fill_count, 0);
    }

    #[test]
    fn open_validates_inputs() {
        let mut store = PositionStore::new();
        assert!(matches!(
            store.open("alice", "", ONE, 2 * ONE, 10, ONE),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            store.open("alice", "USDC", ONE, 2 * ONE, 0, ONE),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            store.open("alice", "USDC", 2 * ONE, ONE, 10, ONE),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            store.open("alice", "USDC", ONE, 2 * ONE, 10, 0),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn close_releases_balance_and_is_irreversible() {
        let mut store = PositionStore::new();
        let id = open_default(&mut store);

        let closed = store.close(id, "alice").unwrap();
        assert_eq!(closed.amount, 100 * ONE);
        assert_eq!(closed.owner, "alice");
        assert!(!store.get(id).unwrap().active);

        assert!(matches!(
            store.close(id, "alice"),
            Err(EngineError::InvalidState(_))
        ));
        assert!(matches!(
            store.apply_fill(id, ONE, 0),
            Err(EngineError::InvalidState(_))
        ));
    }

    #[test]
    fn close_checks_existence_then_owner() {
        let mut store = PositionStore::new();
        let id = open_default(&mut store);

        assert!(matches!(store.close(99, "alice"), Err(EngineError::NotFound(99))));
        assert!(matches!(
            store.close(id, "mallory"),
            Err(EngineError::Unauthorized(_))
        ));
        assert!(store.get(id).unwrap().active);
    }

    #[test]
    fn apply_fill_follows_net_balance_law() {
        let mut store = PositionStore::new();
        let id = open_default(&mut store);

        // Spend 1.0 with nothing back, then receive 2.0 for nothing.
        assert_eq!(store.apply_fill(id, ONE, 0).unwrap(), 99 * ONE);
        assert_eq!(store.apply_fill(id, 0, 2 * ONE).unwrap(), 101 * ONE);
        assert_eq!(store.get(id).unwrap().fill_count, 2);
    }

    #[test]
    fn apply_fill_fails_fast_on_underflow() {
        let mut store = PositionStore::new();
        let id = open_default(&mut store);

        assert!(matches!(
            store.apply_fill(id, 101 * ONE, 0),
            Err(EngineError::ArithmeticUnderflow)
        ));
        // Nothing committed.
        let position = store.get(id).unwrap();
        assert_eq!(position.balance, 100 * ONE);
        assert_eq!(position.fill_count, 0);
    }

    #[test]
    fn unknown_owner_has_no_positions() {
        let store = PositionStore::new();
        assert!(store.ids_for_owner("nobody").is_empty());
        assert!(store.get(1).is_none());
    }
}
