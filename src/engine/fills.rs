//! Per-grid fill volume accounting.
//!
//! The ledger is the single owner of the per-(position, grid index) volume
//! accumulators: total quote-asset volume (spent + received) that has passed
//! through a grid slot over the position's life. Accumulators are monotonic
//! and purely informational; a slot may be filled any number of times.

use std::collections::HashMap;

use super::error::{EngineError, EngineResult};

/// Accumulated trade volume keyed by (position id, grid index).
#[derive(Debug, Default)]
pub struct FillLedger {
    volumes: HashMap<(u64, u32), u128>,
}

impl FillLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total volume recorded against one grid slot. Zero for untouched slots.
    pub fn grid_volume(&self, position_id: u64, grid_index: u32) -> u128 {
        self.volumes
            .get(&(position_id, grid_index))
            .copied()
            .unwrap_or(0)
    }

    /// The accumulator value a fill of `volume` would produce, without
    /// writing it. Lets the caller validate every arithmetic step of a fill
    /// before committing any of them.
    pub fn prepare(&self, position_id: u64, grid_index: u32, volume: u128) -> EngineResult<u128> {
        self.grid_volume(position_id, grid_index)
            .checked_add(volume)
            .ok_or(EngineError::ArithmeticOverflow)
    }

    /// Write an accumulator total previously computed with [`prepare`].
    ///
    /// [`prepare`]: FillLedger::prepare
    pub fn commit(&mut self, position_id: u64, grid_index: u32, total: u128) {
        self.volumes.insert((position_id, grid_index), total);
    }

    /// Total recorded volume across all grid slots of a position.
    pub fn position_volume(&self, position_id: u64) -> u128 {
        self.volumes
            .iter()
            .filter(|((id, _), _)| *id == position_id)
            .map(|(_, volume)| volume)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untouched_slots_read_zero() {
        let ledger = FillLedger::new();
        assert_eq!(ledger.grid_volume(1, 0), 0);
        assert_eq!(ledger.position_volume(1), 0);
    }

    #[test]
    fn volumes_accumulate_per_slot() {
        let mut ledger = FillLedger::new();

        let total = ledger.prepare(1, 0, 300).unwrap();
        ledger.commit(1, 0, total);
        let total = ledger.prepare(1, 0, 200).unwrap();
        ledger.commit(1, 0, total);
        let total = ledger.prepare(1, 3, 50).unwrap();
        ledger.commit(1, 3, total);

        assert_eq!(ledger.grid_volume(1, 0), 500);
        assert_eq!(ledger.grid_volume(1, 3), 50);
        assert_eq!(ledger.position_volume(1), 550);
        assert_eq!(ledger.position_volume(2), 0);
    }

    #[test]
    fn prepare_rejects_accumulator_overflow() {
        let mut ledger = FillLedger::new();
        ledger.commit(1, 0, u128::MAX);

        assert!(matches!(
            ledger.prepare(1, 0, 1),
            Err(EngineError::ArithmeticOverflow)
        ));
        // The failed prepare wrote nothing.
        assert_eq!(ledger.grid_volume(1, 0), u128::MAX);
    }
}
