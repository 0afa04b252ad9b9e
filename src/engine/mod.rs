//! Core grid-trading engine.
//!
//! Deterministic position accounting over scaled fixed-point integers:
//! - Grid math: profit estimation and symmetric grid derivation
//! - Position lifecycle: create, fill, close
//! - Per-grid fill volume accounting
//! - Role-based authorization (admin, keeper)
//! - Adapter gateway to the custody ledger, price oracle, and execution
//!   backend

mod access;
mod error;
mod fills;
mod gateway;
pub mod math;
mod position;

pub use access::{AccessController, Capability};
pub use error::{EngineError, EngineResult};
pub use fills::FillLedger;
pub use gateway::{EngineStats, GridEngine};
pub use position::{ClosedPosition, Position, PositionStore};
