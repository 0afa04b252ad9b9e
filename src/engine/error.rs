//! Typed error taxonomy for engine operations.

use thiserror::Error;

/// Errors produced by engine operations.
///
/// Every failure is synchronous and atomic: a call that returns an error has
/// committed no state change.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed numeric input: zero/inverted ranges, zero grid count,
    /// zero amount, out-of-bounds basis points.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Unknown position id.
    #[error("position {0} not found")]
    NotFound(u64),

    /// Operating on a closed position, or a required adapter is missing.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// Caller lacks the required capability or ownership relation.
    #[error("caller {0} is not authorized")]
    Unauthorized(String),

    /// Grid index at or beyond the position's grid count.
    #[error("grid index {index} out of range (grid count {grid_count})")]
    OutOfRange { index: u32, grid_count: u32 },

    /// A fill would drive the position balance below zero.
    #[error("fill would drive position balance below zero")]
    ArithmeticUnderflow,

    /// A scaled value left the representable u128 range.
    #[error("arithmetic overflow in scaled computation")]
    ArithmeticOverflow,

    /// A mutating operation re-entered the engine before the outer call
    /// completed.
    #[error("reentrant call rejected")]
    Reentrancy,

    /// The price oracle failed to produce a price.
    #[error("price oracle failure")]
    Oracle(#[source] anyhow::Error),

    /// The execution backend rejected or failed the swap.
    #[error("execution backend failure")]
    Execution(#[source] anyhow::Error),

    /// The custody ledger rejected a transfer.
    #[error("custody ledger failure")]
    Custody(#[source] anyhow::Error),
}

/// Result type for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
