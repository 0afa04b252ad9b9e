//! External collaborators at the engine boundary.
//!
//! The engine core never talks to a price feed, router, or custody system
//! directly; it goes through the trait contracts defined here. `mock`
//! provides deterministic in-memory implementations for tests and the
//! simulation CLI.

pub mod mock;
mod traits;

pub use mock::{MockCustody, MockDexRouter, MockOracle, SYSTEM_ACCOUNT};
pub use traits::{CustodyLedger, ExecutionBackend, PriceOracle};

#[cfg(test)]
pub(crate) use traits::{MockCustodyLedger, MockExecutionBackend, MockPriceOracle};
