//! Configuration management for the grid engine CLI.
//!
//! Loads settings from environment variables and config files.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Engine bootstrap and delegation settings
    #[serde(default)]
    pub engine: EngineSettings,
    /// Default grid geometry
    #[serde(default)]
    pub grid: GridSettings,
    /// Mock-adapter simulation parameters
    #[serde(default)]
    pub simulation: SimulationSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Identity bootstrapped with admin and keeper capabilities
    #[serde(default = "default_admin")]
    pub admin: String,
    /// Identities granted the keeper capability at startup
    #[serde(default)]
    pub keepers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSettings {
    /// Number of equal steps a position's range is divided into
    #[serde(default = "default_grid_count")]
    pub grid_count: u32,
    /// Symmetric spread around the oracle price, in basis points
    #[serde(default = "default_spread_bps")]
    pub spread_bps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSettings {
    /// Quote asset positions are denominated in
    #[serde(default = "default_asset")]
    pub asset: String,
    /// Asset on the other side of simulated swaps
    #[serde(default = "default_counter_asset")]
    pub counter_asset: String,
    /// Identity that owns the simulated position
    #[serde(default = "default_trader")]
    pub trader: String,
    /// Deposit backing the simulated position, in quote-asset units
    #[serde(default = "default_deposit")]
    pub deposit: Decimal,
    /// Mock oracle price for the quote asset
    #[serde(default = "default_oracle_price")]
    pub oracle_price: Decimal,
    /// Mock router taker fee in basis points
    #[serde(default = "default_swap_fee_bps")]
    pub swap_fee_bps: u32,
    /// Round-trip executions to drive per run
    #[serde(default = "default_rounds")]
    pub rounds: u32,
}

// Default value functions
fn default_admin() -> String {
    "operator".to_string()
}

fn default_grid_count() -> u32 {
    10
}

fn default_spread_bps() -> u32 {
    500 // 5% either side of the oracle price
}

fn default_asset() -> String {
    "USDC".to_string()
}

fn default_counter_asset() -> String {
    "ETH".to_string()
}

fn default_trader() -> String {
    "trader".to_string()
}

fn default_deposit() -> Decimal {
    Decimal::new(10_000, 0)
}

fn default_oracle_price() -> Decimal {
    Decimal::new(2_000, 0)
}

fn default_swap_fee_bps() -> u32 {
    30 // 0.3% taker fee
}

fn default_rounds() -> u32 {
    3
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default().separator("__").prefix("GRID"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.engine.admin.is_empty(), "engine.admin must be set");

        anyhow::ensure!(self.grid.grid_count > 0, "grid_count must be positive");

        anyhow::ensure!(
            self.grid.spread_bps <= 10_000,
            "spread_bps must not exceed 10000"
        );

        anyhow::ensure!(
            self.simulation.deposit > Decimal::ZERO,
            "simulation deposit must be positive"
        );

        anyhow::ensure!(
            self.simulation.oracle_price > Decimal::ZERO,
            "simulation oracle price must be positive"
        );

        anyhow::ensure!(
            self.simulation.swap_fee_bps < 10_000,
            "swap_fee_bps must be below 10000"
        );

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineSettings::default(),
            grid: GridSettings::default(),
            simulation: SimulationSettings::default(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            admin: default_admin(),
            keepers: Vec::new(),
        }
    }
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            grid_count: default_grid_count(),
            spread_bps: default_spread_bps(),
        }
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            asset: default_asset(),
            counter_asset: default_counter_asset(),
            trader: default_trader(),
            deposit: default_deposit(),
            oracle_price: default_oracle_price(),
            swap_fee_bps: default_swap_fee_bps(),
            rounds: default_rounds(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.grid.grid_count, 10);
        assert_eq!(config.engine.admin, "operator");
    }

    #[test]
    fn validate_rejects_bad_geometry() {
        let mut config = Config::default();
        config.grid.grid_count = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.grid.spread_bps = 10_001;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.simulation.deposit = Decimal::ZERO;
        assert!(config.validate().is_err());
    }
}
