//! Grid Engine - Main Entry Point
//!
//! Operator CLI for the deterministic grid-trading core: closed-form profit
//! estimation, symmetric grid derivation, and an end-to-end simulation run
//! against the in-memory mock adapters.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use grid_engine::adapters::{
    CustodyLedger, ExecutionBackend, MockCustody, MockDexRouter, MockOracle, PriceOracle,
    SYSTEM_ACCOUNT,
};
use grid_engine::engine::{math, Capability, GridEngine};
use grid_engine::utils::scaled::{format_scaled, parse_scaled, to_scaled};
use grid_engine::Config;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Grid Engine CLI
#[derive(Parser)]
#[command(name = "grid-engine")]
#[command(version, about = "Deterministic grid-trading accounting core")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate theoretical round-trip profit over an explicit grid
    Estimate {
        /// Lower price bound (e.g. 1800)
        #[arg(short, long)]
        lower: String,

        /// Upper price bound (e.g. 2200)
        #[arg(short, long)]
        upper: String,

        /// Number of grid steps
        #[arg(short, long, default_value = "10")]
        grids: u32,

        /// Capital committed to the grid
        #[arg(short, long)]
        capital: String,
    },

    /// Derive symmetric grid bounds around a price
    Grid {
        /// Current price (e.g. 2000)
        #[arg(short, long)]
        price: String,

        /// Spread in basis points (100 = 1%)
        #[arg(short, long, default_value = "500")]
        spread_bps: u32,
    },

    /// Run an end-to-end simulation against the mock adapters
    Simulate {
        /// Round-trip executions to drive (overrides config)
        #[arg(short, long)]
        rounds: Option<u32>,
    },
}

#[derive(Serialize)]
struct SimulationSummary {
    position_id: u64,
    rounds: u32,
    deposit: String,
    estimated_profit: String,
    oracle_estimate: String,
    final_balance: String,
    recorded_volume: String,
    swaps_executed: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let cli = Cli::parse();
    match cli.command {
        Commands::Estimate {
            lower,
            upper,
            grids,
            capital,
        } => {
            let lower = parse_scaled(&lower)?;
            let upper = parse_scaled(&upper)?;
            let capital = parse_scaled(&capital)?;

            let profit = math::estimate_grid_profit(lower, upper, grids, capital)?;
            println!(
                "Estimated round-trip profit over {} grids: {}",
                grids,
                format_scaled(profit)
            );
        }

        Commands::Grid { price, spread_bps } => {
            let price = parse_scaled(&price)?;
            let (lower, upper) = math::symmetric_grid(price, spread_bps)?;
            println!(
                "Grid bounds at {} bps around {}: [{}, {}]",
                spread_bps,
                format_scaled(price),
                format_scaled(lower),
                format_scaled(upper)
            );
        }

        Commands::Simulate { rounds } => {
            let config = Config::load()?;
            config.validate()?;
            log_config(&config);

            let summary = run_simulation(&config, rounds).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}

/// Wire the engine to the mock adapters and drive keeper round trips.
async fn run_simulation(config: &Config, rounds: Option<u32>) -> Result<SimulationSummary> {
    let sim = &config.simulation;
    let rounds = rounds.unwrap_or(sim.rounds);

    let deposit = to_scaled(sim.deposit).context("deposit out of range")?;
    let price = to_scaled(sim.oracle_price).context("oracle price out of range")?;

    // Custody seeded with the trader's deposit and router-side liquidity.
    let custody = Arc::new(MockCustody::new());
    custody.fund(&sim.trader, &sim.asset, deposit).await;

    let oracle = Arc::new(MockOracle::new());
    oracle.set_price(&sim.asset, price).await;

    let router = Arc::new(MockDexRouter::new(sim.swap_fee_bps));
    let inverse_rate = math::PRICE_SCALE
        .checked_mul(math::PRICE_SCALE)
        .map(|sq| sq / price)
        .context("oracle price too small to invert")?;
    router.set_rate(&sim.asset, &sim.counter_asset, inverse_rate).await;
    router.set_rate(&sim.counter_asset, &sim.asset, price).await;
    custody.fund(router.account(), &sim.asset, deposit).await;
    let counter_liquidity =
        math::mul_div(deposit, math::PRICE_SCALE, price)?.saturating_mul(2);
    custody
        .fund(router.account(), &sim.counter_asset, counter_liquidity)
        .await;

    let admin = &config.engine.admin;
    let mut engine = GridEngine::new(admin, custody.clone() as Arc<dyn CustodyLedger>);
    for keeper in &config.engine.keepers {
        engine.grant_role(keeper, Capability::Keeper, admin)?;
    }
    engine.set_price_oracle(oracle as Arc<dyn PriceOracle>, admin)?;
    engine.set_execution_backend(router.clone() as Arc<dyn ExecutionBackend>, admin)?;

    let (lower, upper) = math::symmetric_grid(price, config.grid.spread_bps)?;
    let id = engine
        .create_position(
            &sim.trader,
            &sim.asset,
            lower,
            upper,
            config.grid.grid_count,
            deposit,
        )
        .await?;

    let estimated_profit = engine.estimate_position_profit(id)?;
    let oracle_estimate = engine.estimate_from_oracle(id, config.grid.spread_bps).await?;
    info!(
        position_id = id,
        estimated_profit = %format_scaled(estimated_profit),
        oracle_estimate = %format_scaled(oracle_estimate),
        "Opened simulated position"
    );

    let keeper = config
        .engine
        .keepers
        .first()
        .map(String::as_str)
        .unwrap_or(admin);
    let per_grid = deposit / config.grid.grid_count as u128;

    for round in 0..rounds {
        let grid_index = round % config.grid.grid_count;

        // Sell one grid's worth of quote asset, then swap the proceeds back.
        let counter_out = engine
            .auto_execute_and_record(
                id,
                grid_index,
                &sim.asset,
                &sim.counter_asset,
                per_grid,
                0,
                keeper,
            )
            .await?;
        let quote_back = engine
            .auto_execute_and_record(
                id,
                grid_index,
                &sim.counter_asset,
                &sim.asset,
                counter_out,
                0,
                keeper,
            )
            .await?;

        info!(
            round,
            grid_index,
            sold = %format_scaled(per_grid),
            bought_back = %format_scaled(quote_back),
            "Completed round trip"
        );
    }

    let stats = engine.stats();
    let final_balance = engine.close_position(id, &sim.trader).await?;
    info!(
        trader_balance = %format_scaled(custody.balance_of(&sim.trader, &sim.asset).await),
        system_residual = %format_scaled(custody.balance_of(SYSTEM_ACCOUNT, &sim.asset).await),
        "Simulation complete"
    );

    Ok(SimulationSummary {
        position_id: id,
        rounds,
        deposit: format_scaled(deposit),
        estimated_profit: format_scaled(estimated_profit),
        oracle_estimate: format_scaled(oracle_estimate),
        final_balance: format_scaled(final_balance),
        recorded_volume: format_scaled(stats.recorded_volume),
        swaps_executed: router.swap_count(),
    })
}

/// Initialize logging with file output.
fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::hourly("logs", "grid-engine.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Keep the writer guard alive for the program duration
    Box::leak(Box::new(guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("grid_engine=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .init();

    Ok(())
}

/// Log configuration on startup.
fn log_config(config: &Config) {
    info!("Configuration:");
    info!("   Admin: {}", config.engine.admin);
    info!("   Keepers: {:?}", config.engine.keepers);
    info!("   Grid Count: {}", config.grid.grid_count);
    info!("   Spread: {} bps", config.grid.spread_bps);
    info!(
        "   Simulation: {} {} @ {} ({} bps fee)",
        config.simulation.deposit,
        config.simulation.asset,
        config.simulation.oracle_price,
        config.simulation.swap_fee_bps
    );
}
