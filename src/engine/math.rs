//! Pure grid arithmetic over scaled fixed-point integers.
//!
//! All prices and amounts are `u128` values scaled by [`PRICE_SCALE`], and
//! every division truncates. Intermediate products are widened through a
//! 256-bit integer so that `a * b / c` never wraps; a result that does not
//! fit back into `u128` fails with `ArithmeticOverflow` instead of wrapping.

use ethnum::U256;

use super::error::{EngineError, EngineResult};

/// System-wide fixed-point scale applied to all prices and amounts.
pub const PRICE_SCALE: u128 = 1_000_000_000_000_000_000;

/// Basis-point denominator (10_000 bps = 100%).
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Widening multiply-then-divide with truncation: `a * b / div`.
pub fn mul_div(a: u128, b: u128, div: u128) -> EngineResult<u128> {
    debug_assert!(div > 0);
    let wide = U256::from(a) * U256::from(b) / U256::from(div);
    narrow(wide)
}

/// Truncate a 256-bit intermediate back to `u128`, failing if it does not fit.
fn narrow(value: U256) -> EngineResult<u128> {
    if value > U256::from(u128::MAX) {
        return Err(EngineError::ArithmeticOverflow);
    }
    Ok(value.as_u128())
}

/// Estimate the theoretical round-trip profit of a grid.
///
/// Models allocating `capital / grid_count` to each step, buying at the
/// step's lower edge `p_i = lower + step * i` and selling one step higher,
/// so each step contributes `per_grid * step / p_i`. Steps are evaluated in
/// ascending index order with truncation at every division; the iteration
/// order is part of the function's contract because truncation makes the sum
/// order-sensitive.
pub fn estimate_grid_profit(
    lower: u128,
    upper: u128,
    grid_count: u32,
    capital: u128,
) -> EngineResult<u128> {
    if grid_count == 0 {
        return Err(EngineError::InvalidArgument("grid count must be positive"));
    }
    if lower == 0 {
        return Err(EngineError::InvalidArgument("lower price must be positive"));
    }
    if upper <= lower {
        return Err(EngineError::InvalidArgument(
            "upper price must exceed lower price",
        ));
    }
    if capital == 0 {
        return Err(EngineError::InvalidArgument("capital must be positive"));
    }

    let step = (upper - lower) / grid_count as u128;
    let per_grid = capital / grid_count as u128;

    let mut profit = U256::ZERO;
    for i in 0..grid_count {
        let price = step
            .checked_mul(i as u128)
            .and_then(|offset| lower.checked_add(offset))
            .ok_or(EngineError::ArithmeticOverflow)?;
        if price == 0 {
            continue;
        }
        profit += U256::from(per_grid) * U256::from(step) / U256::from(price);
    }

    narrow(profit)
}

/// Derive a symmetric grid of `spread_bps` around `current_price`.
///
/// Returns `(lower, upper)` where `lower = price * (10000 - bps) / 10000` and
/// `upper = price * (10000 + bps) / 10000`, truncating. A zero price is
/// rejected so a broken oracle read cannot silently produce a degenerate
/// zero-width range.
pub fn symmetric_grid(current_price: u128, spread_bps: u32) -> EngineResult<(u128, u128)> {
    if current_price == 0 {
        return Err(EngineError::InvalidArgument(
            "current price must be positive",
        ));
    }
    if spread_bps as u128 > BPS_DENOMINATOR {
        return Err(EngineError::InvalidArgument(
            "spread exceeds 10000 basis points",
        ));
    }

    let lower = mul_div(
        current_price,
        BPS_DENOMINATOR - spread_bps as u128,
        BPS_DENOMINATOR,
    )?;
    let upper = mul_div(
        current_price,
        BPS_DENOMINATOR + spread_bps as u128,
        BPS_DENOMINATOR,
    )?;
    Ok((lower, upper))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE: u128 = PRICE_SCALE;

    #[test]
    fn single_grid_price_doubling_returns_full_capital() {
        // One grid over [1.0, 2.0] with 1.0 capital: buy at 1.0, sell at 2.0.
        let profit = estimate_grid_profit(ONE, 2 * ONE, 1, ONE).unwrap();
        assert_eq!(profit, ONE);
    }

    #[test]
    fn ten_grid_estimate_matches_reference_sum() {
        // step = 0.1, per_grid = 10.0; profit_i = 10 * 0.1 / (1 + 0.1 * i),
        // truncated at every division and summed in ascending order.
        let profit = estimate_grid_profit(ONE, 2 * ONE, 10, 100 * ONE).unwrap();
        assert_eq!(profit, 7_187_714_031_754_279_427);
    }

    #[test]
    fn estimate_is_deterministic_and_non_negative() {
        let a = estimate_grid_profit(3 * ONE, 7 * ONE, 13, 55 * ONE).unwrap();
        let b = estimate_grid_profit(3 * ONE, 7 * ONE, 13, 55 * ONE).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn estimate_rejects_malformed_inputs() {
        assert!(matches!(
            estimate_grid_profit(ONE, 2 * ONE, 0, ONE),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            estimate_grid_profit(0, 2 * ONE, 1, ONE),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            estimate_grid_profit(2 * ONE, 2 * ONE, 1, ONE),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            estimate_grid_profit(ONE, 2 * ONE, 1, 0),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn estimate_survives_large_capital() {
        // per_grid * step overflows u128 without the 256-bit widening.
        let profit = estimate_grid_profit(ONE, 2 * ONE, 10, 10_000_000 * ONE);
        assert!(profit.is_ok());
    }

    #[test]
    fn zero_spread_collapses_to_the_price() {
        let price = 1234 * ONE;
        assert_eq!(symmetric_grid(price, 0).unwrap(), (price, price));
    }

    #[test]
    fn full_spread_spans_zero_to_double() {
        let price = 1234 * ONE;
        assert_eq!(symmetric_grid(price, 10_000).unwrap(), (0, 2 * price));
    }

    #[test]
    fn ten_percent_spread_around_two_thousand() {
        let (lower, upper) = symmetric_grid(2000 * ONE, 1000).unwrap();
        assert_eq!(lower, 1800 * ONE);
        assert_eq!(upper, 2200 * ONE);
    }

    #[test]
    fn symmetric_grid_rejects_zero_price_and_excess_spread() {
        assert!(matches!(
            symmetric_grid(0, 100),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            symmetric_grid(ONE, 10_001),
            Err(EngineError::InvalidArgument(_))
        ));
    }
}
