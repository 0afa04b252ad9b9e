//! Conversions between human-readable decimals and scaled fixed-point
//! integers.
//!
//! The engine works exclusively in `u128` values scaled by
//! [`PRICE_SCALE`](crate::engine::math::PRICE_SCALE); these helpers live at
//! the human boundary (config, CLI, display). Formatting uses pure integer
//! math so values beyond `Decimal`'s 96-bit mantissa still render exactly.

use anyhow::{anyhow, Context};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::engine::math::PRICE_SCALE;

/// Convert a non-negative decimal to its scaled representation, truncating
/// anything below 10^-18. Returns `None` for negative values or values too
/// large to scale.
pub fn to_scaled(value: Decimal) -> Option<u128> {
    if value.is_sign_negative() {
        return None;
    }
    let scale = Decimal::from_i128_with_scale(PRICE_SCALE as i128, 0);
    value.checked_mul(scale)?.trunc().to_u128()
}

/// Parse a human-readable decimal string (e.g. `"2000.5"`) into a scaled
/// integer.
pub fn parse_scaled(input: &str) -> anyhow::Result<u128> {
    let value = Decimal::from_str(input.trim())
        .with_context(|| format!("invalid decimal amount: {input}"))?;
    to_scaled(value).ok_or_else(|| anyhow!("amount out of range: {input}"))
}

/// Render a scaled integer as a trimmed decimal string.
pub fn format_scaled(value: u128) -> String {
    let integral = value / PRICE_SCALE;
    let fractional = value % PRICE_SCALE;
    if fractional == 0 {
        return integral.to_string();
    }
    let digits = format!("{fractional:018}");
    format!("{integral}.{}", digits.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn scales_whole_and_fractional_amounts() {
        assert_eq!(to_scaled(dec!(1)), Some(PRICE_SCALE));
        assert_eq!(to_scaled(dec!(2000.5)), Some(2_000_500_000_000_000_000_000));
        assert_eq!(to_scaled(dec!(0)), Some(0));
        assert_eq!(to_scaled(dec!(-1)), None);
    }

    #[test]
    fn parse_accepts_plain_decimal_strings() {
        assert_eq!(parse_scaled("1.5").unwrap(), 1_500_000_000_000_000_000);
        assert_eq!(parse_scaled(" 100 ").unwrap(), 100 * PRICE_SCALE);
        assert!(parse_scaled("not-a-number").is_err());
        assert!(parse_scaled("-3").is_err());
    }

    #[test]
    fn format_trims_trailing_zeros() {
        assert_eq!(format_scaled(PRICE_SCALE), "1");
        assert_eq!(format_scaled(1_500_000_000_000_000_000), "1.5");
        assert_eq!(format_scaled(1), "0.000000000000000001");
        assert_eq!(format_scaled(0), "0");
    }

    #[test]
    fn parse_and_format_round_trip() {
        let scaled = parse_scaled("1234.000000000000000001").unwrap();
        assert_eq!(format_scaled(scaled), "1234.000000000000000001");
    }
}
