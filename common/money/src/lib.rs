use bigdecimal::{BigDecimal, Signed, ToPrimitive, Zero};
use thiserror::Error;

/// Share of revenue booked as operating expenses on the dashboard.
pub const EXPENSE_RATE: f64 = 0.5;
/// Flat share of revenue booked as other costs on the dashboard.
pub const OTHER_COSTS_RATE: f64 = 0.1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("amount must not be negative: {0}")]
    Negative(String),
}

/// Normalize a monetary value to 2 decimal places (extra digits are truncated).
pub fn normalize_scale(value: &BigDecimal) -> BigDecimal {
    value.with_scale(2)
}

/// Reject negative amounts, returning the normalized value otherwise.
pub fn non_negative(value: &BigDecimal) -> Result<BigDecimal, MoneyError> {
    if value.is_negative() {
        return Err(MoneyError::Negative(value.to_string()));
    }
    Ok(normalize_scale(value))
}

/// Lossy conversion used for reporting figures. Unrepresentable values read as zero.
pub fn to_f64(value: &BigDecimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Round to the nearest integer with ties going towards positive infinity
/// (`-2.5` becomes `-2`, `2.5` becomes `3`).
pub fn round_half_up(value: f64) -> f64 {
    // `value + 0.5` can itself round up, so compare the exact fraction instead.
    let floor = value.floor();
    if value - floor >= 0.5 {
        floor + 1.0
    } else {
        floor
    }
}

/// Revenue minus fixed-rate expenses and other costs, rounded to a whole unit.
pub fn net_profit(revenue: f64) -> f64 {
    let expenses = revenue * EXPENSE_RATE;
    let other_costs = revenue * OTHER_COSTS_RATE;
    round_half_up(revenue - (expenses + other_costs))
}

/// Sum a set of line amounts (`price * quantity`) into a normalized total.
pub fn line_total<'a, I>(lines: I) -> BigDecimal
where
    I: IntoIterator<Item = (&'a BigDecimal, i32)>,
{
    let total = lines
        .into_iter()
        .fold(BigDecimal::zero(), |acc, (price, quantity)| {
            acc + price * BigDecimal::from(quantity)
        });
    normalize_scale(&total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_normalize() {
        let v = BigDecimal::parse_bytes(b"12.3456", 10).unwrap();
        assert_eq!(normalize_scale(&v).to_string(), "12.34");
    }

    #[test]
    fn net_profit_of_thousand_is_four_hundred() {
        assert_eq!(net_profit(1000.0), 400.0);
    }

    #[test]
    fn net_profit_of_zero_is_zero() {
        assert_eq!(net_profit(0.0), 0.0);
    }

    #[test]
    fn net_profit_rounds_half_up() {
        // 0.4 * 1001.25 = 400.5
        assert_eq!(net_profit(1001.25), 401.0);
        assert_eq!(round_half_up(-2.5), -2.0);
        assert_eq!(round_half_up(2.4), 2.0);
    }

    #[test]
    fn negative_amount_rejected() {
        let v = BigDecimal::from_str("-0.01").unwrap();
        assert!(matches!(non_negative(&v), Err(MoneyError::Negative(_))));
        let ok = BigDecimal::from_str("15").unwrap();
        assert_eq!(non_negative(&ok).unwrap().to_string(), "15.00");
    }

    #[test]
    fn line_total_multiplies_quantities() {
        let a = BigDecimal::from_str("12.50").unwrap();
        let b = BigDecimal::from_str("3").unwrap();
        let total = line_total([(&a, 2), (&b, 3)]);
        assert_eq!(total.to_string(), "34.00");
    }

    #[test]
    fn round_half_up_handles_values_just_below_half() {
        let just_below = 0.49999999999999994_f64;
        assert_eq!(round_half_up(just_below), 0.0);
        assert_eq!(round_half_up(-just_below), 0.0);
        assert_eq!(round_half_up(0.5), 1.0);
        assert_eq!(round_half_up(-0.5), 0.0);
    }
}
