//! Rupiah formatting

use rust_decimal::{Decimal, RoundingStrategy};

/// Format an amount as Indonesian Rupiah, e.g. `Rp 50.000`.
///
/// Amounts are rounded to whole rupiah, half away from zero.
pub fn format_rupiah(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let digits = rounded.abs().trunc().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    if negative {
        format!("-Rp {}", grouped)
    } else {
        format!("Rp {}", grouped)
    }
}

/// Amount as whole rupiah for payment gateways that take integers
pub fn to_whole_rupiah(amount: Decimal) -> i64 {
    use rust_decimal::prelude::ToPrimitive;
    amount
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_format_rupiah() {
        assert_eq!(format_rupiah(Decimal::ZERO), "Rp 0");
        assert_eq!(format_rupiah(Decimal::from(500)), "Rp 500");
        assert_eq!(format_rupiah(Decimal::from(50_000)), "Rp 50.000");
        assert_eq!(format_rupiah(Decimal::from(1_250_000)), "Rp 1.250.000");
        assert_eq!(format_rupiah(Decimal::from_str("12500.5").unwrap()), "Rp 12.501");
        assert_eq!(format_rupiah(Decimal::from(-2000)), "-Rp 2.000");
    }

    #[test]
    fn test_to_whole_rupiah() {
        assert_eq!(to_whole_rupiah(Decimal::from(100_000)), 100_000);
        assert_eq!(to_whole_rupiah(Decimal::from_str("99.5").unwrap()), 100);
    }
}
