//! Utility functions and helpers

use rust_decimal::Decimal;

/// Format amount with proper decimals
pub fn format_amount(amount: u128, decimals: u8) -> String {
    // Past 10^38 every u128 is a pure fraction.
    let (whole, frac) = match 10u128.checked_pow(decimals as u32) {
        Some(scale) => (amount / scale, amount % scale),
        None => (0, amount),
    };
    if decimals == 0 {
        return whole.to_string();
    }
    let frac = format!("{:0width$}", frac, width = decimals as usize);
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, frac)
    }
}

// Keeps `delta * 100` inside Decimal's 96-bit mantissa.
const MAX_EXACT_AMOUNT: u128 = 10u128.pow(26);

/// Signed percentage change from `old_value` to `new_value`.
/// Zero when there is no old value to compare against.
pub fn calculate_percentage_change(old_value: u128, new_value: u128) -> Decimal {
    if old_value == 0 {
        return Decimal::ZERO;
    }

    // Only the base is shifted; a small delta keeps its digits as decimal places.
    let mut shift = 0u32;
    let mut base = old_value;
    while base > MAX_EXACT_AMOUNT {
        base /= 10;
        shift += 1;
    }

    let delta = old_value.abs_diff(new_value);
    let delta = if delta <= MAX_EXACT_AMOUNT {
        Some(Decimal::from_i128_with_scale(delta as i128, shift))
    } else {
        i128::try_from(delta / 10u128.pow(shift))
            .ok()
            .and_then(|d| Decimal::try_from_i128_with_scale(d, 0).ok())
    };

    // Only gains can leave the representable range; those saturate.
    let percent = delta
        .and_then(|d| d.checked_mul(Decimal::ONE_HUNDRED))
        .and_then(|d| d.checked_div(Decimal::from_i128_with_scale(base as i128, 0)))
        .unwrap_or(Decimal::MAX);
    if new_value < old_value {
        -percent
    } else {
        percent
    }
}

/// Generate unique ID
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(1_500_000, 6), "1.5");
        assert_eq!(format_amount(1_000_000_000, 9), "1");
        assert_eq!(format_amount(42, 0), "42");
        assert_eq!(format_amount(1, 18), "0.000000000000000001");
        assert_eq!(format_amount(5, 40), "0.0000000000000000000000000000000000000005");
        assert_eq!(format_amount(u128::MAX, 255).len(), 257);
    }

    #[test]
    fn test_percentage_change() {
        assert_eq!(calculate_percentage_change(1000, 980), Decimal::new(-2, 0));
        assert_eq!(calculate_percentage_change(1000, 1010), Decimal::new(1, 0));
        assert_eq!(calculate_percentage_change(0, 10), Decimal::ZERO);
    }

    #[test]
    fn test_percentage_change_keeps_small_deltas_on_large_amounts() {
        let old = 10u128.pow(27) + 9;
        let change = calculate_percentage_change(old, 10u128.pow(27));
        assert!(change < Decimal::ZERO);

        let rise = calculate_percentage_change(10u128.pow(29), 10u128.pow(29) + 1);
        assert!(rise > Decimal::ZERO);
        assert_eq!(calculate_percentage_change(1, u128::MAX), Decimal::MAX);

        assert_eq!(calculate_percentage_change(u128::MAX, u128::MAX / 2).round_dp(6), Decimal::new(-50, 0));
    }
}
