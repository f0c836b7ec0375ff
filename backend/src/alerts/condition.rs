use rust_decimal::Decimal;

use super::model::ConditionType;
use crate::pricing::model::percentage_change;

/// Whether an alert with `condition`/`threshold` fires at `latest`.
///
/// `baseline` is only consulted for `PercentChange`, which fires when the
/// absolute move from the baseline reaches the threshold. Without a usable
/// baseline a percent alert never fires.
pub fn evaluate(
    condition: ConditionType,
    threshold: Decimal,
    latest: Decimal,
    baseline: Option<Decimal>,
) -> bool {
    match condition {
        ConditionType::PriceAbove => latest > threshold,
        ConditionType::PriceBelow => latest < threshold,
        ConditionType::PercentChange => baseline
            .and_then(|base| percentage_change(latest, base))
            .is_some_and(|pct| pct.abs() >= threshold),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(v: i64, scale: u32) -> Decimal {
        Decimal::new(v, scale)
    }

    #[test]
    fn price_above_is_strict() {
        let t = d(100, 0);
        assert!(evaluate(ConditionType::PriceAbove, t, d(101, 0), None));
        assert!(!evaluate(ConditionType::PriceAbove, t, d(99, 0), None));
        assert!(!evaluate(ConditionType::PriceAbove, t, d(100, 0), None));
    }

    #[test]
    fn price_below_is_strict() {
        let t = d(18000, 2);
        assert!(evaluate(ConditionType::PriceBelow, t, d(17550, 2), None));
        assert!(!evaluate(ConditionType::PriceBelow, t, d(180, 0), None));
    }

    #[test]
    fn percent_change_needs_baseline() {
        let t = d(5, 0);
        assert!(!evaluate(ConditionType::PercentChange, t, d(200, 0), None));
        assert!(!evaluate(ConditionType::PercentChange, t, d(200, 0), Some(Decimal::ZERO)));
    }

    #[test]
    fn percent_change_fires_in_both_directions() {
        let t = d(5, 0);
        let base = Some(d(100, 0));
        assert!(evaluate(ConditionType::PercentChange, t, d(105, 0), base));
        assert!(evaluate(ConditionType::PercentChange, t, d(95, 0), base));
        assert!(!evaluate(ConditionType::PercentChange, t, d(10499, 2), base));
    }

    proptest! {
        #[test]
        fn above_and_below_never_both_fire(price in 1i64..10_000_000, threshold in 1i64..10_000_000) {
            let p = d(price, 2);
            let t = d(threshold, 2);
            let above = evaluate(ConditionType::PriceAbove, t, p, None);
            let below = evaluate(ConditionType::PriceBelow, t, p, None);
            prop_assert!(!(above && below));
            prop_assert_eq!(above || below, p != t);
        }

        #[test]
        fn percent_change_is_total_over_positive_decimals(
            latest in (1u64.., 0u32..=28).prop_map(|(m, s)| Decimal::from_i128_with_scale(i128::from(m), s)),
            base in (1u64.., 0u32..=28).prop_map(|(m, s)| Decimal::from_i128_with_scale(i128::from(m), s)),
            threshold in 1i64..=100,
        ) {
            let fired = evaluate(ConditionType::PercentChange, d(threshold, 0), latest, Some(base));
            if latest == base {
                prop_assert!(!fired);
            }
        }

        #[test]
        fn percent_change_survives_range_extremes(scale in 0u32..=28, threshold in 1i64..=100) {
            let tiny = Decimal::new(1, scale);
            let t = d(threshold, 0);
            // Unrepresentable upward move: no usable baseline.
            prop_assert!(!evaluate(ConditionType::PercentChange, t, Decimal::MAX, Some(tiny)));
            prop_assert!(!evaluate(ConditionType::PercentChange, t, tiny, Some(tiny)));
            // A collapse to almost nothing is a -100% move.
            prop_assert!(evaluate(ConditionType::PercentChange, t, tiny, Some(Decimal::MAX)));
        }

        #[test]
        fn price_conditions_ignore_baseline(price in 1i64..1_000_000, base in 1i64..1_000_000) {
            let p = d(price, 2);
            let t = d(50_000, 2);
            prop_assert_eq!(
                evaluate(ConditionType::PriceAbove, t, p, Some(d(base, 2))),
                evaluate(ConditionType::PriceAbove, t, p, None)
            );
        }
    }
}
