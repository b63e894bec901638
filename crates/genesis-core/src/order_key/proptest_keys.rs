//! Property-based tests for order key generation.
//!
//! These check the ordering guarantees callers rely on: generated keys land
//! strictly inside their bounds, batches are strictly increasing, and
//! `compare` is a total order.

use proptest::prelude::*;
use std::cmp::Ordering;

use super::OrderKey;

/// Strategy for canonical non-zero keys up to six digits long.
fn key_strategy() -> impl Strategy<Value = OrderKey> {
    (prop::collection::vec(any::<u8>(), 0..5), 1u8..=255).prop_map(|(mut digits, last)| {
        digits.push(last);
        OrderKey::from_parts(digits.len(), digits).unwrap()
    })
}

/// Strategy for two distinct keys, returned low first.
fn ordered_pair() -> impl Strategy<Value = (OrderKey, OrderKey)> {
    (key_strategy(), key_strategy())
        .prop_filter("bounds must differ", |(a, b)| a != b)
        .prop_map(|(a, b)| if a < b { (a, b) } else { (b, a) })
}

proptest! {
    /// Property: single() lands strictly between its bounds.
    #[test]
    fn prop_single_between_bounds((low, high) in ordered_pair()) {
        let key = OrderKey::single(Some(&low), Some(&high));
        prop_assert_eq!(OrderKey::compare(&low, &key), Ordering::Less);
        prop_assert_eq!(OrderKey::compare(&key, &high), Ordering::Less);
    }

    /// Property: one-sided requests respect the bound they were given.
    #[test]
    fn prop_single_unbounded_sides(bound in key_strategy()) {
        let above = OrderKey::single(Some(&bound), None);
        prop_assert!(bound < above);

        let below = OrderKey::single(None, Some(&bound));
        prop_assert!(below < bound);
        prop_assert!(!below.is_zero());
    }

    /// Property: multi() is strictly increasing and inside its bounds.
    #[test]
    fn prop_multi_strictly_increasing(
        (low, high) in ordered_pair(),
        count in 1usize..300,
    ) {
        let mut out = Vec::new();
        OrderKey::multi(&mut out, Some(&low), Some(&high), count);

        prop_assert_eq!(out.len(), count);
        prop_assert!(low < out[0]);
        prop_assert!(out[count - 1] < high);
        for pair in out.windows(2) {
            prop_assert!(pair[0] < pair[1]);
        }
    }

    /// Property: batch keys grow by at most log256(count + 1) digits.
    #[test]
    fn prop_multi_growth_bounded(
        (low, high) in ordered_pair(),
        count in 1usize..2000,
    ) {
        let mut out = Vec::new();
        OrderKey::multi(&mut out, Some(&low), Some(&high), count);

        let base = low.magnitude().max(high.magnitude());
        let extra = if count < 256 { 1 } else { 2 };
        prop_assert!(out.iter().all(|key| key.magnitude() <= base + extra));
    }

    /// Property: compare is reflexive, antisymmetric and transitive.
    #[test]
    fn prop_compare_total_order(
        a in key_strategy(),
        b in key_strategy(),
        c in key_strategy(),
    ) {
        prop_assert_eq!(OrderKey::compare(&a, &a), Ordering::Equal);
        prop_assert_eq!(OrderKey::compare(&a, &b), OrderKey::compare(&b, &a).reverse());
        if a <= b && b <= c {
            prop_assert!(a <= c);
        }
    }
}
