//! Token-window reservation properties.

use llm_dispatch_ratelimit::{LimiterKind, TokenWindow};
use proptest::prelude::*;
use std::time::Duration;

fn window(limit: u64) -> TokenWindow {
    TokenWindow::new(LimiterKind::Tpm, limit, Duration::from_secs(3_600)).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: live usage is exactly the sum of admitted reservations,
    /// and never exceeds the limit while no reservation is adjusted.
    #[test]
    fn usage_is_the_sum_of_admitted_costs(
        limit in 100u64..=10_000,
        costs in prop::collection::vec(0u64..=500, 1..=50),
    ) {
        let window = window(limit);

        let mut admitted_sum = 0u64;
        for (i, cost) in costs.iter().enumerate() {
            if *cost <= limit && window.try_reserve(&format!("r{i}"), *cost).is_ok() {
                admitted_sum += cost;
            }
        }

        prop_assert_eq!(window.usage(), admitted_sum);
        prop_assert!(window.usage() <= limit || admitted_sum == 0);
    }

    /// Property: reconciling a reservation any number of times leaves the
    /// window at the last value, independent of the adjustment sequence.
    #[test]
    fn reconcile_converges_to_the_last_value(
        initial in 0u64..=1_000,
        adjustments in prop::collection::vec(0u64..=2_000, 1..=10),
    ) {
        let window = window(10_000);
        window.try_reserve("r", initial).unwrap();

        for value in &adjustments {
            prop_assert!(window.adjust("r", *value));
        }

        // Unwrap is fine: the vec strategy is non-empty.
        prop_assert_eq!(window.usage(), *adjustments.last().unwrap());
    }

    /// Property: revoking after any adjustment sequence empties the window.
    #[test]
    fn revoke_always_restores_full_capacity(
        initial in 0u64..=1_000,
        adjustments in prop::collection::vec(0u64..=2_000, 0..=5),
    ) {
        let limit = 10_000;
        let window = window(limit);
        window.try_reserve("r", initial).unwrap();
        for value in &adjustments {
            window.adjust("r", *value);
        }

        window.revoke("r");
        prop_assert_eq!(window.usage(), 0);
        prop_assert_eq!(window.capacity(), limit);
    }
}
