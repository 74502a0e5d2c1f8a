//! Chain composition properties.

use llm_dispatch_ratelimit::{LimiterChain, LimiterKind, LimiterSpec};
use proptest::prelude::*;
use std::time::Duration;
use tokio::runtime::Runtime;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    /// Property: after every acquire is matched by a release, no request
    /// is in flight and every concurrency permit is back.
    #[test]
    fn acquires_and_releases_balance(
        concurrency in 1u64..=8,
        requests in prop::collection::vec((0u64..=100, 0u64..=100), 1..=20),
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            // Budgets sized so no acquire ever waits.
            let chain = LimiterChain::new(
                "m",
                &[
                    LimiterSpec::rpm(1_000).with_window(Duration::from_secs(3_600)),
                    LimiterSpec::tpm(1_000_000).with_window(Duration::from_secs(3_600)),
                    LimiterSpec::concurrent(concurrency),
                ],
            )
            .unwrap();

            let mut expected_tokens = 0u64;
            for (i, (input, output)) in requests.iter().enumerate() {
                let id = format!("r{i}");
                chain.acquire_all(&id, *input, *output).await.unwrap();
                expected_tokens += input + output;
                chain.release_all(&id);
            }

            prop_assert_eq!(chain.in_flight(), 0);
            let snapshot = chain.snapshot();
            prop_assert_eq!(snapshot[0].usage, requests.len() as u64);
            prop_assert_eq!(snapshot[1].usage, expected_tokens);
            prop_assert_eq!(snapshot[2].usage, 0);
            prop_assert_eq!(snapshot[2].kind, LimiterKind::Concurrent);
            Ok(())
        })?;
    }

    /// Property: a request never observes partial admission from outside;
    /// if any member cannot ever admit it, no member retains its cost.
    #[test]
    fn impossible_requests_leave_no_trace(
        input in 101u64..=10_000,
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let chain = LimiterChain::new(
                "m",
                &[
                    LimiterSpec::tpm(1_000_000),
                    LimiterSpec::itpm(100), // input alone can exceed this
                ],
            )
            .unwrap();

            let result = chain.acquire_all("r", input, 0).await;
            prop_assert!(result.is_err());

            let snapshot = chain.snapshot();
            prop_assert_eq!(snapshot[0].usage, 0);
            prop_assert_eq!(snapshot[1].usage, 0);
            prop_assert_eq!(chain.in_flight(), 0);
            Ok(())
        })?;
    }
}
