//! All-or-nothing composition across heterogeneous limiters.

use llm_dispatch_ratelimit::{LimiterChain, LimiterKind, LimiterSpec};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn standard_chain() -> LimiterChain {
    LimiterChain::new(
        "claude-sonnet",
        &[
            LimiterSpec::rpm(100),
            LimiterSpec::tpm(10_000),
            LimiterSpec::itpm(6_000),
            LimiterSpec::otpm(6_000),
            LimiterSpec::concurrent(4),
        ],
    )
    .unwrap()
}

#[tokio::test]
async fn admission_reserves_every_dimension() {
    let chain = standard_chain();
    chain.acquire_all("r1", 1_000, 500).await.unwrap();

    let by_kind: Vec<(LimiterKind, u64)> = chain
        .snapshot()
        .into_iter()
        .map(|s| (s.kind, s.usage))
        .collect();
    assert_eq!(
        by_kind,
        vec![
            (LimiterKind::Rpm, 1),
            (LimiterKind::Tpm, 1_500),
            (LimiterKind::Itpm, 1_000),
            (LimiterKind::Otpm, 500),
            (LimiterKind::Concurrent, 1),
        ]
    );
}

#[tokio::test]
async fn one_saturated_member_blocks_admission() {
    let chain = LimiterChain::new(
        "m",
        &[
            LimiterSpec::rpm(100).with_window(Duration::from_millis(100)),
            LimiterSpec::tpm(1_000).with_window(Duration::from_millis(100)),
        ],
    );
    let chain = chain.unwrap();

    // Plenty of RPM left, but the token budget is exhausted.
    chain.acquire_all("r1", 600, 400).await.unwrap();

    let start = Instant::now();
    chain.acquire_all("r2", 100, 100).await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(90));
}

#[tokio::test]
async fn acquires_and_releases_balance() {
    let chain = Arc::new(standard_chain());

    let mut handles = Vec::new();
    for i in 0..20 {
        let chain = Arc::clone(&chain);
        handles.push(tokio::spawn(async move {
            let id = format!("r{i}");
            chain.acquire_all(&id, 100, 100).await.unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
            assert!(chain.release_all(&id));
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(chain.in_flight(), 0);
    // Every concurrency permit came back.
    let concurrent = chain.snapshot().pop().unwrap();
    assert_eq!(concurrent.usage, 0);
}

#[tokio::test]
async fn reconcile_only_touches_token_members() {
    let chain = standard_chain();
    chain.acquire_all("r1", 1_000, 1_000).await.unwrap();
    chain.update_usage("r1", 10, 20);

    let snapshot = chain.snapshot();
    assert_eq!(snapshot[0].usage, 1); // rpm untouched
    assert_eq!(snapshot[1].usage, 30); // tpm
    assert_eq!(snapshot[2].usage, 10); // itpm
    assert_eq!(snapshot[3].usage, 20); // otpm
    assert_eq!(snapshot[4].usage, 1); // concurrent untouched
}

#[tokio::test]
async fn reconcile_twice_equals_once() {
    let chain = standard_chain();
    chain.acquire_all("r1", 1_000, 1_000).await.unwrap();

    chain.update_usage("r1", 300, 100);
    let first = chain.snapshot();
    chain.update_usage("r1", 300, 100);
    let second = chain.snapshot();

    for (a, b) in first.iter().zip(second.iter()) {
        assert_eq!(a.usage, b.usage);
    }
}

#[tokio::test]
async fn late_reconcile_after_release_still_adjusts_windows() {
    let chain = standard_chain();
    chain.acquire_all("r1", 2_000, 2_000).await.unwrap();
    chain.release_all("r1");

    // Late accounting: the reservation is no longer in flight but its
    // window entries have not aged out yet.
    assert!(chain.update_usage("r1", 50, 50));
    assert_eq!(chain.snapshot()[1].usage, 100);
}
