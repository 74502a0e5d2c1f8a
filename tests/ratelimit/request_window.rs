//! Rolling request-count admission.

use llm_dispatch_ratelimit::RequestWindow;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::test]
async fn admits_up_to_the_limit_without_waiting() {
    let window = RequestWindow::new(10, Duration::from_secs(1));

    let start = Instant::now();
    for _ in 0..10 {
        window.acquire().await;
    }
    assert!(start.elapsed() < Duration::from_millis(100));
    assert_eq!(window.usage(), 10);
    assert_eq!(window.capacity(), 0);
}

#[tokio::test]
async fn waits_for_the_oldest_admission_to_expire() {
    let window = RequestWindow::new(2, Duration::from_millis(100));
    window.acquire().await;
    window.acquire().await;

    let start = Instant::now();
    window.acquire().await;
    assert!(start.elapsed() >= Duration::from_millis(90));
}

#[tokio::test]
async fn window_slides_rather_than_resetting() {
    let window = RequestWindow::new(2, Duration::from_millis(100));

    window.acquire().await;
    tokio::time::sleep(Duration::from_millis(60)).await;
    window.acquire().await;

    // The first admission expires ~40ms from now; the third acquire should
    // wait for it, not for a full window reset.
    let start = Instant::now();
    window.acquire().await;
    let waited = start.elapsed();
    assert!(waited >= Duration::from_millis(30), "waited {waited:?}");
    assert!(waited < Duration::from_millis(90), "waited {waited:?}");
}

#[tokio::test]
async fn concurrent_waiters_all_eventually_admit() {
    let window = Arc::new(RequestWindow::new(2, Duration::from_millis(100)));

    let mut handles = Vec::new();
    for _ in 0..6 {
        let window = Arc::clone(&window);
        handles.push(tokio::spawn(async move {
            window.acquire().await;
        }));
    }
    for handle in handles {
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("every waiter should eventually admit")
            .unwrap();
    }
}
