//! Drain, deadline, and refusal semantics.

use llm_dispatch::{
    processor_fn, Completion, DispatchManager, ModelConfig, Request, RequestStatus,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn sleeper(delay: Duration) -> DispatchManager<u32, u32> {
    let manager = DispatchManager::new();
    manager
        .register(
            ModelConfig::new("m"),
            processor_fn(move |request: Arc<Request<u32>>| async move {
                tokio::time::sleep(delay).await;
                Ok(Completion::new(*request.params()))
            }),
        )
        .unwrap();
    manager
}

#[tokio::test]
async fn graceful_shutdown_drains_the_fifo() {
    let manager = sleeper(Duration::from_millis(10));

    let mut ids = Vec::new();
    for i in 0..5u32 {
        let request = Request::builder("m", i).fire_and_forget().build();
        ids.push(request.id().as_str().to_string());
        manager.submit(request).await.unwrap();
    }

    manager.shutdown_all(None).await;

    for (i, id) in ids.iter().enumerate() {
        let response = manager.get_status("m", id).unwrap();
        assert_eq!(response.status(), RequestStatus::Completed);
        assert_eq!(response.result(), Some(&(i as u32)));
    }
}

#[tokio::test]
async fn deadline_shutdown_fails_unfinished_requests() {
    let manager = sleeper(Duration::from_secs(30));

    let request = Request::builder("m", 0).fire_and_forget().build();
    let id = request.id().as_str().to_string();
    manager.submit(request).await.unwrap();

    let start = Instant::now();
    manager.shutdown_all(Some(Duration::from_millis(100))).await;
    assert!(start.elapsed() < Duration::from_secs(5));

    let response = manager.get_status("m", &id).unwrap();
    assert_eq!(response.status(), RequestStatus::Failed);
    assert!(response.error().unwrap().contains("shut down"));
}

#[tokio::test]
async fn deadline_shutdown_wakes_blocked_waiters() {
    let manager = sleeper(Duration::from_secs(30));

    let submit = manager.clone();
    let waiter =
        tokio::spawn(async move { submit.submit(Request::new("m", 1)).await });
    tokio::time::sleep(Duration::from_millis(10)).await;

    manager.shutdown_all(Some(Duration::from_millis(50))).await;

    let response = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("waiter must be woken by shutdown")
        .unwrap()
        .unwrap();
    assert_eq!(response.status(), RequestStatus::Failed);
}

#[tokio::test]
async fn submissions_after_shutdown_are_refused() {
    let manager = sleeper(Duration::from_millis(1));
    manager.shutdown_all(None).await;

    let err = manager.submit(Request::new("m", 1)).await.unwrap_err();
    assert!(err.is_shutdown());
}

#[tokio::test]
async fn shutdown_is_idempotent() {
    let manager = sleeper(Duration::from_millis(1));
    manager.shutdown_all(None).await;
    manager.shutdown_all(None).await;
    manager.shutdown_all(Some(Duration::from_millis(10))).await;
}

#[tokio::test]
async fn shutdown_releases_partially_acquired_chains() {
    use llm_dispatch::LimiterSpec;

    let manager: DispatchManager<u32, u32> = DispatchManager::new();
    manager
        .register(
            ModelConfig::builder("m")
                .limiter(LimiterSpec::tpm(1_000))
                .limiter(LimiterSpec::concurrent(1))
                .build(),
            processor_fn(|request: Arc<Request<u32>>| async move {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(Completion::new(*request.params()))
            }),
        )
        .unwrap();

    // The first request holds the whole chain while it processes; the
    // second waits in the FIFO and never acquires anything.
    for i in 0..2u32 {
        let request = Request::builder("m", i)
            .estimated_input_tokens(100)
            .fire_and_forget()
            .build();
        manager.submit(request).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    manager.shutdown_all(Some(Duration::from_millis(50))).await;

    // Aborting the worker mid-processing still released the chain: the
    // concurrency permit came back, and only the first request's consumed
    // token estimate remains in the window.
    let info = manager.info("m").unwrap();
    assert_eq!(info.limiters[0].usage, 100);
    assert_eq!(info.limiters[1].usage, 0);
}
