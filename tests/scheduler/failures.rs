//! Processor failures stay confined to their request.

use llm_dispatch::{
    processor_fn, Completion, DispatchManager, LimiterSpec, ModelConfig, Request, RequestStatus,
};
use std::sync::Arc;

#[tokio::test]
async fn failure_produces_a_failed_response_not_an_error() {
    let manager: DispatchManager<(), ()> = DispatchManager::new();
    manager
        .register(
            ModelConfig::new("m"),
            processor_fn(|_request: Arc<Request<()>>| async move {
                Err::<Completion<()>, _>("connection reset by peer".into())
            }),
        )
        .unwrap();

    let response = manager.submit(Request::new("m", ())).await.unwrap();
    assert_eq!(response.status(), RequestStatus::Failed);
    assert_eq!(response.error(), Some("connection reset by peer"));
    assert!(response.result().is_none());
    assert!(response.duration().is_some());
}

#[tokio::test]
async fn worker_survives_a_panicking_free_failure_burst() {
    let manager: DispatchManager<u32, u32> = DispatchManager::new();
    manager
        .register(
            ModelConfig::new("m"),
            processor_fn(|request: Arc<Request<u32>>| async move {
                if *request.params() < 5 {
                    Err(format!("burst failure {}", request.params()).into())
                } else {
                    Ok(Completion::new(*request.params()))
                }
            }),
        )
        .unwrap();

    for i in 0..5u32 {
        let response = manager.submit(Request::new("m", i)).await.unwrap();
        assert_eq!(response.status(), RequestStatus::Failed);
    }
    // The queue keeps serving after five consecutive failures.
    let response = manager.submit(Request::new("m", 5)).await.unwrap();
    assert_eq!(response.status(), RequestStatus::Completed);
}

#[tokio::test]
async fn failed_requests_release_concurrency_but_keep_token_cost() {
    let manager: DispatchManager<(), ()> = DispatchManager::new();
    manager
        .register(
            ModelConfig::builder("m")
                .limiter(LimiterSpec::tpm(10_000))
                .limiter(LimiterSpec::concurrent(1))
                .build(),
            processor_fn(|_request: Arc<Request<()>>| async move {
                Err::<Completion<()>, _>("provider 500".into())
            }),
        )
        .unwrap();

    let request = Request::builder("m", ())
        .estimated_input_tokens(300)
        .estimated_output_tokens(200)
        .build();
    manager.submit(request).await.unwrap();

    let info = manager.info("m").unwrap();
    // The provider was called, so the estimated budget stays consumed.
    assert_eq!(info.limiters[0].usage, 500);
    // The in-flight slot came back.
    assert_eq!(info.limiters[1].usage, 0);
}
