//! Token usage reconciliation through the manager surface.

use llm_dispatch::{
    processor_fn, Completion, DispatchManager, LimiterSpec, ModelConfig, Request,
};
use std::sync::Arc;

fn manager_with_tpm(limit: u64) -> DispatchManager<u32, u32> {
    let manager = DispatchManager::new();
    manager
        .register(
            ModelConfig::builder("m")
                .limiter(LimiterSpec::tpm(limit))
                .build(),
            processor_fn(|request: Arc<Request<u32>>| async move {
                Ok(Completion::new(*request.params()))
            }),
        )
        .unwrap();
    manager
}

#[tokio::test]
async fn processor_reported_usage_reconciles_automatically() {
    let manager: DispatchManager<u32, u32> = DispatchManager::new();
    manager
        .register(
            ModelConfig::builder("m")
                .limiter(LimiterSpec::tpm(10_000))
                .build(),
            processor_fn(|request: Arc<Request<u32>>| async move {
                Ok(Completion::new(*request.params()).with_usage(150, 250))
            }),
        )
        .unwrap();

    let request = Request::builder("m", 1)
        .estimated_input_tokens(2_000)
        .estimated_output_tokens(2_000)
        .build();
    let response = manager.submit(request).await.unwrap();

    // The response carries actuals and the window was adjusted to them.
    assert_eq!(response.input_tokens(), Some(150));
    assert_eq!(response.output_tokens(), Some(250));
    assert_eq!(manager.info("m").unwrap().limiters[0].usage, 400);
}

#[tokio::test]
async fn matching_estimates_make_reconcile_a_noop() {
    let manager = manager_with_tpm(10_000);
    let request = Request::builder("m", 1)
        .estimated_input_tokens(300)
        .estimated_output_tokens(200)
        .build();
    let id = request.id().as_str().to_string();
    manager.submit(request).await.unwrap();

    let before = manager.info("m").unwrap().limiters[0].usage;
    assert!(manager.update_token_usage("m", &id, 300, 200).unwrap());
    let after = manager.info("m").unwrap().limiters[0].usage;
    assert_eq!(before, after);
    assert_eq!(after, 500);
}

#[tokio::test]
async fn repeated_reconcile_is_idempotent() {
    let manager = manager_with_tpm(10_000);
    let request = Request::builder("m", 1)
        .estimated_input_tokens(1_000)
        .estimated_output_tokens(1_000)
        .build();
    let id = request.id().as_str().to_string();
    manager.submit(request).await.unwrap();

    assert!(manager.update_token_usage("m", &id, 40, 60).unwrap());
    assert!(manager.update_token_usage("m", &id, 40, 60).unwrap());
    assert_eq!(manager.info("m").unwrap().limiters[0].usage, 100);
}

#[tokio::test]
async fn reconcile_for_unknown_request_is_a_noop() {
    let manager = manager_with_tpm(10_000);
    assert!(!manager.update_token_usage("m", "ghost", 1, 1).unwrap());

    let err = manager
        .update_token_usage("other-model", "ghost", 1, 1)
        .unwrap_err();
    assert!(err.is_not_found());
}
