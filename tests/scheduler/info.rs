//! Status probes and their serialized form.

use llm_dispatch::{
    processor_fn, Completion, DispatchManager, LimiterSpec, ModelConfig, Request,
};
use std::sync::Arc;
use std::time::Duration;

fn manager() -> DispatchManager<u32, u32> {
    let manager = DispatchManager::new();
    manager
        .register(
            ModelConfig::builder("m")
                .limiter(LimiterSpec::rpm(100))
                .limiter(LimiterSpec::tpm(50_000))
                .limiter(LimiterSpec::concurrent(4))
                .build(),
            processor_fn(|request: Arc<Request<u32>>| async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok(Completion::new(*request.params()))
            }),
        )
        .unwrap();
    manager
}

#[tokio::test]
async fn depth_counts_waiting_requests() {
    let manager = manager();

    for i in 0..4u32 {
        let request = Request::builder("m", i).fire_and_forget().build();
        manager.submit(request).await.unwrap();
    }

    // One request is being processed; the rest are waiting in the FIFO.
    tokio::time::sleep(Duration::from_millis(10)).await;
    let info = manager.info("m").unwrap();
    assert!(info.depth >= 2, "expected a backlog, got depth {}", info.depth);

    manager.shutdown_all(None).await;
    assert_eq!(manager.info("m").unwrap().depth, 0);
}

#[tokio::test]
async fn info_serializes_for_export() {
    let manager = manager();
    let request = Request::builder("m", 1)
        .estimated_input_tokens(100)
        .estimated_output_tokens(50)
        .build();
    manager.submit(request).await.unwrap();

    let info = manager.info("m").unwrap();
    let json = serde_json::to_value(&info).unwrap();

    assert_eq!(json["model_id"], "m");
    assert_eq!(json["shut_down"], false);
    assert_eq!(json["limiters"][0]["kind"], "rpm");
    assert_eq!(json["limiters"][0]["usage"], 1);
    assert_eq!(json["limiters"][1]["kind"], "tpm");
    assert_eq!(json["limiters"][1]["usage"], 150);
    assert_eq!(json["limiters"][2]["kind"], "concurrent");
    assert_eq!(json["limiters"][2]["usage"], 0);
}
