use llm_dispatch::{
    processor_fn, Completion, DispatchManager, LimiterSpec, ModelConfig, Request,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("llm-dispatch fan-out example\n");

    let manager: DispatchManager<String, String> = DispatchManager::new();

    // A stand-in for a real provider call: sleeps, echoes, reports usage.
    let provider = processor_fn(|request: Arc<Request<String>>| async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let answer = format!("[{}] {}", request.model_id(), request.params());
        Ok(Completion::new(answer).with_usage(120, 40))
    });

    manager.register_many(
        [
            ModelConfig::builder("fast-model")
                .limiter(LimiterSpec::rpm(600))
                .limiter(LimiterSpec::tpm(200_000))
                .limiter(LimiterSpec::concurrent(8))
                .build(),
            ModelConfig::builder("slow-model")
                .limiter(LimiterSpec::rpm(60))
                .limiter(LimiterSpec::tpm(20_000))
                .limiter(LimiterSpec::concurrent(1))
                .build(),
        ],
        Arc::new(provider),
    )?;

    // Fan the same prompt out to both models concurrently.
    let mut handles = Vec::new();
    for model in ["fast-model", "slow-model"] {
        for i in 1..=3 {
            let manager = manager.clone();
            let request = Request::builder(model, format!("prompt {i}"))
                .estimated_input_tokens(150)
                .estimated_output_tokens(50)
                .build();
            handles.push(tokio::spawn(async move { manager.submit(request).await }));
        }
    }

    for handle in handles {
        let response = handle.await??;
        println!(
            "{} -> {:?} ({:?})",
            response.model_id(),
            response.result(),
            response.duration().unwrap_or_default()
        );
    }

    for model in ["fast-model", "slow-model"] {
        let info = manager.info(model)?;
        println!("\n{model} limiters after the burst:");
        for limiter in info.limiters {
            println!(
                "  {}: {}/{} used",
                limiter.kind, limiter.usage, limiter.limit
            );
        }
    }

    manager.shutdown_all(Some(Duration::from_secs(5))).await;
    Ok(())
}
