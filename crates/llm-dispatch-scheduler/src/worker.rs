//! The per-queue worker: admission, processing, reconciliation, release.

use crate::events::SchedulerEvent;
use crate::queue::QueueShared;
use crate::request::{Request, RequestStatus, Response};
use llm_dispatch_ratelimit::LimiterChain;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

#[cfg(feature = "metrics")]
use metrics::counter;

/// Drains the FIFO until the sender side is dropped at shutdown.
///
/// One worker per queue: requests are admitted and processed strictly in
/// enqueue order, and a request blocked on capacity holds its position.
pub(crate) async fn run<P, T>(
    shared: Arc<QueueShared<P, T>>,
    mut jobs: mpsc::UnboundedReceiver<Arc<Request<P>>>,
) where
    P: Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    while let Some(request) = jobs.recv().await {
        shared.depth.fetch_sub(1, Ordering::SeqCst);
        shared.record_depth();
        process_one(&shared, request).await;
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(model = %shared.model_id, "queue drained, worker exiting");
}

/// Drives one request through the chain and the processor.
///
/// Every exit path releases the chain: the guard covers processor panics
/// surfacing as task aborts and worker cancellation during shutdown.
async fn process_one<P, T>(shared: &Arc<QueueShared<P, T>>, request: Arc<Request<P>>)
where
    P: Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    let request_id = request.id().clone();
    let id = request_id.as_str().to_string();
    let estimated_input = request.estimated_input_tokens().unwrap_or(0);
    let estimated_output = request.estimated_output_tokens().unwrap_or(0);

    if let Err(error) = shared
        .chain
        .acquire_all(&id, estimated_input, estimated_output)
        .await
    {
        // Admission can only fail on a configuration fault; confine it to
        // this request.
        publish(shared, &id, Response::failed(request_id, &shared.model_id, error.to_string(), None));
        return;
    }

    // From here on the chain must be released on every exit path.
    let release = ReleaseOnExit {
        chain: &shared.chain,
        request_id: &id,
    };

    set_status(shared, &id, RequestStatus::Processing);
    shared.listeners.emit(&SchedulerEvent::RequestStarted {
        model: shared.model_id.clone(),
        request_id: id.clone(),
        timestamp: Instant::now(),
        queued_for: request.created_at().elapsed(),
    });

    #[cfg(feature = "tracing")]
    tracing::debug!(model = %shared.model_id, request_id = %id, "processing request");

    let started = Instant::now();
    let outcome = shared.processor.process(Arc::clone(&request)).await;
    let duration = started.elapsed();

    let response = match outcome {
        Ok(completion) => {
            let (value, input_tokens, output_tokens) = completion.into_parts();
            if let (Some(input), Some(output)) = (input_tokens, output_tokens) {
                shared.chain.update_usage(&id, input, output);
            }
            Response::completed(
                request_id,
                &shared.model_id,
                value,
                duration,
                input_tokens,
                output_tokens,
            )
        }
        Err(error) => Response::failed(
            request_id,
            &shared.model_id,
            error.to_string(),
            Some(duration),
        ),
    };

    // Release before publishing so a submitter woken by the response
    // observes the chain's post-request state.
    drop(release);
    publish(shared, &id, response);
}

fn set_status<P, T>(shared: &QueueShared<P, T>, request_id: &str, status: RequestStatus) {
    if let Some(entry) = shared.tracked.lock().unwrap().get_mut(request_id) {
        entry.status = status;
    }
}

/// Stores the terminal response, wakes the rendezvous, and emits the
/// completion event. Exactly one terminal publication happens per request:
/// the worker is the only writer and calls this once.
fn publish<P, T: Clone>(shared: &QueueShared<P, T>, request_id: &str, response: Response<T>) {
    let status = response.status();
    let duration = response.duration().unwrap_or_default();
    let error = response.error().map(str::to_string);

    {
        let mut tracked = shared.tracked.lock().unwrap();
        if let Some(entry) = tracked.get_mut(request_id) {
            entry.status = status;
            entry.publisher.send_replace(Some(response));
        }
    }

    match status {
        RequestStatus::Completed => {
            #[cfg(feature = "metrics")]
            counter!("llm_dispatch_requests_completed_total", "model" => shared.model_id.clone())
                .increment(1);

            shared.listeners.emit(&SchedulerEvent::RequestCompleted {
                model: shared.model_id.clone(),
                request_id: request_id.to_string(),
                timestamp: Instant::now(),
                duration,
            });
        }
        RequestStatus::Failed => {
            #[cfg(feature = "metrics")]
            counter!("llm_dispatch_requests_failed_total", "model" => shared.model_id.clone())
                .increment(1);

            #[cfg(feature = "tracing")]
            tracing::debug!(
                model = %shared.model_id,
                request_id,
                error = error.as_deref().unwrap_or(""),
                "request failed"
            );

            shared.listeners.emit(&SchedulerEvent::RequestFailed {
                model: shared.model_id.clone(),
                request_id: request_id.to_string(),
                timestamp: Instant::now(),
                error: error.unwrap_or_default(),
            });
        }
        RequestStatus::Pending | RequestStatus::Processing => {}
    }
}

/// Releases the fully-acquired chain when the per-request scope exits,
/// including when the worker task is aborted mid-processing.
struct ReleaseOnExit<'a> {
    chain: &'a Arc<LimiterChain>,
    request_id: &'a str,
}

impl Drop for ReleaseOnExit<'_> {
    fn drop(&mut self) {
        self.chain.release_all(self.request_id);
    }
}
