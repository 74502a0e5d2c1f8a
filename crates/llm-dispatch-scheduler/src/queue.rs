//! Per-model FIFO queue.

use crate::config::ModelConfig;
use crate::events::SchedulerEvent;
use crate::processor::Processor;
use crate::request::{Request, RequestId, RequestStatus, Response};
use crate::worker;
use llm_dispatch_core::events::EventListeners;
use llm_dispatch_core::{DispatchError, Result};
use llm_dispatch_ratelimit::{LimiterChain, LimiterSnapshot};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

#[cfg(feature = "metrics")]
use metrics::gauge;

/// One tracked request: its current status and the rendezvous through
/// which the worker publishes the terminal response. The watch channel
/// tolerates late and repeated readers, which is what fire-and-forget
/// polling needs.
pub(crate) struct Tracked<T> {
    pub(crate) status: RequestStatus,
    pub(crate) publisher: watch::Sender<Option<Response<T>>>,
}

/// State shared between the queue handle and its worker task.
pub(crate) struct QueueShared<P, T> {
    pub(crate) model_id: String,
    pub(crate) chain: Arc<LimiterChain>,
    pub(crate) tracked: Mutex<HashMap<String, Tracked<T>>>,
    pub(crate) listeners: EventListeners<SchedulerEvent>,
    pub(crate) depth: AtomicUsize,
    pub(crate) processor: Arc<dyn Processor<P, T>>,
}

impl<P, T> QueueShared<P, T> {
    #[cfg(feature = "metrics")]
    pub(crate) fn record_depth(&self) {
        gauge!("llm_dispatch_queue_depth", "model" => self.model_id.clone())
            .set(self.depth.load(Ordering::SeqCst) as f64);
    }

    #[cfg(not(feature = "metrics"))]
    pub(crate) fn record_depth(&self) {}
}

/// How an accepted submission will deliver its response.
#[derive(Debug)]
pub(crate) enum Submission<T> {
    /// The submitter waits on the rendezvous for the terminal response.
    Wait {
        request_id: RequestId,
        receiver: watch::Receiver<Option<Response<T>>>,
    },
    /// Fire-and-forget: a `Pending` response is returned immediately and
    /// the terminal response is fetched later via status probes.
    Detached(Response<T>),
}

/// Point-in-time view of one model's queue for status probes.
#[derive(Debug, Clone, Serialize)]
pub struct QueueInfo {
    /// The model this queue serves.
    pub model_id: String,
    /// Requests waiting in the FIFO, not yet dequeued by the worker.
    pub depth: usize,
    /// True once shutdown has begun.
    pub shut_down: bool,
    /// Per-limiter usage, in configured order.
    pub limiters: Vec<LimiterSnapshot>,
}

/// A FIFO of pending requests for one model, drained by a single worker.
///
/// The worker admits each request through the model's limiter chain,
/// invokes the processor, reconciles token usage, and publishes the
/// terminal response. FIFO order is preserved with respect to admission
/// attempts: a request blocked on capacity does not yield its position to
/// later, cheaper requests.
pub struct ModelQueue<P, T> {
    shared: Arc<QueueShared<P, T>>,
    /// Sender side of the FIFO; dropped when shutdown begins so the worker
    /// drains what is queued and exits.
    jobs: Mutex<Option<mpsc::UnboundedSender<Arc<Request<P>>>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    shutting_down: AtomicBool,
}

impl<P, T> ModelQueue<P, T>
where
    P: Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// Builds the limiter chain and starts the worker task.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn start(config: ModelConfig, processor: Arc<dyn Processor<P, T>>) -> Result<Self> {
        config.validate()?;
        let chain = Arc::new(LimiterChain::new(config.model_id.clone(), &config.limiters)?);
        let shared = Arc::new(QueueShared {
            model_id: config.model_id,
            chain,
            tracked: Mutex::new(HashMap::new()),
            listeners: config.event_listeners,
            depth: AtomicUsize::new(0),
            processor,
        });

        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(worker::run(Arc::clone(&shared), jobs_rx));

        Ok(Self {
            shared,
            jobs: Mutex::new(Some(jobs_tx)),
            worker: Mutex::new(Some(worker)),
            shutting_down: AtomicBool::new(false),
        })
    }

    /// The model this queue serves.
    pub fn model_id(&self) -> &str {
        &self.shared.model_id
    }

    /// True once shutdown has begun; enqueues are refused from then on.
    pub fn is_shut_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// Requests waiting in the FIFO.
    pub fn depth(&self) -> usize {
        self.shared.depth.load(Ordering::SeqCst)
    }

    /// Validates and accepts a request into the FIFO.
    pub(crate) fn enqueue(&self, request: Request<P>) -> Result<Submission<T>> {
        if self.is_shut_down() {
            return Err(self.shutdown_error());
        }
        if request.model_id() != self.shared.model_id {
            return Err(DispatchError::InvalidConfig {
                reason: format!(
                    "request targets model `{}` but was routed to queue `{}`",
                    request.model_id(),
                    self.shared.model_id
                ),
            });
        }
        // Surface never-admissible token costs now instead of letting the
        // worker wait forever.
        self.shared.chain.check_admissible(
            request.estimated_input_tokens().unwrap_or(0),
            request.estimated_output_tokens().unwrap_or(0),
        )?;

        let request_id = request.id().clone();
        let wait = request.wait_for_completion();

        let (publisher, receiver) = watch::channel(None);
        self.shared.tracked.lock().unwrap().insert(
            request_id.as_str().to_string(),
            Tracked {
                status: RequestStatus::Pending,
                publisher,
            },
        );

        // Count the request before it becomes visible to the worker; the
        // worker decrements on dequeue.
        self.shared.depth.fetch_add(1, Ordering::SeqCst);
        {
            let jobs = self.jobs.lock().unwrap();
            let sent = jobs
                .as_ref()
                .map(|tx| tx.send(Arc::new(request)).is_ok())
                .unwrap_or(false);
            if !sent {
                // Shutdown raced the enqueue; undo the bookkeeping.
                self.shared.depth.fetch_sub(1, Ordering::SeqCst);
                self.shared
                    .tracked
                    .lock()
                    .unwrap()
                    .remove(request_id.as_str());
                return Err(self.shutdown_error());
            }
        }
        self.shared.record_depth();

        self.shared.listeners.emit(&SchedulerEvent::RequestEnqueued {
            model: self.shared.model_id.clone(),
            request_id: request_id.as_str().to_string(),
            timestamp: std::time::Instant::now(),
        });

        if wait {
            Ok(Submission::Wait {
                request_id,
                receiver,
            })
        } else {
            Ok(Submission::Detached(Response::pending(
                request_id,
                &self.shared.model_id,
            )))
        }
    }

    /// Waits on the rendezvous for the terminal response, then prunes the
    /// tracking entry.
    ///
    /// Dropping this future does not affect the in-flight work: the worker
    /// still produces a terminal record retrievable via status probes.
    pub(crate) async fn await_response(
        &self,
        request_id: &RequestId,
        mut receiver: watch::Receiver<Option<Response<T>>>,
    ) -> Result<Response<T>> {
        loop {
            let published = receiver.borrow_and_update().clone();
            if let Some(response) = published {
                if response.is_terminal() {
                    self.shared
                        .tracked
                        .lock()
                        .unwrap()
                        .remove(request_id.as_str());
                    return Ok(response);
                }
            }
            if receiver.changed().await.is_err() {
                return Err(self.shutdown_error());
            }
        }
    }

    /// Current status of a tracked request; the full response once
    /// terminal. Fire-and-forget responses stay queryable until the queue
    /// shuts down.
    pub fn status(&self, request_id: &str) -> Result<Response<T>> {
        let tracked = self.shared.tracked.lock().unwrap();
        let entry = tracked
            .get(request_id)
            .ok_or_else(|| DispatchError::RequestNotFound {
                model: self.shared.model_id.clone(),
                request_id: request_id.to_string(),
            })?;

        if let Some(response) = entry.publisher.borrow().clone() {
            return Ok(response);
        }
        let skeleton = match entry.status {
            RequestStatus::Processing => {
                Response::processing(RequestId::from_raw(request_id), &self.shared.model_id)
            }
            _ => Response::pending(RequestId::from_raw(request_id), &self.shared.model_id),
        };
        Ok(skeleton)
    }

    /// Reconciles estimated token cost against actual usage. Valid any
    /// time after admission; after terminal publication it adjusts the
    /// windowed counters without changing the published response. Returns
    /// true if any token limiter still tracked the request.
    pub fn update_token_usage(&self, request_id: &str, input_tokens: u64, output_tokens: u64) -> bool {
        self.shared
            .chain
            .update_usage(request_id, input_tokens, output_tokens)
    }

    /// Queue depth plus the chain's per-limiter usage.
    pub fn info(&self) -> QueueInfo {
        QueueInfo {
            model_id: self.shared.model_id.clone(),
            depth: self.depth(),
            shut_down: self.is_shut_down(),
            limiters: self.shared.chain.snapshot(),
        }
    }

    /// Shuts the queue down: refuse new enqueues, let the FIFO drain, and
    /// join the worker. With a deadline, the worker is aborted once the
    /// deadline elapses; any request that never reached a terminal state
    /// is failed with a shutdown error.
    ///
    /// Idempotent; concurrent calls after the first return without
    /// waiting for the drain.
    pub async fn shutdown(&self, deadline: Option<Duration>) {
        self.shutting_down.store(true, Ordering::Release);
        // Dropping the sender closes the FIFO: the worker drains what is
        // already queued, then exits.
        self.jobs.lock().unwrap().take();

        let handle = self.worker.lock().unwrap().take();
        if let Some(mut handle) = handle {
            match deadline {
                None => {
                    let _ = (&mut handle).await;
                }
                Some(deadline) => {
                    if tokio::time::timeout(deadline, &mut handle).await.is_err() {
                        handle.abort();
                        let _ = handle.await;
                    }
                }
            }

            let outstanding = self.fail_outstanding();
            self.shared.depth.store(0, Ordering::SeqCst);
            self.shared.record_depth();

            #[cfg(feature = "tracing")]
            if outstanding > 0 {
                tracing::warn!(
                    model = %self.shared.model_id,
                    outstanding,
                    "queue shut down with unfinished requests"
                );
            }

            self.shared.listeners.emit(&SchedulerEvent::QueueShutdown {
                model: self.shared.model_id.clone(),
                timestamp: std::time::Instant::now(),
                outstanding,
            });
        }
    }

    /// Publishes a shutdown failure to every non-terminal rendezvous.
    fn fail_outstanding(&self) -> usize {
        let mut tracked = self.shared.tracked.lock().unwrap();
        let mut outstanding = 0;
        for (id, entry) in tracked.iter_mut() {
            if !entry.status.is_terminal() {
                entry.status = RequestStatus::Failed;
                let response = Response::failed(
                    RequestId::from_raw(id.clone()),
                    &self.shared.model_id,
                    self.shutdown_error().to_string(),
                    None,
                );
                entry.publisher.send_replace(Some(response));
                outstanding += 1;
            }
        }
        outstanding
    }

    fn shutdown_error(&self) -> DispatchError {
        DispatchError::QueueShutdown {
            model: self.shared.model_id.clone(),
        }
    }
}

impl<P, T> std::fmt::Debug for ModelQueue<P, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelQueue")
            .field("model_id", &self.shared.model_id)
            .field("depth", &self.shared.depth.load(Ordering::SeqCst))
            .field("shutting_down", &self.shutting_down.load(Ordering::Acquire))
            .finish()
    }
}
