//! The manager facade: model registry and submission routing.

use crate::config::ModelConfig;
use crate::processor::Processor;
use crate::queue::{ModelQueue, QueueInfo, Submission};
use crate::request::{Request, Response};
use llm_dispatch_core::{DispatchError, Result};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Routes requests to per-model queues.
///
/// Cheap to clone; clones share the registry. Correctness does not depend
/// on there being one manager per process: independent managers maintain
/// independent queues and limiters.
///
/// # Example
///
/// ```no_run
/// use llm_dispatch_scheduler::{
///     processor_fn, Completion, DispatchManager, ModelConfig, Request,
/// };
/// use llm_dispatch_ratelimit::LimiterSpec;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let manager: DispatchManager<String, String> = DispatchManager::new();
/// manager.register(
///     ModelConfig::builder("claude-sonnet")
///         .limiter(LimiterSpec::rpm(60))
///         .limiter(LimiterSpec::tpm(100_000))
///         .build(),
///     processor_fn(|request: Arc<Request<String>>| async move {
///         // call the provider here
///         Ok(Completion::new(format!("echo: {}", request.params())))
///     }),
/// )?;
///
/// let response = manager
///     .submit(Request::new("claude-sonnet", "hello".to_string()))
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct DispatchManager<P, T> {
    queues: Arc<RwLock<HashMap<String, Arc<ModelQueue<P, T>>>>>,
}

impl<P, T> Clone for DispatchManager<P, T> {
    fn clone(&self) -> Self {
        Self {
            queues: Arc::clone(&self.queues),
        }
    }
}

impl<P, T> Default for DispatchManager<P, T>
where
    P: Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P, T> DispatchManager<P, T>
where
    P: Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// Creates a manager with no registered models.
    pub fn new() -> Self {
        Self {
            queues: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registers a model: builds its limiter chain, wires the processor,
    /// and starts the queue's worker.
    ///
    /// Fails if the model id already has a live queue. A model whose queue
    /// has shut down may be registered again.
    ///
    /// Must be called from within a tokio runtime.
    pub fn register<Proc>(&self, config: ModelConfig, processor: Proc) -> Result<()>
    where
        Proc: Processor<P, T>,
    {
        self.register_shared(config, Arc::new(processor))
    }

    /// Registers a model with a processor shared across registrations.
    pub fn register_shared(
        &self,
        config: ModelConfig,
        processor: Arc<dyn Processor<P, T>>,
    ) -> Result<()> {
        config.validate()?;
        let mut queues = self.queues.write().unwrap();
        if let Some(existing) = queues.get(config.model_id()) {
            if !existing.is_shut_down() {
                return Err(DispatchError::ModelAlreadyRegistered {
                    model: config.model_id().to_string(),
                });
            }
        }
        let model_id = config.model_id().to_string();
        let queue = ModelQueue::start(config, processor)?;
        queues.insert(model_id, Arc::new(queue));
        Ok(())
    }

    /// Registers several models against one shared processor. Stops at the
    /// first failure; models registered before it stay registered.
    pub fn register_many(
        &self,
        configs: impl IntoIterator<Item = ModelConfig>,
        processor: Arc<dyn Processor<P, T>>,
    ) -> Result<()> {
        for config in configs {
            self.register_shared(config, Arc::clone(&processor))?;
        }
        Ok(())
    }

    /// Submits a request to its model's queue.
    ///
    /// With `wait_for_completion` (the default) this resolves to the
    /// terminal response. For fire-and-forget requests it returns a
    /// `Pending` response immediately; poll [`get_status`] for the result.
    ///
    /// Dropping this future does not cancel the in-flight work: the worker
    /// still runs the request to a terminal state retrievable via
    /// [`get_status`].
    ///
    /// [`get_status`]: DispatchManager::get_status
    pub async fn submit(&self, request: Request<P>) -> Result<Response<T>> {
        let queue = self.queue(request.model_id())?;
        match queue.enqueue(request)? {
            Submission::Detached(response) => Ok(response),
            Submission::Wait {
                request_id,
                receiver,
            } => queue.await_response(&request_id, receiver).await,
        }
    }

    /// Current status of a tracked request; the full response once
    /// terminal.
    pub fn get_status(&self, model_id: &str, request_id: &str) -> Result<Response<T>> {
        self.queue(model_id)?.status(request_id)
    }

    /// Reconciles a request's estimated token cost against actual usage.
    /// Returns true if any token limiter still tracked the request.
    pub fn update_token_usage(
        &self,
        model_id: &str,
        request_id: &str,
        input_tokens: u64,
        output_tokens: u64,
    ) -> Result<bool> {
        Ok(self
            .queue(model_id)?
            .update_token_usage(request_id, input_tokens, output_tokens))
    }

    /// Queue depth and per-limiter usage for one model.
    pub fn info(&self, model_id: &str) -> Result<QueueInfo> {
        Ok(self.queue(model_id)?.info())
    }

    /// Ids of every registered model, including shut-down ones.
    pub fn model_ids(&self) -> Vec<String> {
        self.queues.read().unwrap().keys().cloned().collect()
    }

    /// Returns true if the model has a live (not shut down) queue.
    pub fn is_registered(&self, model_id: &str) -> bool {
        self.queues
            .read()
            .unwrap()
            .get(model_id)
            .is_some_and(|queue| !queue.is_shut_down())
    }

    /// Shuts down every queue concurrently.
    ///
    /// With no deadline each queue drains fully. With a deadline, workers
    /// still running when it elapses are aborted and their outstanding
    /// requests fail with a shutdown error. Terminal responses remain
    /// queryable afterwards; further submissions fail.
    pub async fn shutdown_all(&self, deadline: Option<Duration>) {
        let queues: Vec<Arc<ModelQueue<P, T>>> =
            self.queues.read().unwrap().values().cloned().collect();
        futures::future::join_all(queues.iter().map(|queue| queue.shutdown(deadline))).await;
    }

    fn queue(&self, model_id: &str) -> Result<Arc<ModelQueue<P, T>>> {
        self.queues
            .read()
            .unwrap()
            .get(model_id)
            .cloned()
            .ok_or_else(|| DispatchError::ModelNotRegistered {
                model: model_id.to_string(),
            })
    }
}

impl<P, T> std::fmt::Debug for DispatchManager<P, T>
where
    P: Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchManager")
            .field("models", &self.model_ids())
            .finish()
    }
}
