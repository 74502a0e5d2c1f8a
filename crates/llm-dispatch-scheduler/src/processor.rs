//! The processor contract: user-supplied request handling.

use crate::request::Request;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

/// Boxed error type processors fail with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// What a processor produced for one request.
///
/// Carries the typed result plus the actual token counts, when the
/// provider reported them. Reported counts are reconciled against the
/// admission-time estimates; counts can also be supplied later through
/// `update_token_usage`.
#[derive(Debug, Clone)]
pub struct Completion<T> {
    value: T,
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

impl<T> Completion<T> {
    /// Wraps a result value with no usage report.
    pub fn new(value: T) -> Self {
        Self {
            value,
            input_tokens: None,
            output_tokens: None,
        }
    }

    /// Attaches the actual token counts the provider reported.
    pub fn with_usage(mut self, input_tokens: u64, output_tokens: u64) -> Self {
        self.input_tokens = Some(input_tokens);
        self.output_tokens = Some(output_tokens);
        self
    }

    /// The result value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Actual input tokens, if reported.
    pub fn input_tokens(&self) -> Option<u64> {
        self.input_tokens
    }

    /// Actual output tokens, if reported.
    pub fn output_tokens(&self) -> Option<u64> {
        self.output_tokens
    }

    pub(crate) fn into_parts(self) -> (T, Option<u64>, Option<u64>) {
        (self.value, self.input_tokens, self.output_tokens)
    }
}

/// Handles admitted requests, typically by calling a remote LLM provider.
///
/// The scheduler treats the call as opaque I/O: any error becomes a
/// `Failed` response confined to that request, and the worker keeps
/// draining. Retries, timeouts, and circuit breaking are the processor's
/// business.
pub trait Processor<P, T>: Send + Sync + 'static {
    /// Processes one request. May suspend.
    fn process(&self, request: Arc<Request<P>>) -> BoxFuture<'static, Result<Completion<T>, BoxError>>;
}

/// Wraps an async closure as a [`Processor`].
///
/// ```
/// use llm_dispatch_scheduler::{processor_fn, Completion};
///
/// let processor = processor_fn(|request: std::sync::Arc<llm_dispatch_scheduler::Request<String>>| async move {
///     Ok::<_, llm_dispatch_scheduler::BoxError>(Completion::new(format!("echo: {}", request.params())))
/// });
/// # let _ = processor;
/// ```
pub fn processor_fn<F>(f: F) -> ProcessorFn<F> {
    ProcessorFn { f }
}

/// A [`Processor`] implemented by a closure. See [`processor_fn`].
#[derive(Clone)]
pub struct ProcessorFn<F> {
    f: F,
}

impl<P, T, F, Fut> Processor<P, T> for ProcessorFn<F>
where
    P: Send + Sync + 'static,
    T: Send + 'static,
    F: Fn(Arc<Request<P>>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Completion<T>, BoxError>> + Send + 'static,
{
    fn process(&self, request: Arc<Request<P>>) -> BoxFuture<'static, Result<Completion<T>, BoxError>> {
        Box::pin((self.f)(request))
    }
}
