//! Request and response records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Opaque, stable request identifier, generated at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(String);

impl RequestId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub(crate) fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a request is in its lifecycle.
///
/// `Pending -> Processing -> Completed | Failed`; the terminal states are
/// absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestStatus {
    /// Enqueued, not yet admitted.
    Pending,
    /// Admitted by every limiter; the processor is running.
    Processing,
    /// The processor returned a value.
    Completed,
    /// The processor returned an error.
    Failed,
}

impl RequestStatus {
    /// Returns true for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Failed)
    }
}

/// A unit of work for one model.
///
/// The parameter payload `P` is opaque to the scheduler; only the
/// processor interprets it. Token estimates drive admission cost on token
/// limiters; missing estimates count as zero.
#[derive(Debug, Clone)]
pub struct Request<P> {
    id: RequestId,
    model_id: String,
    params: P,
    estimated_input_tokens: Option<u64>,
    estimated_output_tokens: Option<u64>,
    wait_for_completion: bool,
    created_at: Instant,
}

impl<P> Request<P> {
    /// Creates a request with defaults: no estimates, wait for completion.
    pub fn new(model_id: impl Into<String>, params: P) -> Self {
        Self {
            id: RequestId::generate(),
            model_id: model_id.into(),
            params,
            estimated_input_tokens: None,
            estimated_output_tokens: None,
            wait_for_completion: true,
            created_at: Instant::now(),
        }
    }

    /// Creates a builder for a request with estimates or fire-and-forget
    /// delivery.
    pub fn builder(model_id: impl Into<String>, params: P) -> RequestBuilder<P> {
        RequestBuilder {
            request: Self::new(model_id, params),
        }
    }

    /// The request's unique id.
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// The model this request targets.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// The opaque parameter payload.
    pub fn params(&self) -> &P {
        &self.params
    }

    /// Estimated input tokens, if the submitter provided one.
    pub fn estimated_input_tokens(&self) -> Option<u64> {
        self.estimated_input_tokens
    }

    /// Estimated output tokens, if the submitter provided one.
    pub fn estimated_output_tokens(&self) -> Option<u64> {
        self.estimated_output_tokens
    }

    /// Whether `submit` blocks until the terminal response.
    pub fn wait_for_completion(&self) -> bool {
        self.wait_for_completion
    }

    /// When this request was constructed.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }
}

/// Builder for [`Request`].
pub struct RequestBuilder<P> {
    request: Request<P>,
}

impl<P> RequestBuilder<P> {
    /// Sets the estimated input token count.
    pub fn estimated_input_tokens(mut self, tokens: u64) -> Self {
        self.request.estimated_input_tokens = Some(tokens);
        self
    }

    /// Sets the estimated output token count.
    pub fn estimated_output_tokens(mut self, tokens: u64) -> Self {
        self.request.estimated_output_tokens = Some(tokens);
        self
    }

    /// Sets whether `submit` blocks until the terminal response.
    ///
    /// Default: true.
    pub fn wait_for_completion(mut self, wait: bool) -> Self {
        self.request.wait_for_completion = wait;
        self
    }

    /// Submit-and-return: `submit` answers immediately with a `Pending`
    /// response and the result is fetched later via `get_status`.
    pub fn fire_and_forget(self) -> Self {
        self.wait_for_completion(false)
    }

    /// Finishes the builder.
    pub fn build(self) -> Request<P> {
        self.request
    }
}

/// The outcome of a request.
///
/// Invariants: `Completed` carries a result and no error; `Failed` carries
/// an error and no result; `Pending`/`Processing` carry neither and are
/// only returned by fire-and-forget submissions and status probes.
#[derive(Debug, Clone)]
pub struct Response<T> {
    request_id: RequestId,
    model_id: String,
    status: RequestStatus,
    result: Option<T>,
    error: Option<String>,
    duration: Option<Duration>,
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

impl<T> Response<T> {
    pub(crate) fn pending(request_id: RequestId, model_id: impl Into<String>) -> Self {
        Self {
            request_id,
            model_id: model_id.into(),
            status: RequestStatus::Pending,
            result: None,
            error: None,
            duration: None,
            input_tokens: None,
            output_tokens: None,
        }
    }

    pub(crate) fn processing(request_id: RequestId, model_id: impl Into<String>) -> Self {
        Self {
            status: RequestStatus::Processing,
            ..Self::pending(request_id, model_id)
        }
    }

    pub(crate) fn completed(
        request_id: RequestId,
        model_id: impl Into<String>,
        result: T,
        duration: Duration,
        input_tokens: Option<u64>,
        output_tokens: Option<u64>,
    ) -> Self {
        Self {
            request_id,
            model_id: model_id.into(),
            status: RequestStatus::Completed,
            result: Some(result),
            error: None,
            duration: Some(duration),
            input_tokens,
            output_tokens,
        }
    }

    pub(crate) fn failed(
        request_id: RequestId,
        model_id: impl Into<String>,
        error: impl Into<String>,
        duration: Option<Duration>,
    ) -> Self {
        Self {
            request_id,
            model_id: model_id.into(),
            status: RequestStatus::Failed,
            result: None,
            error: Some(error.into()),
            duration,
            input_tokens: None,
            output_tokens: None,
        }
    }

    /// Id of the request this response answers.
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// The model that handled the request.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Current status.
    pub fn status(&self) -> RequestStatus {
        self.status
    }

    /// The processor's result, present iff `Completed`.
    pub fn result(&self) -> Option<&T> {
        self.result.as_ref()
    }

    /// Consumes the response, returning the processor's result.
    pub fn into_result(self) -> Option<T> {
        self.result
    }

    /// The failure message, present iff `Failed`.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Wall-clock processing time, present on terminal responses that ran.
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Actual input tokens, when the processor reported them.
    pub fn input_tokens(&self) -> Option<u64> {
        self.input_tokens
    }

    /// Actual output tokens, when the processor reported them.
    pub fn output_tokens(&self) -> Option<u64> {
        self.output_tokens
    }

    /// Returns true for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
