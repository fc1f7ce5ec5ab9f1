//! Request/response observers.
//!
//! `Interceptors` always holds one request observer and one response
//! observer. Slots left empty at construction get `SizeLogger`, which logs
//! the payload size of each attempt. Observers run after every attempt,
//! including retried ones, and cannot change the outcome of a call.

use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::http::{HttpRequest, HttpResponse};

/// Sees every outgoing request once per attempt.
pub trait RequestObserver: Send + Sync {
    fn observe_request(&self, request: &HttpRequest);
}

/// Sees every response once per attempt.
pub trait ResponseObserver: Send + Sync {
    fn observe_response(&self, response: &HttpResponse);
}

impl<F> RequestObserver for F
where
    F: Fn(&HttpRequest) + Send + Sync,
{
    fn observe_request(&self, request: &HttpRequest) {
        self(request)
    }
}

impl<F> ResponseObserver for F
where
    F: Fn(&HttpResponse) + Send + Sync,
{
    fn observe_response(&self, response: &HttpResponse) {
        self(response)
    }
}

/// Default observer: logs payload sizes at `info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SizeLogger;

impl RequestObserver for SizeLogger {
    fn observe_request(&self, request: &HttpRequest) {
        info!(
            method = %request.method,
            url = %request.url,
            size = request.content_length(),
            "request size"
        );
    }
}

impl ResponseObserver for SizeLogger {
    fn observe_response(&self, response: &HttpResponse) {
        info!(
            status = response.status,
            size = response.content_length(),
            "response size"
        );
    }
}

#[derive(Clone)]
pub struct Interceptors {
    request: Arc<dyn RequestObserver>,
    response: Arc<dyn ResponseObserver>,
}

impl Interceptors {
    /// Build an observer pair; `None` installs `SizeLogger` in that slot.
    pub fn new(
        request: Option<Arc<dyn RequestObserver>>,
        response: Option<Arc<dyn ResponseObserver>>,
    ) -> Self {
        Self {
            request: request.unwrap_or_else(|| Arc::new(SizeLogger)),
            response: response.unwrap_or_else(|| Arc::new(SizeLogger)),
        }
    }

    pub fn with_request(mut self, observer: impl RequestObserver + 'static) -> Self {
        self.request = Arc::new(observer);
        self
    }

    pub fn with_response(mut self, observer: impl ResponseObserver + 'static) -> Self {
        self.response = Arc::new(observer);
        self
    }

    pub(crate) fn notify(&self, request: &HttpRequest, response: &HttpResponse) {
        self.request.observe_request(request);
        self.response.observe_response(response);
    }
}

impl Default for Interceptors {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl fmt::Debug for Interceptors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptors").finish_non_exhaustive()
    }
}
