//! HTTP port — outbound requests for `API_CALL` and `WEBHOOK` actions.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use flowhub_domain::automation::HttpMethod;
use flowhub_domain::error::FlowHubError;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    /// Sent as JSON when present.
    pub body: Option<Value>,
    pub timeout: Duration,
}

/// Any status is a response; deciding what counts as failure is the caller's job.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// Parsed JSON body, or the raw text as a JSON string.
    pub body: Value,
}

impl HttpResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status < 400
    }
}

pub trait HttpClient {
    /// Send one request.
    ///
    /// Returns `Err` only when no response was obtained (connect error,
    /// timeout, invalid URL).
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, FlowHubError>> + Send;
}

impl<T: HttpClient + Send + Sync> HttpClient for std::sync::Arc<T> {
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, FlowHubError>> + Send {
        (**self).send(request)
    }
}
