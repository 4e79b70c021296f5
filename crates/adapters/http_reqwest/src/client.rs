//! [`HttpClient`] implementation over a shared [`reqwest::Client`].

use flowhub_app::ports::{HttpClient, HttpRequest, HttpResponse};
use flowhub_domain::automation::HttpMethod;
use flowhub_domain::error::FlowHubError;
use reqwest::{Client, Method};
use serde_json::Value;

use crate::config::HttpConfig;
use crate::error::HttpError;

#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    /// Build the client; the per-request bound comes from each [`HttpRequest`].
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Build`] if the TLS backend cannot be initialised.
    pub fn new(config: &HttpConfig) -> Result<Self, HttpError> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(HttpError::Build)?;
        Ok(Self { client })
    }
}

fn method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

/// JSON when it parses, the raw text otherwise, `null` when empty.
fn decode_body(text: String) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

impl HttpClient for ReqwestHttpClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, FlowHubError> {
        let transport = |source| HttpError::Transport {
            url: request.url.clone(),
            source,
        };

        let mut builder = self
            .client
            .request(method(request.method), &request.url)
            .timeout(request.timeout);
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(transport)?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(transport)?;
        tracing::debug!(
            method = %request.method,
            url = %request.url,
            status,
            "http request completed"
        );

        Ok(HttpResponse {
            status,
            body: decode_body(text),
        })
    }
}
