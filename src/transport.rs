//! Outbound HTTP used by verification and dispatch.

use std::future::Future;
use std::pin::pin;
use std::time::Duration;

use futures::future::{select, Either};
use thiserror::Error;
use worker::wasm_bindgen::JsValue;
use worker::{AbortController, Delay, Fetch, Headers, Method, Request, RequestInit};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub timeout: Option<Duration>,
}

impl OutboundRequest {
    /// JSON POST with no timeout.
    pub fn post_json(url: impl Into<String>, body: String) -> Self {
        Self {
            url: url.into(),
            headers: vec![("Content-Type".into(), "application/json".into())],
            body,
            timeout: None,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundResponse {
    pub status: u16,
    pub body: String,
}

impl OutboundResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("request failed: {0}")]
    Connection(String),
}

#[allow(async_fn_in_trait)]
pub trait HttpClient {
    async fn send(&self, request: OutboundRequest) -> Result<OutboundResponse, TransportError>;
}

/// Sends requests with the Workers `fetch` API.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchClient;

impl FetchClient {
    fn build(request: &OutboundRequest) -> worker::Result<Request> {
        let mut headers = Headers::new();
        for (name, value) in &request.headers {
            headers.set(name, value)?;
        }

        let mut init = RequestInit::new();
        init.with_method(Method::Post)
            .with_headers(headers)
            .with_body(Some(JsValue::from_str(&request.body)));

        Request::new_with_init(&request.url, &init)
    }

    /// Awaits the response headers and the full body.
    async fn read(sent: impl Future<Output = worker::Result<worker::Response>>) -> Result<OutboundResponse, TransportError> {
        let mut response = sent.await.map_err(|e| TransportError::Connection(e.to_string()))?;
        let status = response.status_code();
        let body = response.text().await.unwrap_or_default();
        Ok(OutboundResponse { status, body })
    }
}

impl HttpClient for FetchClient {
    async fn send(&self, request: OutboundRequest) -> Result<OutboundResponse, TransportError> {
        let built = Self::build(&request).map_err(|e| TransportError::Connection(e.to_string()))?;

        let fetch = Fetch::Request(built);
        let Some(timeout) = request.timeout else {
            return Self::read(fetch.send()).await;
        };

        let controller = AbortController::default();
        let signal = controller.signal();
        let exchange = Self::read(fetch.send_with_signal(&signal));

        match before_deadline(exchange, Delay::from(timeout)).await {
            Some(outcome) => outcome,
            None => {
                controller.abort();
                Err(TransportError::Timeout(timeout))
            }
        }
    }
}

/// Resolves `work` unless `deadline` fires first. `work` must cover the whole
/// exchange, body included, for the deadline to bound it.
async fn before_deadline<T>(work: impl Future<Output = T>, deadline: impl Future<Output = ()>) -> Option<T> {
    let work = pin!(work);
    let deadline = pin!(deadline);
    match select(work, deadline).await {
        Either::Left((value, _)) => Some(value),
        Either::Right(((), _)) => None,
    }
}
