#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use chrono::{DateTime, TimeZone, Utc};
use inquiry_worker::http::{ApiRequest, CorsPolicy};
use inquiry_worker::inquiry::InquiryHandler;
use inquiry_worker::log::{EventSink, Level, LogEvent};
use inquiry_worker::notify::{Dispatcher, WebhookNotifier};
use inquiry_worker::rate_limit::{RateLimitStore, StoreError};
use inquiry_worker::router::Router;
use inquiry_worker::transport::{HttpClient, OutboundRequest, OutboundResponse, TransportError};
use inquiry_worker::verify::{TurnstileClient, SITEVERIFY_URL};
use serde_json::{json, Value};
use worker::Method;

pub const WEBHOOK_URL: &str = "https://n8n.example/webhook/inquiry";
pub const SITE_ORIGIN: &str = "https://mcadroofcleaning.co.uk";
pub const TURNSTILE_SECRET: &str = "turnstile-secret-value";
pub const CLIENT_TOKEN: &str = "client-token-3f9a";

pub type TestHandler = InquiryHandler<MemoryStore, TurnstileClient<ScriptedHttp>, Dispatcher<ScriptedHttp>>;
pub type TestRouter = Router<MemoryStore, TurnstileClient<ScriptedHttp>, Dispatcher<ScriptedHttp>>;

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
}

/// KV stand-in shared between clones.
#[derive(Clone, Default)]
pub struct MemoryStore {
    pub entries: Rc<RefCell<HashMap<String, (String, u64)>>>,
    pub fail: Rc<RefCell<bool>>,
}

impl RateLimitStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        if *self.fail.borrow() {
            return Err(StoreError("kv unavailable".into()));
        }
        Ok(self.entries.borrow().get(key).map(|(v, _)| v.clone()))
    }

    async fn put(&self, key: &str, value: String, ttl_secs: u64) -> Result<(), StoreError> {
        if *self.fail.borrow() {
            return Err(StoreError("kv unavailable".into()));
        }
        self.entries
            .borrow_mut()
            .insert(key.to_string(), (value, ttl_secs));
        Ok(())
    }
}

/// HTTP client answering from a per-URL script and recording every call.
#[derive(Clone, Default)]
pub struct ScriptedHttp {
    replies: Rc<RefCell<HashMap<String, Result<OutboundResponse, TransportError>>>>,
    pub calls: Rc<RefCell<Vec<OutboundRequest>>>,
}

impl ScriptedHttp {
    pub fn reply(&self, url: &str, status: u16, body: &str) {
        self.replies.borrow_mut().insert(
            url.to_string(),
            Ok(OutboundResponse {
                status,
                body: body.to_string(),
            }),
        );
    }

    pub fn fail(&self, url: &str, err: TransportError) {
        self.replies.borrow_mut().insert(url.to_string(), Err(err));
    }

    pub fn calls_to(&self, url: &str) -> Vec<OutboundRequest> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.url == url)
            .cloned()
            .collect()
    }
}

impl HttpClient for ScriptedHttp {
    async fn send(&self, request: OutboundRequest) -> Result<OutboundResponse, TransportError> {
        let url = request.url.clone();
        self.calls.borrow_mut().push(request);
        self.replies
            .borrow()
            .get(&url)
            .cloned()
            .unwrap_or_else(|| Err(TransportError::Connection(format!("no script for {url}"))))
    }
}

/// Keeps every emitted event as serialized JSON.
#[derive(Clone, Default)]
pub struct CaptureSink {
    pub lines: Rc<RefCell<Vec<(Level, Value)>>>,
}

impl CaptureSink {
    pub fn events(&self) -> Vec<String> {
        self.lines
            .borrow()
            .iter()
            .filter_map(|(_, v)| v["event"].as_str().map(str::to_string))
            .collect()
    }

    pub fn raw(&self) -> String {
        self.lines
            .borrow()
            .iter()
            .map(|(_, v)| v.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl EventSink for CaptureSink {
    fn emit(&self, level: Level, event: LogEvent) {
        let value = serde_json::to_value(&event).expect("event serializes");
        self.lines.borrow_mut().push((level, value));
    }
}

pub struct Harness {
    pub store: MemoryStore,
    pub http: ScriptedHttp,
    pub sink: CaptureSink,
}

impl Harness {
    /// Turnstile accepts and the webhook answers 200.
    pub fn happy() -> Self {
        let harness = Self {
            store: MemoryStore::default(),
            http: ScriptedHttp::default(),
            sink: CaptureSink::default(),
        };
        harness.http.reply(SITEVERIFY_URL, 200, r#"{"success":true,"error-codes":[]}"#);
        harness.http.reply(WEBHOOK_URL, 200, r#"{"ok":true}"#);
        harness
    }

    pub fn cors(&self) -> CorsPolicy {
        CorsPolicy::new(vec![
            SITE_ORIGIN.to_string(),
            "https://www.mcadroofcleaning.co.uk".to_string(),
        ])
    }

    pub fn handler(&self) -> TestHandler {
        let sink: Rc<dyn EventSink> = Rc::new(self.sink.clone());
        InquiryHandler::new(
            Some(self.store.clone()),
            Some(TurnstileClient::new(self.http.clone(), TURNSTILE_SECRET)),
            Dispatcher::Webhook(WebhookNotifier::new(
                self.http.clone(),
                WEBHOOK_URL,
                Some("n8n-key".into()),
            )),
            self.cors(),
            sink,
        )
        .with_clock(fixed_now)
    }

    /// Handler built as with `SKIP_VERIFICATION=true`.
    pub fn unverified_handler(&self) -> TestHandler {
        let sink: Rc<dyn EventSink> = Rc::new(self.sink.clone());
        InquiryHandler::new(
            Some(self.store.clone()),
            None,
            Dispatcher::Webhook(WebhookNotifier::new(self.http.clone(), WEBHOOK_URL, None)),
            self.cors(),
            sink,
        )
        .with_clock(fixed_now)
    }

    pub fn router(&self) -> TestRouter {
        let sink: Rc<dyn EventSink> = Rc::new(self.sink.clone());
        Router::new(self.cors(), Some(self.handler()), sink).with_clock(fixed_now)
    }

    pub fn unconfigured_router(&self) -> TestRouter {
        let sink: Rc<dyn EventSink> = Rc::new(self.sink.clone());
        Router::new(self.cors(), None, sink).with_clock(fixed_now)
    }
}

pub fn valid_body() -> Value {
    json!({
        "name": "Jo",
        "email": "jo@x.com",
        "message": "Please call me about a quote",
        "turnstileToken": CLIENT_TOKEN,
    })
}

pub fn post(path: &str, body: &Value) -> ApiRequest {
    ApiRequest::new(Method::Post, path)
        .with_header("Origin", SITE_ORIGIN)
        .with_header("CF-Connecting-IP", "203.0.113.10")
        .with_header("Content-Type", "application/json")
        .with_body(body.to_string())
}

pub fn body_of(response: &inquiry_worker::http::ApiResponse) -> Value {
    response.body.clone().expect("response has a JSON body")
}
