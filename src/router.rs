//! Path dispatch for the API worker.
//!
//! The router owns the cross-origin policy: whatever headers the inquiry
//! handler sets, the router's CORS and security headers win.

use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;
use worker::Method;

use crate::config::DEFAULT_ALLOWED_ORIGINS;
use crate::error::ErrorCode;
use crate::http::{error_response, ApiRequest, ApiResponse, CorsPolicy};
use crate::inquiry::{Clock, InquiryHandler};
use crate::log::{format_timestamp, EventSink, Level, LogEvent};
use crate::notify::Notifier;
use crate::rate_limit::RateLimitStore;
use crate::verify::Verifier;

pub const ROUTER_METHODS: &str = "GET, POST, OPTIONS";
pub const API_NAME: &str = "MCAD Roof Cleaning API";

pub struct Router<S, V, N> {
    cors: CorsPolicy,
    inquiry: Option<InquiryHandler<S, V, N>>,
    sink: Rc<dyn EventSink>,
    clock: Clock,
}

impl<S, V, N> Router<S, V, N>
where
    S: RateLimitStore,
    V: Verifier,
    N: Notifier,
{
    /// `inquiry` is `None` when the pipeline's secrets are not configured.
    pub fn new(
        cors: CorsPolicy,
        inquiry: Option<InquiryHandler<S, V, N>>,
        sink: Rc<dyn EventSink>,
    ) -> Self {
        Self {
            cors,
            inquiry,
            sink,
            clock: Utc::now,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub async fn route(&self, request: &ApiRequest) -> ApiResponse {
        let request_id = Uuid::new_v4().to_string();
        let mut response = self.dispatch(request, &request_id).await;

        for (name, value) in self.cors.headers(request.origin(), ROUTER_METHODS) {
            response.set_header(&name, &value);
        }
        response.set_header("X-Request-ID", &request_id);
        response
    }

    async fn dispatch(&self, request: &ApiRequest, request_id: &str) -> ApiResponse {
        if request.method == Method::Options {
            return ApiResponse::empty(204);
        }

        let ip = request.client_ip();
        self.sink.emit(
            Level::Info,
            self.event(request_id, "ROUTER_REQUEST")
                .field("method", request.method.to_string())
                .field("path", request.path.as_str())
                .field("ip", ip)
                .field("userAgent", request.header("User-Agent")),
        );

        if let Some(origin) = request.origin() {
            if !self.cors.is_allowed(origin) {
                self.sink.emit(
                    Level::Warn,
                    self.event(request_id, "INVALID_ORIGIN")
                        .field("origin", origin)
                        .field("ip", ip),
                );
            }
        }

        match (request.path.as_str(), &request.method) {
            ("/inquiry" | "/inquiry/", _) => self.inquiry(request, request_id).await,
            ("/health" | "/health/", Method::Get) => self.health(request_id),
            ("/" | "", Method::Get) => self.info(request_id),
            (path, _) => {
                self.sink.emit(
                    Level::Warn,
                    self.event(request_id, "PATH_NOT_FOUND")
                        .field("path", path)
                        .field("ip", ip),
                );
                self.error(ErrorCode::NotFound, "Endpoint not found", request_id)
            }
        }
    }

    async fn inquiry(&self, request: &ApiRequest, request_id: &str) -> ApiResponse {
        let Some(handler) = &self.inquiry else {
            self.sink.emit(
                Level::Error,
                self.event(request_id, "SERVICE_NOT_CONFIGURED")
                    .field("service", "inquiry"),
            );
            return self.error(
                ErrorCode::ServiceNotConfigured,
                "Service temporarily unavailable",
                request_id,
            );
        };

        let started = (self.clock)();
        let response = handler.handle(request, request_id).await;
        let elapsed = (self.clock)() - started;

        self.sink.emit(
            Level::Info,
            self.event(request_id, "ROUTE_SUCCESS")
                .field("service", "inquiry")
                .field("status", response.status)
                .field("duration", elapsed.num_milliseconds()),
        );
        response
    }

    fn health(&self, request_id: &str) -> ApiResponse {
        ApiResponse::json(
            200,
            json!({
                "status": "ok",
                "timestamp": format_timestamp((self.clock)()),
                "services": { "inquiry": self.inquiry.is_some() },
                "requestId": request_id,
            }),
        )
    }

    fn info(&self, request_id: &str) -> ApiResponse {
        ApiResponse::json(
            200,
            json!({
                "name": API_NAME,
                "version": env!("CARGO_PKG_VERSION"),
                "status": "operational",
                "timestamp": format_timestamp((self.clock)()),
                "endpoints": {
                    "inquiry": {
                        "path": "/inquiry",
                        "method": "POST",
                        "description": "Submit inquiry form",
                    },
                    "health": {
                        "path": "/health",
                        "method": "GET",
                        "description": "Health check endpoint",
                    },
                },
                "requestId": request_id,
            }),
        )
    }

    fn error(&self, code: ErrorCode, message: &str, request_id: &str) -> ApiResponse {
        let timestamp = format_timestamp((self.clock)());
        error_response(code, message, Some(request_id), Some(&timestamp))
    }

    fn event(&self, request_id: &str, name: &'static str) -> LogEvent {
        LogEvent::new((self.clock)(), request_id, name)
    }
}

/// Response for failures outside the router: configuration that cannot be
/// loaded or a request that cannot be read. Uses the built-in origin list,
/// since the configured one may be what failed.
pub fn boundary_failure(
    event: &'static str,
    error: &str,
    origin: Option<&str>,
    sink: &dyn EventSink,
    now: DateTime<Utc>,
) -> ApiResponse {
    let request_id = Uuid::new_v4().to_string();
    sink.emit(
        Level::Error,
        LogEvent::new(now, &request_id, event).field("error", error),
    );

    let cors = CorsPolicy::new(DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect());
    let timestamp = format_timestamp(now);
    let mut response = error_response(
        ErrorCode::InternalError,
        "Internal server error",
        Some(&request_id),
        Some(&timestamp),
    )
    .with_headers(&cors.headers(origin, ROUTER_METHODS));
    response.set_header("X-Request-ID", &request_id);
    response
}
