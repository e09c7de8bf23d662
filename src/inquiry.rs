//! The inquiry pipeline.
//!
//! A submission moves through size check, rate limit, parse, validation,
//! sanitizing, Turnstile verification and dispatch, strictly in that order.
//! The first failing step ends the request with a JSON error body; nothing is
//! retried.

use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use worker::Method;

use crate::error::InquiryError;
use crate::http::{error_response, ApiRequest, ApiResponse, CorsPolicy};
use crate::log::{format_timestamp, EventSink, Level, LogEvent};
use crate::notify::{DispatchMetadata, NotifyError, Notifier};
use crate::rate_limit::{RateLimitStore, RateLimiter};
use crate::sanitize::SanitizedSubmission;
use crate::validate::{validate, InquiryFields};
use crate::verify::Verifier;

/// Limit applied to both the declared and the received body size.
pub const MAX_BODY_BYTES: u64 = 10 * 1024;
pub const SUCCESS_MESSAGE: &str = "Thank you! Your inquiry has been sent successfully.";
const HANDLER_METHODS: &str = "POST, OPTIONS";

pub type Clock = fn() -> DateTime<Utc>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    SizeChecked,
    RateChecked,
    Parsed,
    Validated,
    Sanitized,
    Verified,
    Dispatched,
    Responded,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Received => "RECEIVED",
            Stage::SizeChecked => "SIZE_CHECKED",
            Stage::RateChecked => "RATE_CHECKED",
            Stage::Parsed => "PARSED",
            Stage::Validated => "VALIDATED",
            Stage::Sanitized => "SANITIZED",
            Stage::Verified => "VERIFIED",
            Stage::Dispatched => "DISPATCHED",
            Stage::Responded => "RESPONDED",
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SuccessBody<'a> {
    success: bool,
    message: &'a str,
    request_id: &'a str,
}

pub struct InquiryHandler<S, V, N> {
    store: Option<S>,
    limiter: RateLimiter,
    /// `None` skips Turnstile entirely.
    verifier: Option<V>,
    notifier: N,
    cors: CorsPolicy,
    sink: Rc<dyn EventSink>,
    clock: Clock,
}

impl<S, V, N> InquiryHandler<S, V, N>
where
    S: RateLimitStore,
    V: Verifier,
    N: Notifier,
{
    pub fn new(
        store: Option<S>,
        verifier: Option<V>,
        notifier: N,
        cors: CorsPolicy,
        sink: Rc<dyn EventSink>,
    ) -> Self {
        Self {
            store,
            limiter: RateLimiter::default(),
            verifier,
            notifier,
            cors,
            sink,
            clock: Utc::now,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// Runs one request through the pipeline. Always yields a response.
    pub async fn handle(&self, request: &ApiRequest, request_id: &str) -> ApiResponse {
        let cors = self.cors.headers(request.origin(), HANDLER_METHODS);

        if request.method == Method::Options {
            return ApiResponse::empty(204).with_headers(&cors);
        }

        let response = match self.process(request, request_id).await {
            Ok(body) => ApiResponse::json(200, body),
            Err(err) => {
                if let InquiryError::Internal(detail) = &err {
                    self.emit(
                        Level::Error,
                        self.event(request_id, "UNEXPECTED_ERROR")
                            .field("error", detail.as_str())
                            .field("ip", request.client_ip()),
                    );
                }
                error_response(err.code(), &err.public_message(), Some(request_id), None)
            }
        };

        response.with_headers(&cors)
    }

    async fn process(&self, request: &ApiRequest, request_id: &str) -> Result<Value, InquiryError> {
        let ip = request.client_ip();

        self.emit(
            Level::Info,
            self.transition(request_id, Stage::Received, "INQUIRY_REQUEST_START")
                .field("method", request.method.to_string())
                .field("ip", ip)
                .field("userAgent", request.header("User-Agent")),
        );

        if request.method != Method::Post {
            self.emit(
                Level::Warn,
                self.event(request_id, "METHOD_NOT_ALLOWED")
                    .field("method", request.method.to_string()),
            );
            return Err(InquiryError::MethodNotAllowed(request.method.to_string()));
        }

        self.check_size(request, request_id)?;
        self.check_rate(ip, request_id).await?;
        let fields = self.parse(&request.body, request_id)?;

        let report = validate(&fields);
        if !report.valid {
            self.emit(
                Level::Warn,
                self.event(request_id, "VALIDATION_FAILED")
                    .field("errors", report.errors.clone()),
            );
            return Err(InquiryError::Validation(report.errors));
        }
        self.emit(Level::Info, self.transition(request_id, Stage::Validated, "VALIDATED"));

        let submission = SanitizedSubmission::from_fields(&fields);
        self.emit(
            Level::Info,
            self.transition(request_id, Stage::Sanitized, "SANITIZED")
                .field("hasPhone", submission.has_phone()),
        );

        let token = fields.turnstile_token.as_deref().unwrap_or_default();
        self.verify(token, ip, request_id).await?;

        let metadata = DispatchMetadata {
            request_id: request_id.to_string(),
            submitted_at: format_timestamp((self.clock)()),
            client_ip: ip.to_string(),
        };
        self.dispatch(&submission, &metadata).await?;

        let body = serde_json::to_value(SuccessBody {
            success: true,
            message: SUCCESS_MESSAGE,
            request_id,
        })
        .map_err(|e| InquiryError::Internal(e.to_string()))?;

        self.emit(
            Level::Info,
            self.transition(request_id, Stage::Responded, "INQUIRY_SUCCESS")
                .field("email", submission.email.as_str())
                .field("hasPhone", submission.has_phone()),
        );

        Ok(body)
    }

    fn check_size(&self, request: &ApiRequest, request_id: &str) -> Result<(), InquiryError> {
        let declared = request.content_length().unwrap_or(0);
        let actual = request.body.len() as u64;

        let oversized = [declared, actual].into_iter().find(|&n| n > MAX_BODY_BYTES);
        if let Some(size) = oversized {
            self.emit(
                Level::Warn,
                self.event(request_id, "REQUEST_TOO_LARGE")
                    .field("declared", declared)
                    .field("actual", actual),
            );
            return Err(InquiryError::RequestTooLarge(size));
        }

        self.emit(
            Level::Info,
            self.transition(request_id, Stage::SizeChecked, "SIZE_CHECKED").field("bytes", actual),
        );
        Ok(())
    }

    async fn check_rate(&self, ip: &str, request_id: &str) -> Result<(), InquiryError> {
        let Some(store) = &self.store else {
            self.emit(
                Level::Info,
                self.transition(request_id, Stage::RateChecked, "RATE_CHECKED")
                    .field("rateLimit", "unbound"),
            );
            return Ok(());
        };

        let decision = self.limiter.check(store, ip, (self.clock)()).await;

        if let Some(err) = &decision.store_error {
            self.emit(
                Level::Error,
                self.event(request_id, "RATE_LIMIT_STORE_ERROR")
                    .field("error", err.to_string())
                    .field("failOpen", true),
            );
        }

        if !decision.allowed {
            self.emit(
                Level::Warn,
                self.event(request_id, "RATE_LIMIT_EXCEEDED")
                    .field("ip", ip)
                    .field("remaining", decision.remaining),
            );
            return Err(InquiryError::RateLimited(ip.to_string()));
        }

        self.emit(
            Level::Info,
            self.transition(request_id, Stage::RateChecked, "RATE_CHECKED")
                .field("remaining", decision.remaining),
        );
        Ok(())
    }

    fn parse(&self, body: &str, request_id: &str) -> Result<InquiryFields, InquiryError> {
        let parsed = serde_json::from_str::<Value>(body)
            .map_err(|e| e.to_string())
            .and_then(|value| match value {
                Value::Object(_) => {
                    serde_json::from_value::<InquiryFields>(value).map_err(|e| e.to_string())
                }
                _ => Err("expected a JSON object".to_string()),
            });

        match parsed {
            Ok(fields) => {
                self.emit(Level::Info, self.transition(request_id, Stage::Parsed, "PARSED"));
                Ok(fields)
            }
            Err(reason) => {
                self.emit(
                    Level::Error,
                    self.event(request_id, "JSON_PARSE_ERROR")
                        .field("error", reason.as_str()),
                );
                Err(InquiryError::InvalidJson(reason))
            }
        }
    }

    async fn verify(&self, token: &str, ip: &str, request_id: &str) -> Result<(), InquiryError> {
        let Some(verifier) = &self.verifier else {
            self.emit(
                Level::Warn,
                self.transition(request_id, Stage::Verified, "VERIFICATION_SKIPPED"),
            );
            return Ok(());
        };

        self.emit(Level::Info, self.event(request_id, "TURNSTILE_VERIFY_START"));

        let result = match verifier.verify(token, ip).await {
            Ok(result) => result,
            Err(err) => {
                self.emit(
                    Level::Error,
                    self.event(request_id, "TURNSTILE_API_ERROR")
                        .field("error", err.to_string()),
                );
                return Err(err.into());
            }
        };

        if !result.success {
            self.emit(
                Level::Warn,
                self.event(request_id, "TURNSTILE_VERIFICATION_FAILED")
                    .field("errorCodes", result.error_codes.clone()),
            );
            return Err(InquiryError::VerificationRejected(result.error_codes));
        }

        self.emit(
            Level::Info,
            self.transition(request_id, Stage::Verified, "TURNSTILE_VERIFIED"),
        );
        Ok(())
    }

    async fn dispatch(
        &self,
        submission: &SanitizedSubmission,
        metadata: &DispatchMetadata,
    ) -> Result<(), InquiryError> {
        let request_id = metadata.request_id.as_str();
        self.emit(Level::Info, self.event(request_id, "NOTIFY_SEND_START"));

        if let Err(err) = self.notifier.dispatch(submission, metadata).await {
            let event = match &err {
                NotifyError::Timeout(_) => "NOTIFY_TIMEOUT",
                NotifyError::Connection(_) => "NOTIFY_REQUEST_ERROR",
                NotifyError::Rejected { .. } => "NOTIFY_REQUEST_FAILED",
            };
            let mut log = self
                .event(request_id, event)
                .field("error", err.to_string())
                .field("email", submission.email.as_str());
            if let NotifyError::Rejected { status, .. } = &err {
                log = log.field("status", *status);
            }
            self.emit(Level::Error, log);
            return Err(err.into());
        }

        self.emit(Level::Info, self.transition(request_id, Stage::Dispatched, "DISPATCHED"));
        Ok(())
    }

    fn event(&self, request_id: &str, name: &'static str) -> LogEvent {
        LogEvent::new((self.clock)(), request_id, name)
    }

    fn transition(&self, request_id: &str, stage: Stage, name: &'static str) -> LogEvent {
        self.event(request_id, name).field("stage", stage.as_str())
    }

    fn emit(&self, level: Level, event: LogEvent) {
        self.sink.emit(level, event);
    }
}
