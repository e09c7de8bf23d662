//! Request/response types independent of the JS runtime, plus the CORS and
//! security header policy applied to every response.

use serde::Serialize;
use serde_json::Value;
use worker::Method;

use crate::error::ErrorCode;

pub const CLIENT_IP_HEADER: &str = "CF-Connecting-IP";

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn origin(&self) -> Option<&str> {
        self.header("Origin")
    }

    pub fn client_ip(&self) -> &str {
        self.header(CLIENT_IP_HEADER).unwrap_or("unknown")
    }

    /// Declared body length; unparseable values are ignored.
    pub fn content_length(&self) -> Option<u64> {
        self.header("Content-Length")
            .and_then(|v| v.trim().parse().ok())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiResponse {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: Some(body),
        }
    }

    pub fn empty(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Sets a header, replacing any existing value for the same name.
    pub fn set_header(&mut self, name: &str, value: &str) {
        match self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
    }

    pub fn with_headers(mut self, headers: &[(String, String)]) -> Self {
        for (name, value) in headers {
            self.set_header(name, value);
        }
        self
    }
}

/// Body of every failed response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody<'a> {
    pub success: bool,
    pub error: &'a str,
    pub error_code: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<&'a str>,
}

pub fn error_response(
    code: ErrorCode,
    message: &str,
    request_id: Option<&str>,
    timestamp: Option<&str>,
) -> ApiResponse {
    let body = ErrorBody {
        success: false,
        error: message,
        error_code: code,
        request_id,
        timestamp,
    };
    let body = serde_json::to_value(body).unwrap_or_else(|_| {
        serde_json::json!({ "success": false, "error": message, "errorCode": code.as_str() })
    });
    ApiResponse::json(code.status(), body)
}

/// Origin allow-list and the static security headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsPolicy {
    allowed_origins: Vec<String>,
}

impl CorsPolicy {
    /// `allowed_origins` must be non-empty; the first entry is the fallback.
    pub fn new(allowed_origins: Vec<String>) -> Self {
        debug_assert!(!allowed_origins.is_empty());
        Self { allowed_origins }
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|o| o == origin)
    }

    pub fn default_origin(&self) -> &str {
        self.allowed_origins.first().map(String::as_str).unwrap_or_default()
    }

    /// The request origin when allow-listed, otherwise the default origin.
    pub fn resolve<'a>(&'a self, origin: Option<&'a str>) -> &'a str {
        match origin {
            Some(origin) if self.is_allowed(origin) => origin,
            _ => self.default_origin(),
        }
    }

    pub fn headers(&self, origin: Option<&str>, methods: &str) -> Vec<(String, String)> {
        [
            ("Access-Control-Allow-Origin", self.resolve(origin)),
            ("Access-Control-Allow-Methods", methods),
            ("Access-Control-Allow-Headers", "Content-Type"),
            ("Access-Control-Max-Age", "86400"),
            ("Vary", "Origin"),
            ("X-Content-Type-Options", "nosniff"),
            ("X-Frame-Options", "DENY"),
            ("X-XSS-Protection", "1; mode=block"),
            ("Referrer-Policy", "strict-origin-when-cross-origin"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }
}
