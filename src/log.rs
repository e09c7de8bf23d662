//! Structured request events.
//!
//! Each event is one JSON object per line, carrying at least `timestamp`,
//! `requestId` and `event`. Workers forward console output to `wrangler tail`
//! and Logpush, so the production sink simply writes to the console.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use worker::{console_error, console_log, console_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    pub timestamp: String,
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub event: &'static str,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl LogEvent {
    pub fn new(at: DateTime<Utc>, request_id: &str, event: &'static str) -> Self {
        Self {
            timestamp: format_timestamp(at),
            request_id: request_id.to_string(),
            event,
            fields: Map::new(),
        }
    }

    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }
}

/// Destination for [`LogEvent`]s.
pub trait EventSink {
    fn emit(&self, level: Level, event: LogEvent);
}

/// Writes events to the worker console.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn emit(&self, level: Level, event: LogEvent) {
        let line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(err) => format!(r#"{{"event":"LOG_ENCODE_ERROR","error":"{err}"}}"#),
        };
        match level {
            Level::Info => console_log!("{}", line),
            Level::Warn => console_warn!("{}", line),
            Level::Error => console_error!("{}", line),
        }
    }
}

/// RFC 3339 with millisecond precision and a `Z` suffix.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
