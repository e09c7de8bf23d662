//! Delivery of accepted inquiries to the automation webhook or by email.

use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::sanitize::SanitizedSubmission;
use crate::transport::{HttpClient, OutboundRequest, TransportError};

pub const DISPATCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const MAILCHANNELS_URL: &str = "https://api.mailchannels.net/tx/v1/send";

/// Request context forwarded alongside the submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchMetadata {
    pub request_id: String,
    pub submitted_at: String,
    pub client_ip: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("dispatch timed out after {0:?}")]
    Timeout(Duration),

    #[error("dispatch connection failed: {0}")]
    Connection(String),

    #[error("dispatch rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl From<TransportError> for NotifyError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout(after) => NotifyError::Timeout(after),
            TransportError::Connection(reason) => NotifyError::Connection(reason),
        }
    }
}

#[allow(async_fn_in_trait)]
pub trait Notifier {
    async fn dispatch(
        &self,
        submission: &SanitizedSubmission,
        metadata: &DispatchMetadata,
    ) -> Result<(), NotifyError>;
}

async fn deliver<H: HttpClient>(http: &H, request: OutboundRequest) -> Result<(), NotifyError> {
    let response = http.send(request.timeout(DISPATCH_TIMEOUT)).await?;
    if response.is_success() {
        Ok(())
    } else {
        Err(NotifyError::Rejected {
            status: response.status,
            body: response.body,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookPayload<'a> {
    name: &'a str,
    email: &'a str,
    phone: &'a str,
    message: &'a str,
    request_id: &'a str,
    submitted_at: &'a str,
    #[serde(rename = "clientIP")]
    client_ip: &'a str,
}

/// Posts the submission as JSON to an n8n-style webhook.
pub struct WebhookNotifier<H> {
    http: H,
    url: String,
    api_key: Option<String>,
}

impl<H: HttpClient> WebhookNotifier<H> {
    pub fn new(http: H, url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            url: url.into(),
            api_key,
        }
    }

    fn request(
        &self,
        submission: &SanitizedSubmission,
        metadata: &DispatchMetadata,
    ) -> Result<OutboundRequest, NotifyError> {
        let body = serde_json::to_string(&WebhookPayload {
            name: &submission.name,
            email: &submission.email,
            phone: &submission.phone,
            message: &submission.message,
            request_id: &metadata.request_id,
            submitted_at: &metadata.submitted_at,
            client_ip: &metadata.client_ip,
        })
        .map_err(|e| NotifyError::Connection(e.to_string()))?;

        let request = OutboundRequest::post_json(&self.url, body);
        Ok(match &self.api_key {
            Some(key) => request.header("X-API-Key", key),
            None => request,
        })
    }
}

impl<H: HttpClient> Notifier for WebhookNotifier<H> {
    async fn dispatch(
        &self,
        submission: &SanitizedSubmission,
        metadata: &DispatchMetadata,
    ) -> Result<(), NotifyError> {
        deliver(&self.http, self.request(submission, metadata)?).await
    }
}

/// Sends the submission as an HTML email through MailChannels.
pub struct EmailNotifier<H> {
    http: H,
    recipient: String,
    sender: String,
    sender_name: String,
}

impl<H: HttpClient> EmailNotifier<H> {
    pub fn new(http: H, recipient: impl Into<String>, sender: impl Into<String>) -> Self {
        Self {
            http,
            recipient: recipient.into(),
            sender: sender.into(),
            sender_name: "MCAD Roof Cleaning Website".to_string(),
        }
    }

    fn message(&self, submission: &SanitizedSubmission, metadata: &DispatchMetadata) -> serde_json::Value {
        let mut html = String::from("<h2>New Inquiry Submission</h2>\n");
        html.push_str(&format!("<p><strong>Name:</strong> {}</p>\n", escape_html(&submission.name)));
        html.push_str(&format!("<p><strong>Email:</strong> {}</p>\n", escape_html(&submission.email)));
        if submission.has_phone() {
            html.push_str(&format!("<p><strong>Phone:</strong> {}</p>\n", escape_html(&submission.phone)));
        }
        html.push_str("<p><strong>Message:</strong></p>\n");
        html.push_str(&format!("<p>{}</p>\n", escape_html(&submission.message)));
        html.push_str(&format!(
            "<p><small>Request {} at {}</small></p>",
            escape_html(&metadata.request_id),
            escape_html(&metadata.submitted_at)
        ));

        json!({
            "personalizations": [{ "to": [{ "email": self.recipient }] }],
            "from": { "email": self.sender, "name": self.sender_name },
            "reply_to": { "email": submission.email, "name": submission.name },
            "subject": format!("New Inquiry from {}", submission.name),
            "content": [{ "type": "text/html", "value": html }],
        })
    }
}

impl<H: HttpClient> Notifier for EmailNotifier<H> {
    async fn dispatch(
        &self,
        submission: &SanitizedSubmission,
        metadata: &DispatchMetadata,
    ) -> Result<(), NotifyError> {
        let body = self.message(submission, metadata).to_string();
        deliver(&self.http, OutboundRequest::post_json(MAILCHANNELS_URL, body)).await
    }
}

/// The configured delivery target.
pub enum Dispatcher<H> {
    Webhook(WebhookNotifier<H>),
    Email(EmailNotifier<H>),
}

impl<H: HttpClient> Notifier for Dispatcher<H> {
    async fn dispatch(
        &self,
        submission: &SanitizedSubmission,
        metadata: &DispatchMetadata,
    ) -> Result<(), NotifyError> {
        match self {
            Dispatcher::Webhook(n) => n.dispatch(submission, metadata).await,
            Dispatcher::Email(n) => n.dispatch(submission, metadata).await,
        }
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
