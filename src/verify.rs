//! Cloudflare Turnstile token verification.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transport::{HttpClient, OutboundRequest, OutboundResponse};

pub const SITEVERIFY_URL: &str = "https://challenges.cloudflare.com/turnstile/v0/siteverify";

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct VerificationResult {
    pub success: bool,
    #[serde(rename = "error-codes", default)]
    pub error_codes: Vec<String>,
}

/// The verification service could not give an answer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("siteverify unreachable: {0}")]
    Unreachable(String),

    #[error("siteverify returned {0}")]
    Status(u16),

    #[error("siteverify response unreadable: {0}")]
    Malformed(String),
}

#[allow(async_fn_in_trait)]
pub trait Verifier {
    /// `Ok` carries the service's verdict, which may itself be a rejection.
    async fn verify(&self, token: &str, client_ip: &str) -> Result<VerificationResult, VerifyError>;
}

#[derive(Serialize)]
struct SiteverifyBody<'a> {
    secret: &'a str,
    response: &'a str,
    remoteip: &'a str,
}

pub struct TurnstileClient<H> {
    http: H,
    secret: String,
    endpoint: String,
}

impl<H: HttpClient> TurnstileClient<H> {
    pub fn new(http: H, secret: impl Into<String>) -> Self {
        Self {
            http,
            secret: secret.into(),
            endpoint: SITEVERIFY_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl<H: HttpClient> Verifier for TurnstileClient<H> {
    async fn verify(&self, token: &str, client_ip: &str) -> Result<VerificationResult, VerifyError> {
        let body = serde_json::to_string(&SiteverifyBody {
            secret: &self.secret,
            response: token,
            remoteip: client_ip,
        })
        .map_err(|e| VerifyError::Malformed(e.to_string()))?;

        let response = self
            .http
            .send(OutboundRequest::post_json(&self.endpoint, body))
            .await
            .map_err(|e| VerifyError::Unreachable(e.to_string()))?;

        parse_siteverify(&response)
    }
}

pub fn parse_siteverify(response: &OutboundResponse) -> Result<VerificationResult, VerifyError> {
    if !response.is_success() {
        return Err(VerifyError::Status(response.status));
    }
    serde_json::from_str(&response.body).map_err(|e| VerifyError::Malformed(e.to_string()))
}
