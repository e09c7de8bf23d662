//! Inquiry Worker
//!
//! Cloudflare Worker behind the marketing site's contact form:
//! - `POST /inquiry` validates, rate-limits, verifies (Turnstile) and
//!   forwards submissions to the n8n webhook or MailChannels
//! - `GET /health` and `GET /` for monitoring and discovery
//!
//! The pipeline works on plain [`http::ApiRequest`] / [`http::ApiResponse`]
//! values; only this file touches `worker::Request` and `worker::Response`.

use std::rc::Rc;

use chrono::Utc;
use worker::*;

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod inquiry;
pub mod log;
pub mod notify;
pub mod rate_limit;
pub mod router;
pub mod sanitize;
pub mod transport;
pub mod validate;
pub mod verify;

use crate::config::{Config, NotifyTarget, RATE_LIMIT_BINDING};
use crate::http::{ApiRequest, ApiResponse, CorsPolicy};
use crate::inquiry::{InquiryHandler, MAX_BODY_BYTES};
use crate::log::{ConsoleSink, EventSink};
use crate::notify::{Dispatcher, EmailNotifier, WebhookNotifier};
use crate::router::boundary_failure;
use crate::transport::FetchClient;
use crate::verify::TurnstileClient;

/// Headers the pipeline reads; everything else stays on the JS side.
const FORWARDED_HEADERS: [&str; 4] = ["Origin", "CF-Connecting-IP", "Content-Length", "User-Agent"];

type ApiRouter = router::Router<kv::KvStore, TurnstileClient<FetchClient>, Dispatcher<FetchClient>>;

async fn into_api_request(mut req: Request) -> Result<ApiRequest> {
    let mut api = ApiRequest::new(req.method(), req.path());
    for name in FORWARDED_HEADERS {
        if let Some(value) = req.headers().get(name)? {
            api = api.with_header(name, &value);
        }
    }

    // Declared-oversize bodies are rejected by the handler without being read.
    let declared_too_large = api.content_length().is_some_and(|n| n > MAX_BODY_BYTES);
    if req.method() == Method::Post && !declared_too_large {
        api.body = req.text().await?;
    }
    Ok(api)
}

fn into_response(api: ApiResponse) -> Result<Response> {
    let mut response = match &api.body {
        Some(body) => Response::from_json(body)?,
        None => Response::empty()?,
    };
    for (name, value) in &api.headers {
        response.headers_mut().set(name, value)?;
    }
    Ok(response.with_status(api.status))
}

fn build_router(config: Config, env: &Env, sink: Rc<dyn EventSink>) -> ApiRouter {
    let cors = CorsPolicy::new(config.allowed_origins);
    let settings = config.inquiry;

    let inquiry = if settings.is_configured() {
        let verifier = if settings.skip_verification {
            None
        } else {
            settings
                .turnstile_secret
                .map(|secret| TurnstileClient::new(FetchClient, secret))
        };
        let dispatcher = match settings.notify_target {
            Some(NotifyTarget::Webhook { url, api_key }) => {
                Some(Dispatcher::Webhook(WebhookNotifier::new(FetchClient, url, api_key)))
            }
            Some(NotifyTarget::Email { recipient, sender }) => {
                Some(Dispatcher::Email(EmailNotifier::new(FetchClient, recipient, sender)))
            }
            None => None,
        };
        let store = env.kv(RATE_LIMIT_BINDING).ok();
        dispatcher.map(|d| InquiryHandler::new(store, verifier, d, cors.clone(), sink.clone()))
    } else {
        None
    };

    router::Router::new(cors, inquiry, sink)
}

#[event(fetch)]
async fn main(req: Request, env: Env, _ctx: Context) -> Result<Response> {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    let sink: Rc<dyn EventSink> = Rc::new(ConsoleSink);
    let origin = req.headers().get("Origin").ok().flatten();

    let api = match into_api_request(req).await {
        Ok(api) => api,
        Err(err) => {
            let failure = boundary_failure(
                "REQUEST_READ_ERROR",
                &err.to_string(),
                origin.as_deref(),
                sink.as_ref(),
                Utc::now(),
            );
            return into_response(failure);
        }
    };

    let response = match Config::from_env(&env) {
        Ok(config) => build_router(config, &env, sink.clone()).route(&api).await,
        Err(err) => boundary_failure(
            "CONFIG_ERROR",
            &err.to_string(),
            api.origin(),
            sink.as_ref(),
            Utc::now(),
        ),
    };

    match into_response(response) {
        Ok(response) => Ok(response),
        Err(err) => into_response(boundary_failure(
            "RESPONSE_WRITE_ERROR",
            &err.to_string(),
            api.origin(),
            sink.as_ref(),
            Utc::now(),
        )),
    }
}
