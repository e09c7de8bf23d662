//! Worker configuration from secrets, vars and bindings.

use worker::Env;

use crate::error::ConfigError;

pub const DEFAULT_ALLOWED_ORIGINS: [&str; 2] = [
    "https://mcadroofcleaning.co.uk",
    "https://www.mcadroofcleaning.co.uk",
];
pub const DEFAULT_RECIPIENT: &str = "info@mcadroofcleaning.co.uk";
pub const DEFAULT_SENDER: &str = "noreply@mcadroofcleaning.co.uk";
pub const RATE_LIMIT_BINDING: &str = "RATE_LIMIT_KV";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyTarget {
    Webhook { url: String, api_key: Option<String> },
    Email { recipient: String, sender: String },
}

/// Behaviour switches for the inquiry pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InquirySettings {
    /// Accept submissions without calling Turnstile. Local testing only.
    pub skip_verification: bool,
    pub turnstile_secret: Option<String>,
    /// `None` when the selected target lacks its required settings.
    pub notify_target: Option<NotifyTarget>,
}

impl InquirySettings {
    pub fn is_configured(&self) -> bool {
        (self.skip_verification || self.turnstile_secret.is_some()) && self.notify_target.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub allowed_origins: Vec<String>,
    pub inquiry: InquirySettings,
}

impl Config {
    pub fn from_env(env: &Env) -> Result<Self, ConfigError> {
        Self::from_lookup(|name| {
            env.secret(name)
                .map(|s| s.to_string())
                .or_else(|_| env.var(name).map(|v| v.to_string()))
                .ok()
        })
    }

    /// Builds the config from any name → value lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let allowed_origins = match get("CORS_ORIGIN") {
            None => DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect(),
            Some(list) => {
                let origins: Vec<String> = list
                    .split(',')
                    .map(|o| o.trim().trim_end_matches('/').to_string())
                    .filter(|o| !o.is_empty())
                    .collect();
                if origins.is_empty() {
                    return Err(ConfigError::EmptyOriginList { name: "CORS_ORIGIN" });
                }
                origins
            }
        };

        let skip_verification = match get("SKIP_VERIFICATION").as_deref() {
            None | Some("false") | Some("0") => false,
            Some("true") | Some("1") => true,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    name: "SKIP_VERIFICATION",
                    expected: "true or false",
                    value: other.to_string(),
                })
            }
        };

        let notify_target = match get("NOTIFY_TARGET").as_deref() {
            None | Some("webhook") => get("N8N_WEBHOOK_URL").map(|url| NotifyTarget::Webhook {
                url,
                api_key: get("N8N_API_KEY"),
            }),
            Some("email") => Some(NotifyTarget::Email {
                recipient: get("RECIPIENT_EMAIL").unwrap_or_else(|| DEFAULT_RECIPIENT.to_string()),
                sender: get("SENDER_EMAIL").unwrap_or_else(|| DEFAULT_SENDER.to_string()),
            }),
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    name: "NOTIFY_TARGET",
                    expected: "webhook or email",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            allowed_origins,
            inquiry: InquirySettings {
                skip_verification,
                turnstile_secret: get("TURNSTILE_SECRET_KEY"),
                notify_target,
            },
        })
    }
}
