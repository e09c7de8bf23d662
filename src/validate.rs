//! Server-side validation of inquiry form fields.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub const NAME_MIN_LEN: usize = 2;
pub const NAME_MAX_LEN: usize = 100;
pub const EMAIL_MAX_LEN: usize = 255;
pub const MESSAGE_MIN_LEN: usize = 10;
pub const MESSAGE_MAX_LEN: usize = 5000;
pub const PHONE_MAX_LEN: usize = 20;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email pattern compiles")
});

static PHONE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9\s+()-]+$").expect("phone pattern compiles"));

/// Raw inquiry as posted by the browser.
///
/// Fields that are present but not JSON strings are treated as missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InquiryFields {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub turnstile_token: Option<String>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => Some(s),
        _ => None,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Trimmed, non-blank value of an optional field.
fn present(field: Option<&String>) -> Option<&str> {
    field.map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// Checks every field and collects one message per violated field.
pub fn validate(fields: &InquiryFields) -> ValidationReport {
    let mut errors = Vec::new();

    match present(fields.name.as_ref()) {
        None => errors.push("Name is required".to_string()),
        Some(name) => {
            let len = name.chars().count();
            if len < NAME_MIN_LEN {
                errors.push(format!("Name must be at least {NAME_MIN_LEN} characters"));
            } else if len > NAME_MAX_LEN {
                errors.push(format!("Name must be less than {NAME_MAX_LEN} characters"));
            }
        }
    }

    match present(fields.email.as_ref()) {
        None => errors.push("Email is required".to_string()),
        Some(email) => {
            if !EMAIL_REGEX.is_match(email) {
                errors.push("Invalid email format".to_string());
            } else if email.chars().count() > EMAIL_MAX_LEN {
                errors.push(format!("Email must be less than {EMAIL_MAX_LEN} characters"));
            }
        }
    }

    match present(fields.message.as_ref()) {
        None => errors.push("Message is required".to_string()),
        Some(message) => {
            let len = message.chars().count();
            if len < MESSAGE_MIN_LEN {
                errors.push(format!(
                    "Message must be at least {MESSAGE_MIN_LEN} characters"
                ));
            } else if len > MESSAGE_MAX_LEN {
                errors.push(format!(
                    "Message must be less than {MESSAGE_MAX_LEN} characters"
                ));
            }
        }
    }

    if present(fields.turnstile_token.as_ref()).is_none() {
        errors.push("Security verification is required".to_string());
    }

    if let Some(phone) = present(fields.phone.as_ref()) {
        if !PHONE_REGEX.is_match(phone) {
            errors.push("Phone number contains invalid characters".to_string());
        } else if phone.chars().count() > PHONE_MAX_LEN {
            errors.push(format!(
                "Phone number must be less than {PHONE_MAX_LEN} characters"
            ));
        }
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
    }
}
