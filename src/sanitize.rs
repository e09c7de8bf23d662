//! Normalisation of accepted inquiry fields before they leave the worker.

use serde::Serialize;

use crate::validate::{InquiryFields, EMAIL_MAX_LEN, MESSAGE_MAX_LEN, NAME_MAX_LEN, PHONE_MAX_LEN};

/// Trim, truncate to `max_len` characters, drop NUL bytes and collapse
/// whitespace runs to a single space.
///
/// Collapsing also removes whitespace left at either end after truncation
/// or NUL removal, so the result is a fixed point: sanitizing it again
/// returns it unchanged.
pub fn sanitize(value: Option<&str>, max_len: usize) -> String {
    let Some(value) = value.filter(|v| !v.is_empty()) else {
        return String::new();
    };

    let truncated: String = value.trim_matches(is_space).chars().take(max_len).collect();
    let without_nul = truncated.replace('\0', "");
    without_nul
        .split(is_space)
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Unicode whitespace plus the byte order mark, which browsers count as
/// whitespace when trimming form input.
fn is_space(c: char) -> bool {
    c.is_whitespace() || c == '\u{FEFF}'
}

/// Inquiry fields as forwarded downstream. `phone` is empty when not given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SanitizedSubmission {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub message: String,
}

impl SanitizedSubmission {
    pub fn from_fields(fields: &InquiryFields) -> Self {
        Self {
            name: sanitize(fields.name.as_deref(), NAME_MAX_LEN),
            email: sanitize(fields.email.as_deref(), EMAIL_MAX_LEN),
            phone: sanitize(fields.phone.as_deref(), PHONE_MAX_LEN),
            message: sanitize(fields.message.as_deref(), MESSAGE_MAX_LEN),
        }
    }

    pub fn has_phone(&self) -> bool {
        !self.phone.is_empty()
    }
}
