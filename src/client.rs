//! Browser-side behaviour of the marketing site, without the DOM.
//!
//! The page script binds these to elements; everything that decides what to
//! show lives here so it can be tested without a browser.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static LOOSE_EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\S+@\S+\.\S+$").expect("loose email pattern compiles"));

/// Fixed navbar height compensated for by the scroll spy.
pub const NAV_OFFSET_PX: f64 = 100.0;

pub const DEFAULT_SUCCESS: &str = "Thank you! Your message has been sent successfully.";
pub const DEFAULT_FAILURE: &str = "An error occurred. Please try again.";
pub const NETWORK_FAILURE: &str = "Network error. Please check your connection and try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Email,
    Phone,
    Message,
    Verification,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: Field,
    pub message: &'static str,
}

/// Turnstile widget state, fed by its success/expired/error callbacks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Verification {
    #[default]
    Pending,
    Verified(String),
    Expired,
    Failed,
}

impl Verification {
    pub fn token(&self) -> Option<&str> {
        match self {
            Verification::Verified(token) => Some(token),
            _ => None,
        }
    }
}

/// Current values of the form inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormInput {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub message: String,
}

/// Body posted to `/inquiry`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InquiryPayload {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub message: String,
    pub turnstile_token: String,
}

pub fn pre_validate(input: &FormInput, verification: &Verification) -> Vec<FieldError> {
    let mut errors = Vec::new();
    let mut require = |field, value: &str, message| {
        if value.trim().is_empty() {
            errors.push(FieldError { field, message });
            false
        } else {
            true
        }
    };

    require(Field::Name, &input.name, "Name is required.");
    let has_email = require(Field::Email, &input.email, "Email is required.");
    require(Field::Phone, &input.phone, "Phone is required.");
    require(Field::Message, &input.message, "Message is required.");

    if has_email && !LOOSE_EMAIL.is_match(input.email.trim()) {
        errors.push(FieldError {
            field: Field::Email,
            message: "Please enter a valid email address.",
        });
    }
    if verification.token().is_none() {
        errors.push(FieldError {
            field: Field::Verification,
            message: "Please complete the security verification.",
        });
    }
    errors
}

#[derive(Debug, Deserialize)]
struct ServerReply {
    #[serde(default)]
    success: bool,
    message: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Success(String),
    Failure(String),
}

impl SubmissionOutcome {
    /// Interprets the `/inquiry` reply body; `Err` means the request never
    /// got an answer.
    pub fn from_reply<E>(reply: Result<&str, E>) -> Self {
        let Ok(body) = reply else {
            return SubmissionOutcome::Failure(NETWORK_FAILURE.to_string());
        };
        match serde_json::from_str::<ServerReply>(body) {
            Ok(r) if r.success => {
                SubmissionOutcome::Success(r.message.unwrap_or_else(|| DEFAULT_SUCCESS.to_string()))
            }
            Ok(r) => SubmissionOutcome::Failure(r.error.unwrap_or_else(|| DEFAULT_FAILURE.to_string())),
            Err(_) => SubmissionOutcome::Failure(NETWORK_FAILURE.to_string()),
        }
    }
}

/// The inquiry form's state between user actions.
#[derive(Debug, Clone, Default)]
pub struct InquiryForm {
    pub verification: Verification,
    submitting: bool,
}

impl InquiryForm {
    pub fn on_verified(&mut self, token: impl Into<String>) {
        self.verification = Verification::Verified(token.into());
    }

    pub fn on_expired(&mut self) {
        self.verification = Verification::Expired;
    }

    pub fn on_error(&mut self) {
        self.verification = Verification::Failed;
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn submit_label(&self) -> &'static str {
        if self.submitting {
            "Sending..."
        } else {
            "Send Inquiry"
        }
    }

    /// Validates locally and, when clean, marks the form busy and returns
    /// the payload to post.
    pub fn begin_submit(&mut self, input: &FormInput) -> Result<InquiryPayload, Vec<FieldError>> {
        let errors = pre_validate(input, &self.verification);
        if !errors.is_empty() {
            return Err(errors);
        }
        let token = self.verification.token().unwrap_or_default().to_string();
        self.submitting = true;
        Ok(InquiryPayload {
            name: input.name.trim().to_string(),
            email: input.email.trim().to_string(),
            phone: input.phone.trim().to_string(),
            message: input.message.trim().to_string(),
            turnstile_token: token,
        })
    }

    /// Turnstile tokens are single-use, so a delivered inquiry resets the widget.
    pub fn finish(&mut self, outcome: &SubmissionOutcome) {
        self.submitting = false;
        if matches!(outcome, SubmissionOutcome::Success(_)) {
            self.verification = Verification::Pending;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectionBounds {
    pub id: String,
    pub top: f64,
    pub height: f64,
}

/// Id of the section under the navbar; later sections win on overlap.
pub fn active_section(scroll_y: f64, sections: &[SectionBounds]) -> Option<&str> {
    let position = scroll_y + NAV_OFFSET_PX;
    sections
        .iter()
        .filter(|s| position >= s.top && position < s.top + s.height)
        .last()
        .map(|s| s.id.as_str())
}

/// Mobile menu toggle. Page scroll is locked while the menu is open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MenuState {
    open: bool,
}

impl MenuState {
    pub fn set_open(&mut self, open: bool) {
        self.open = open;
    }

    pub fn on_link_click(&mut self) {
        self.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn body_scroll_locked(&self) -> bool {
        self.open
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoControls {
    playing: bool,
}

impl VideoControls {
    pub fn play(&mut self) {
        self.playing = true;
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    pub fn play_button_visible(&self) -> bool {
        !self.playing
    }

    pub fn pause_button_visible(&self) -> bool {
        self.playing
    }
}
