//! Per-step validation rules.
use super::{Field, FieldErrors, FormData, Step};
use crate::form::dates::DateOption;
use crate::record::{is_known_region, OTHER_REASON};
use regex::Regex;
use std::sync::OnceLock;

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[\d\s\-()]{7,}$").expect("phone pattern compiles"))
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"))
}

/// Validate the fields owned by `step`, one message per invalid field.
pub(super) fn validate_step(step: Step, data: &FormData, dates: &[DateOption]) -> FieldErrors {
    let mut errors = FieldErrors::default();
    match step {
        Step::Name => {
            if data.full_name.trim().is_empty() {
                errors.insert(Field::FullName, "Full name is required");
            }
        }
        Step::Contact => {
            if !is_known_region(data.region.trim()) {
                errors.insert(Field::Region, "Please select your region");
            }
            let phone = data.phone_number.trim();
            if phone.is_empty() {
                errors.insert(Field::PhoneNumber, "Phone number is required");
            } else if !phone_pattern().is_match(phone) {
                errors.insert(Field::PhoneNumber, "Please enter a valid phone number");
            }
        }
        Step::Identity => {
            let email = data.email.trim();
            if email.is_empty() {
                errors.insert(Field::Email, "Email is required");
            } else if !email_pattern().is_match(email) {
                errors.insert(Field::Email, "Please enter a valid email address");
            }
            if data.user_type.is_none() {
                errors.insert(Field::UserType, "Please select your role");
            }
        }
        Step::Motivation => {
            let reason = data.reason.trim();
            if reason.is_empty() {
                errors.insert(Field::Reason, "Please select a reason");
            } else if reason == OTHER_REASON && data.custom_reason.trim().is_empty() {
                errors.insert(Field::CustomReason, "Please specify your reason");
            }
        }
        Step::Schedule => {
            let chosen = data.preferred_date.trim();
            if chosen.is_empty() || !dates.iter().any(|option| option.value == chosen) {
                errors.insert(Field::PreferredDate, "Please select a preferred date");
            }
        }
    }
    errors
}
