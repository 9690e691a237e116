//! Five-step signup form.
//!
//! The form is a linear state machine: `next` only advances when the fields
//! owned by the current step validate, `previous` never validates, and a
//! record is only minted from the final step. Validation failures are form
//! state (one message per invalid field), not errors.
use crate::record::{
    format_timestamp, join_phone, mint_record_id, RegistrationRecord, Role, OTHER_REASON,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

pub mod dates;
mod rules;

pub use dates::{available_dates, long_date_label, DateOption, DATE_WINDOW_DAYS};

/// Form steps in the order they are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Name,
    Contact,
    Identity,
    Motivation,
    Schedule,
}

impl Step {
    pub const ALL: [Step; 5] = [
        Step::Name,
        Step::Contact,
        Step::Identity,
        Step::Motivation,
        Step::Schedule,
    ];

    /// One-based position, as shown in "Step N of 5".
    pub fn number(&self) -> usize {
        match self {
            Step::Name => 1,
            Step::Contact => 2,
            Step::Identity => 3,
            Step::Motivation => 4,
            Step::Schedule => 5,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Step::Name => "Let's start with your name",
            Step::Contact => "Your contact information",
            Step::Identity => "Tell us about yourself",
            Step::Motivation => "Why AI interests you",
            Step::Schedule => "Choose your demo date",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Step::Name => "We'd love to know what to call you during our sessions",
            Step::Contact => "We'll use this to send you session reminders and updates",
            Step::Identity => "This helps us tailor the content to your needs",
            Step::Motivation => {
                "Understanding your motivation helps us customize your learning experience"
            }
            Step::Schedule => "Pick a date that works best for your schedule",
        }
    }

    /// Fields collected on this step.
    pub fn fields(&self) -> &'static [Field] {
        match self {
            Step::Name => &[Field::FullName],
            Step::Contact => &[Field::Region, Field::PhoneNumber],
            Step::Identity => &[Field::Email, Field::UserType],
            Step::Motivation => &[Field::Reason, Field::CustomReason],
            Step::Schedule => &[Field::PreferredDate],
        }
    }

    fn following(&self) -> Option<Step> {
        Step::ALL.get(self.number()).copied()
    }

    fn preceding(&self) -> Option<Step> {
        self.number()
            .checked_sub(2)
            .and_then(|idx| Step::ALL.get(idx).copied())
    }
}

/// Input fields collected by the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    FullName,
    Region,
    PhoneNumber,
    Email,
    UserType,
    Reason,
    CustomReason,
    PreferredDate,
}

impl Field {
    /// Return the stable camelCase key used in error maps and JSON output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::FullName => "fullName",
            Field::Region => "region",
            Field::PhoneNumber => "phoneNumber",
            Field::Email => "email",
            Field::UserType => "userType",
            Field::Reason => "reason",
            Field::CustomReason => "customReason",
            Field::PreferredDate => "preferredDate",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field-level validation messages, at most one per field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<Field, String>);

impl FieldErrors {
    pub fn insert(&mut self, field: Field, message: &str) {
        self.0.insert(field, message.to_string());
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn clear(&mut self, field: Field) {
        self.0.remove(&field);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> + '_ {
        self.0.iter().map(|(field, message)| (*field, message.as_str()))
    }
}

/// Raw values as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    pub full_name: String,
    pub region: String,
    pub phone_number: String,
    pub email: String,
    pub user_type: Option<Role>,
    pub reason: String,
    pub custom_reason: String,
    pub preferred_date: String,
}

/// Why a submission attempt did not produce a record.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("a submission is already in flight")]
    InFlight,
    #[error("submission is only available on the final step (currently step {0})")]
    NotAtFinalStep(usize),
    #[error("step {step} has {count} invalid field(s)")]
    Invalid { step: usize, count: usize },
}

/// Multi-step signup form state.
#[derive(Debug, Clone)]
pub struct SignupForm {
    step: Step,
    data: FormData,
    errors: FieldErrors,
    dates: Vec<DateOption>,
    submitting: bool,
}

impl SignupForm {
    /// Start a new form whose date window begins the day after `today`.
    pub fn new(today: NaiveDate) -> Self {
        Self {
            step: Step::Name,
            data: FormData::default(),
            errors: FieldErrors::default(),
            dates: available_dates(today),
            submitting: false,
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn data(&self) -> &FormData {
        &self.data
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn dates(&self) -> &[DateOption] {
        &self.dates
    }

    /// True while a submission is outstanding; the submit control stays disabled.
    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Return `(current, total)` for progress display.
    pub fn progress(&self) -> (usize, usize) {
        (self.step.number(), Step::ALL.len())
    }

    /// Update one field and clear that field's previous error.
    ///
    /// A role that does not name one of the catalogued roles leaves the role
    /// unset, which the identity step then reports.
    pub fn set(&mut self, field: Field, value: &str) {
        let value = value.to_string();
        match field {
            Field::FullName => self.data.full_name = value,
            Field::Region => self.data.region = value,
            Field::PhoneNumber => self.data.phone_number = value,
            Field::Email => self.data.email = value,
            Field::UserType => self.data.user_type = value.parse().ok(),
            Field::Reason => self.data.reason = value,
            Field::CustomReason => self.data.custom_reason = value,
            Field::PreferredDate => self.data.preferred_date = value,
        }
        self.errors.clear(field);
    }

    /// Select a role directly.
    pub fn set_role(&mut self, role: Role) {
        self.data.user_type = Some(role);
        self.errors.clear(Field::UserType);
    }

    /// Validate the current step and advance when it passes.
    ///
    /// Returns whether the step changed. On the final step there is nothing
    /// to advance to; use [`SignupForm::begin_submit`] instead.
    pub fn next(&mut self) -> bool {
        if !self.validate_current() {
            return false;
        }
        match self.step.following() {
            Some(step) => {
                self.step = step;
                true
            }
            None => false,
        }
    }

    /// Step back without validating. A no-op on the first step.
    pub fn previous(&mut self) {
        if let Some(step) = self.step.preceding() {
            self.step = step;
        }
    }

    /// Re-run the current step's rules, replacing the visible errors.
    pub fn validate_current(&mut self) -> bool {
        self.errors = rules::validate_step(self.step, &self.data, &self.dates);
        self.errors.is_empty()
    }

    /// Mint a record from the final step and mark the form as submitting.
    ///
    /// Every step is re-checked, since fields from earlier steps can still be
    /// edited while the final step is showing; the first failing step becomes
    /// current with its errors surfaced.
    pub fn begin_submit(&mut self, now: DateTime<Utc>) -> Result<RegistrationRecord, SubmitError> {
        if self.submitting {
            return Err(SubmitError::InFlight);
        }
        if self.step != Step::Schedule {
            return Err(SubmitError::NotAtFinalStep(self.step.number()));
        }
        for step in Step::ALL {
            let errors = rules::validate_step(step, &self.data, &self.dates);
            if !errors.is_empty() {
                let count = errors.len();
                self.step = step;
                self.errors = errors;
                return Err(SubmitError::Invalid {
                    step: step.number(),
                    count,
                });
            }
        }
        self.errors = FieldErrors::default();
        let Some(user_type) = self.data.user_type else {
            return Err(SubmitError::Invalid {
                step: Step::Identity.number(),
                count: 1,
            });
        };
        let reason = if self.data.reason.trim() == OTHER_REASON {
            self.data.custom_reason.trim().to_string()
        } else {
            self.data.reason.trim().to_string()
        };
        self.submitting = true;
        Ok(RegistrationRecord {
            id: mint_record_id(now),
            full_name: self.data.full_name.trim().to_string(),
            phone_number: join_phone(&self.data.region, &self.data.phone_number),
            email: self.data.email.trim().to_string(),
            user_type,
            reason,
            preferred_date: self.data.preferred_date.trim().to_string(),
            signup_timestamp: format_timestamp(now),
        })
    }

    /// Re-enable submission once the outstanding attempt has completed.
    pub fn finish_submit(&mut self) {
        self.submitting = false;
    }
}
