//! Read-only admin dashboard over the local mirror.
//!
//! Access goes through an injected [`CredentialVerifier`], so the trust
//! boundary can be swapped without touching the dashboard.
use crate::config::AdminConfig;
use crate::form::long_date_label;
use crate::mirror::{LocalMirror, MirrorBackend};
use crate::record::{RegistrationRecord, Role};
use chrono::NaiveDate;
use serde::Serialize;

/// Decides whether a username/password pair grants admin access.
pub trait CredentialVerifier {
    fn verify(&self, username: &str, password: &str) -> bool;
}

/// Compares against a single configured pair. With no pair, nothing verifies.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    pair: Option<(String, String)>,
}

impl StaticCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            pair: Some((username.into(), password.into())),
        }
    }

    pub fn from_config(config: &AdminConfig) -> Self {
        match (&config.username, &config.password) {
            (Some(username), Some(password)) => Self::new(username.clone(), password.clone()),
            _ => Self::default(),
        }
    }
}

impl CredentialVerifier for StaticCredentials {
    fn verify(&self, username: &str, password: &str) -> bool {
        match &self.pair {
            Some((expected_user, expected_pass)) => {
                username == expected_user && password == expected_pass
            }
            None => false,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LoginError {
    #[error("Invalid credentials")]
    InvalidCredentials,
}

/// Proof of a successful login. Dropping it logs out.
#[derive(Debug)]
pub struct AdminSession {
    username: String,
}

impl AdminSession {
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Aggregate counts and the per-date grouping.
    pub fn summary<B: MirrorBackend>(&self, mirror: &LocalMirror<B>) -> AdminSummary {
        let dates: Vec<DateGroup> = mirror
            .group_by_date()
            .into_iter()
            .map(|(date, records)| DateGroup::new(date, &records))
            .collect();
        AdminSummary {
            total_registrations: mirror.len(),
            scheduled_sessions: dates.len(),
            dates,
        }
    }

    /// Full record for the detail view.
    pub fn detail<'a, B: MirrorBackend>(
        &self,
        mirror: &'a LocalMirror<B>,
        id: &str,
    ) -> Option<&'a RegistrationRecord> {
        mirror.find(id)
    }
}

/// Check credentials and open a session.
pub fn login(
    verifier: &dyn CredentialVerifier,
    username: &str,
    password: &str,
) -> Result<AdminSession, LoginError> {
    if verifier.verify(username, password) {
        tracing::info!(username, "admin login");
        Ok(AdminSession {
            username: username.to_string(),
        })
    } else {
        tracing::warn!(username, "admin login rejected");
        Err(LoginError::InvalidCredentials)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AdminSummary {
    pub total_registrations: usize,
    pub scheduled_sessions: usize,
    pub dates: Vec<DateGroup>,
}

/// Participants booked for one demo date.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DateGroup {
    pub date: String,
    pub label: String,
    pub participants: Vec<ParticipantRow>,
}

impl DateGroup {
    fn new(date: &str, records: &[&RegistrationRecord]) -> Self {
        let label = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map(long_date_label)
            .unwrap_or_else(|_| date.to_string());
        Self {
            date: date.to_string(),
            label,
            participants: records.iter().map(|record| ParticipantRow::from(*record)).collect(),
        }
    }

    /// "1 participant" / "N participants".
    pub fn count_label(&self) -> String {
        match self.participants.len() {
            1 => "1 participant".to_string(),
            n => format!("{n} participants"),
        }
    }
}

/// One line in a date group.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ParticipantRow {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub phone_number: String,
    pub user_type: Role,
    /// Calendar day the registration was made, from the signup timestamp.
    pub registered_on: String,
}

impl From<&RegistrationRecord> for ParticipantRow {
    fn from(record: &RegistrationRecord) -> Self {
        let registered_on = record
            .signup_timestamp
            .split('T')
            .next()
            .unwrap_or_default()
            .to_string();
        Self {
            id: record.id.clone(),
            full_name: record.full_name.clone(),
            email: record.email.clone(),
            phone_number: record.phone_number.clone(),
            user_type: record.user_type,
            registered_on,
        }
    }
}
