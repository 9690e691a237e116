//! Messaging invite sent after a row is appended.
//!
//! Notification is a side effect: its failure is reported per record and
//! never undoes the append.
use crate::config::NotifyConfig;
use crate::form::long_date_label;
use crate::record::RegistrationRecord;
use crate::util::truncate_string;
use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use std::time::Duration;

/// Sends one invite per delivered record.
pub trait Notifier: Send + Sync {
    /// False when no channel is configured; the response then omits the report.
    fn enabled(&self) -> bool;
    fn notify(&self, record: &RegistrationRecord) -> Result<()>;
}

/// No channel configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledNotifier;

impl Notifier for DisabledNotifier {
    fn enabled(&self) -> bool {
        false
    }

    fn notify(&self, _record: &RegistrationRecord) -> Result<()> {
        Err(anyhow!("notifications are disabled"))
    }
}

/// Posts `{ to, message, recordId }` to a messaging gateway webhook.
pub struct WebhookNotifier {
    agent: ureq::Agent,
    url: String,
    token: Option<String>,
}

impl WebhookNotifier {
    pub fn new(config: &NotifyConfig) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_millis(config.timeout_ms)))
            .http_status_as_error(false)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(agent_config),
            url: config.url.clone(),
            token: config.token.clone(),
        }
    }
}

impl Notifier for WebhookNotifier {
    fn enabled(&self) -> bool {
        true
    }

    fn notify(&self, record: &RegistrationRecord) -> Result<()> {
        let payload = serde_json::json!({
            "to": record.phone_number,
            "message": invite_message(record),
            "recordId": record.id,
        });
        let mut request = self.agent.post(&self.url);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        let mut response = request
            .send_json(&payload)
            .map_err(|err| anyhow!("send invite: {err}"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.body_mut().read_to_string().unwrap_or_default();
            return Err(anyhow!(
                "gateway returned HTTP {}: {}",
                status.as_u16(),
                truncate_string(body.trim(), 200)
            ));
        }
        Ok(())
    }
}

/// Invite text for the booked session.
pub fn invite_message(record: &RegistrationRecord) -> String {
    let date = NaiveDate::parse_from_str(&record.preferred_date, "%Y-%m-%d")
        .map(long_date_label)
        .unwrap_or_else(|_| record.preferred_date.clone());
    format!(
        "Hi {}! You're registered for the AI demo session on {date}. Reply to this message if you need to reschedule.",
        record.full_name
    )
}

/// Build the notifier for the configured channel, if any.
pub fn notifier_from_config(config: Option<&NotifyConfig>) -> Box<dyn Notifier> {
    match config {
        Some(config) => Box::new(WebhookNotifier::new(config)),
        None => Box::new(DisabledNotifier),
    }
}
