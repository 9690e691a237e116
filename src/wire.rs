//! JSON bodies exchanged with the delivery endpoint.
//!
//! The target sheet is server-side configuration; callers only send records.
use crate::record::RegistrationRecord;
use serde::{Deserialize, Serialize};

/// Path the delivery endpoint is mounted at, relative to the base URL.
pub const DELIVERY_PATH: &str = "/api/registrations";

/// Message returned by the health probe.
pub const HEALTH_MESSAGE: &str = "The web app is working correctly. Use POST to send data.";

/// `POST` body: a batch of records, appended in array order.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct DeliveryRequest {
    pub data: Vec<RegistrationRecord>,
}

/// Endpoint response for both delivery and the health probe.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct DeliveryResponse {
    pub success: bool,
    pub message: String,
    /// Absent when no notification channel is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whatsapp: Option<NotificationReport>,
}

impl DeliveryResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            whatsapp: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            whatsapp: None,
        }
    }

    /// True when notifications ran and the first record's notification succeeded.
    ///
    /// Batches sent by the form always hold a single record.
    pub fn notification_sent(&self) -> bool {
        self.whatsapp.as_ref().is_some_and(|report| {
            report.enabled && report.results.first().is_some_and(|result| result.success)
        })
    }
}

/// Per-batch notification outcome.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct NotificationReport {
    pub enabled: bool,
    #[serde(default)]
    pub results: Vec<NotificationResult>,
}

/// Per-record notification outcome, in batch order.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResult {
    pub success: bool,
    #[serde(default)]
    pub record_id: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
