//! Delivery endpoint: appends registration batches to the configured sheet.
//!
//! A batch either parses and opens the store, or the whole request fails.
//! Once rows are flowing, each record is appended in batch order and then
//! notified; notification outcomes are reported per record and never roll
//! back the append.
use crate::record::RegistrationRecord;
use crate::wire::{DeliveryRequest, DeliveryResponse, NotificationReport, NotificationResult};
use std::sync::Mutex;
use std::time::Instant;

pub mod notify;
pub mod server;
pub mod sheet;

pub use notify::{notifier_from_config, DisabledNotifier, Notifier, WebhookNotifier};
pub use server::{router, serve};
pub use sheet::{Cell, CellFormat, FileWorkbook, MemoryWorkbook, SheetStore, HEADER_ROW};

/// Message returned when a batch was appended.
pub const SUCCESS_MESSAGE: &str = "Data added successfully";

/// Request-level failures; all of them fail the whole batch.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("invalid payload: {0}")]
    Payload(String),
    #[error("target store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("append failed: {0}")]
    Append(String),
}

impl EndpointError {
    /// HTTP status carried with the failure body.
    pub fn status_code(&self) -> u16 {
        match self {
            EndpointError::Payload(_) => 400,
            EndpointError::StoreUnavailable(_) | EndpointError::Append(_) => 500,
        }
    }

    pub fn to_response(&self) -> DeliveryResponse {
        DeliveryResponse::failed(format!("Error: {self}"))
    }
}

/// Sheet store plus notification channel behind the endpoint.
pub struct DeliveryService {
    store: Box<dyn SheetStore>,
    notifier: Box<dyn Notifier>,
    sheet_name: String,
    /// Held for a whole batch so concurrent requests cannot interleave rows.
    batch_lock: Mutex<()>,
}

impl DeliveryService {
    pub fn new(
        store: Box<dyn SheetStore>,
        notifier: Box<dyn Notifier>,
        sheet_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            notifier,
            sheet_name: sheet_name.into(),
            batch_lock: Mutex::new(()),
        }
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    pub fn store(&self) -> &dyn SheetStore {
        self.store.as_ref()
    }

    /// Parse a `{ data: [...] }` body.
    pub fn parse_batch(body: &[u8]) -> Result<Vec<RegistrationRecord>, EndpointError> {
        let request: DeliveryRequest =
            serde_json::from_slice(body).map_err(|err| EndpointError::Payload(err.to_string()))?;
        Ok(request.data)
    }

    /// Parse and deliver a raw body, returning the status and response body.
    pub fn handle(&self, body: &[u8]) -> (u16, DeliveryResponse) {
        let result = Self::parse_batch(body).and_then(|batch| self.deliver(&batch));
        match result {
            Ok(response) => (200, response),
            Err(err) => {
                tracing::warn!(error = %err, "delivery request failed");
                (err.status_code(), err.to_response())
            }
        }
    }

    /// Append `batch` to the sheet in order, notifying after each append.
    pub fn deliver(&self, batch: &[RegistrationRecord]) -> Result<DeliveryResponse, EndpointError> {
        let start = Instant::now();
        let _batch = self
            .batch_lock
            .lock()
            .map_err(|_| EndpointError::StoreUnavailable("batch lock poisoned".to_string()))?;
        self.store
            .open()
            .map_err(|err| EndpointError::StoreUnavailable(format!("{err:#}")))?;
        let last_row = self
            .store
            .last_row(&self.sheet_name)
            .map_err(|err| EndpointError::StoreUnavailable(format!("{err:#}")))?;
        if last_row == 0 {
            self.store
                .append_row(&self.sheet_name, &sheet::header_cells())
                .map_err(|err| EndpointError::Append(format!("{err:#}")))?;
            tracing::info!(sheet = %self.sheet_name, "wrote header row");
        }

        let notifications_enabled = self.notifier.enabled();
        let mut results = Vec::new();
        for record in batch {
            self.store
                .append_row(&self.sheet_name, &sheet::record_cells(record))
                .map_err(|err| EndpointError::Append(format!("{err:#}")))?;
            if notifications_enabled {
                results.push(self.notify_one(record));
            }
        }

        tracing::info!(
            rows = batch.len(),
            sheet = %self.sheet_name,
            notified = results.iter().filter(|result| result.success).count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "batch appended"
        );
        let mut response = DeliveryResponse::ok(SUCCESS_MESSAGE);
        if notifications_enabled {
            response.whatsapp = Some(NotificationReport {
                enabled: true,
                results,
            });
        }
        Ok(response)
    }

    fn notify_one(&self, record: &RegistrationRecord) -> NotificationResult {
        let outcome = self.notifier.notify(record);
        if let Err(err) = &outcome {
            tracing::warn!(record_id = %record.id, error = %err, "notification failed");
        }
        NotificationResult {
            success: outcome.is_ok(),
            record_id: record.id.clone(),
            phone_number: record.phone_number.clone(),
            error: outcome.err().map(|err| format!("{err:#}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Role;
    use anyhow::{anyhow, Result};

    fn record(id: &str, name: &str) -> RegistrationRecord {
        RegistrationRecord {
            id: id.to_string(),
            full_name: name.to_string(),
            phone_number: "+91 9876543210".to_string(),
            email: format!("{id}@example.org"),
            user_type: Role::Guardian,
            reason: "Help with school projects and homework".to_string(),
            preferred_date: "2026-10-18".to_string(),
            signup_timestamp: "2026-10-16T09:30:00.000Z".to_string(),
        }
    }

    /// Fails for records whose id is listed.
    struct ScriptedNotifier {
        failing: Vec<String>,
        sent: Mutex<Vec<String>>,
    }

    impl Notifier for ScriptedNotifier {
        fn enabled(&self) -> bool {
            true
        }

        fn notify(&self, record: &RegistrationRecord) -> Result<()> {
            if self.failing.contains(&record.id) {
                return Err(anyhow!("gateway rejected {}", record.id));
            }
            self.sent
                .lock()
                .map_err(|_| anyhow!("poisoned"))?
                .push(record.id.clone());
            Ok(())
        }
    }

    struct UnreachableStore;

    impl SheetStore for UnreachableStore {
        fn open(&self) -> Result<()> {
            Err(anyhow!("spreadsheet not found"))
        }
        fn last_row(&self, _sheet: &str) -> Result<usize> {
            unreachable!("store never opens")
        }
        fn append_row(&self, _sheet: &str, _cells: &[Cell]) -> Result<()> {
            unreachable!("store never opens")
        }
        fn rows(&self, _sheet: &str) -> Result<Vec<Vec<Cell>>> {
            Ok(Vec::new())
        }
    }

    fn service_with(notifier: Box<dyn Notifier>) -> DeliveryService {
        DeliveryService::new(
            Box::new(MemoryWorkbook::default()),
            notifier,
            "Registrations",
        )
    }

    #[test]
    fn header_written_once_then_rows_in_batch_order() {
        let service = service_with(Box::new(DisabledNotifier));
        let response = service
            .deliver(&[record("1", "Ada"), record("2", "Grace")])
            .expect("deliver first batch");
        assert_eq!(response, DeliveryResponse::ok(SUCCESS_MESSAGE));
        service
            .deliver(&[record("3", "Linus")])
            .expect("deliver second batch");

        let rows = service.store().rows("Registrations").expect("rows");
        let names: Vec<&str> = rows.iter().map(|row| row[0].value.as_str()).collect();
        assert_eq!(names, ["Full Name", "Ada", "Grace", "Linus"]);
        assert!(rows[1..].iter().all(|row| row[1].format == CellFormat::Text));
    }

    #[test]
    fn duplicate_records_are_not_deduplicated() {
        let service = service_with(Box::new(DisabledNotifier));
        let same = record("1", "Ada");
        service
            .deliver(&[same.clone(), same])
            .expect("deliver duplicates");
        assert_eq!(service.store().rows("Registrations").expect("rows").len(), 3);
    }

    #[test]
    fn empty_batch_succeeds_with_header_only() {
        let service = service_with(Box::new(DisabledNotifier));
        service.deliver(&[]).expect("deliver empty batch");
        assert_eq!(service.store().rows("Registrations").expect("rows").len(), 1);
    }

    #[test]
    fn notification_failures_are_per_record_and_keep_rows() {
        let notifier = ScriptedNotifier {
            failing: vec!["2".to_string()],
            sent: Mutex::new(Vec::new()),
        };
        let service = service_with(Box::new(notifier));
        let response = service
            .deliver(&[record("1", "Ada"), record("2", "Grace")])
            .expect("deliver");
        assert!(response.success);
        let report = response.whatsapp.expect("notification report");
        assert!(report.enabled);
        assert_eq!(report.results.len(), 2);
        assert!(report.results[0].success);
        assert!(!report.results[1].success);
        assert_eq!(report.results[1].record_id, "2");
        assert!(report.results[1]
            .error
            .as_deref()
            .is_some_and(|e| e.contains("gateway rejected 2")));
        assert_eq!(service.store().rows("Registrations").expect("rows").len(), 3);
    }

    #[test]
    fn disabled_notifications_omit_report() {
        let service = service_with(Box::new(DisabledNotifier));
        let response = service.deliver(&[record("1", "Ada")]).expect("deliver");
        assert!(response.whatsapp.is_none());
    }

    #[test]
    fn unparsable_body_fails_whole_request() {
        let service = service_with(Box::new(DisabledNotifier));
        let (status, response) = service.handle(b"{\"data\": [{\"fullName\": 1}]}");
        assert_eq!(status, 400);
        assert!(!response.success);
        assert!(response.message.starts_with("Error: invalid payload"));
        assert!(service.store().rows("Registrations").expect("rows").is_empty());

        let (status, _) = service.handle(b"not json");
        assert_eq!(status, 400);
    }

    #[test]
    fn unreachable_store_fails_whole_request() {
        let service = DeliveryService::new(
            Box::new(UnreachableStore),
            Box::new(DisabledNotifier),
            "Registrations",
        );
        let (status, response) = service.handle(
            serde_json::to_vec(&DeliveryRequest {
                data: vec![record("1", "Ada")],
            })
            .expect("serialize request")
            .as_slice(),
        );
        assert_eq!(status, 500);
        assert_eq!(
            response.message,
            "Error: target store unavailable: spreadsheet not found"
        );
    }
}
