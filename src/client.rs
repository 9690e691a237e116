//! Submission client for the delivery endpoint.
//!
//! Delivery is at-most-once by default: one request per submission, no
//! automatic re-attempt. Whatever the network does, the record lands in the
//! local mirror, so the worst case is "kept locally, not mirrored remotely".
//!
//! # Outcomes
//!
//! - endpoint accepted the batch and the notification went out: enhanced success
//! - endpoint accepted the batch otherwise: generic success
//! - transport error, non-2xx, malformed body, or `success:false`: local-only warning
use crate::config::{ClientConfig, DeliveryPolicy};
use crate::form::SignupForm;
use crate::mirror::{LocalMirror, MirrorBackend};
use crate::record::RegistrationRecord;
use crate::util::truncate_string;
use crate::wire::{DeliveryRequest, DeliveryResponse};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::time::Instant;

pub const MESSAGE_SYNCED_NOTIFIED: &str =
    "Registration successful! Your data has been saved and WhatsApp confirmation sent!";
pub const MESSAGE_SYNCED: &str = "Registration successful! Your data has been saved.";
pub const MESSAGE_LOCAL_ONLY: &str =
    "Registration saved locally, but failed to sync with the registration sheet.";

const MAX_ERROR_BODY_BYTES: usize = 200;

/// Why a delivery attempt failed.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("endpoint returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("malformed endpoint response: {0}")]
    Malformed(String),
    #[error("endpoint reported failure: {0}")]
    Rejected(String),
}

/// Carries one batch to the delivery endpoint.
pub trait DeliveryTransport {
    fn deliver(&self, request: &DeliveryRequest) -> Result<DeliveryResponse, DeliveryError>;
}

/// Blocking HTTP transport with a fixed request deadline.
pub struct HttpTransport {
    agent: ureq::Agent,
    url: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout()))
            .http_status_as_error(false)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(agent_config),
            url: config.endpoint_url(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Issue the no-body readiness probe.
    pub fn probe(&self) -> Result<DeliveryResponse, DeliveryError> {
        let response = self
            .agent
            .get(&self.url)
            .call()
            .map_err(|err| DeliveryError::Transport(err.to_string()))?;
        read_response(response)
    }
}

impl DeliveryTransport for HttpTransport {
    fn deliver(&self, request: &DeliveryRequest) -> Result<DeliveryResponse, DeliveryError> {
        let response = self
            .agent
            .post(&self.url)
            .send_json(request)
            .map_err(|err| DeliveryError::Transport(err.to_string()))?;
        read_response(response)
    }
}

fn read_response(
    mut response: ureq::http::Response<ureq::Body>,
) -> Result<DeliveryResponse, DeliveryError> {
    let status = response.status();
    let text = response
        .body_mut()
        .read_to_string()
        .map_err(|err| DeliveryError::Transport(err.to_string()))?;
    if !status.is_success() {
        let message = serde_json::from_str::<DeliveryResponse>(&text)
            .map(|parsed| parsed.message)
            .unwrap_or_else(|_| truncate_string(text.trim(), MAX_ERROR_BODY_BYTES));
        return Err(DeliveryError::Status {
            status: status.as_u16(),
            message,
        });
    }
    let parsed: DeliveryResponse = serde_json::from_str(&text).map_err(|err| {
        DeliveryError::Malformed(format!(
            "{err}: {}",
            truncate_string(text.trim(), MAX_ERROR_BODY_BYTES)
        ))
    })?;
    if !parsed.success {
        return Err(DeliveryError::Rejected(parsed.message));
    }
    Ok(parsed)
}

/// What the user is told after a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Row appended remotely; `notified` when the invite went out.
    Synced { notified: bool },
    /// Remote delivery failed; the record exists only in the local mirror.
    SavedLocally { error: DeliveryError },
}

impl SubmissionOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            SubmissionOutcome::Synced { notified: true } => MESSAGE_SYNCED_NOTIFIED,
            SubmissionOutcome::Synced { notified: false } => MESSAGE_SYNCED,
            SubmissionOutcome::SavedLocally { .. } => MESSAGE_LOCAL_ONLY,
        }
    }

    pub fn is_synced(&self) -> bool {
        matches!(self, SubmissionOutcome::Synced { .. })
    }
}

/// A completed submission: the minted record and how delivery went.
#[derive(Debug, Clone)]
pub struct Submission {
    pub record: RegistrationRecord,
    pub outcome: SubmissionOutcome,
    /// Set when the local mirror could not persist the record.
    pub mirror_error: Option<String>,
}

/// Packages records and sends them under an explicit delivery policy.
pub struct SubmissionClient<T: DeliveryTransport> {
    transport: T,
    policy: DeliveryPolicy,
}

impl<T: DeliveryTransport> SubmissionClient<T> {
    pub fn new(transport: T, policy: DeliveryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send `record` as a one-element batch and classify the result.
    pub fn send(&self, record: &RegistrationRecord) -> SubmissionOutcome {
        let request = DeliveryRequest {
            data: vec![record.clone()],
        };
        let mut last_error = None;
        for attempt in 0..=self.policy.retries {
            if attempt > 0 {
                tracing::warn!(
                    attempt,
                    retries = self.policy.retries,
                    record_id = %record.id,
                    "retrying delivery"
                );
            }
            match self.transport.deliver(&request) {
                Ok(response) => {
                    return SubmissionOutcome::Synced {
                        notified: response.notification_sent(),
                    }
                }
                Err(err) => {
                    tracing::warn!(record_id = %record.id, error = %err, "delivery failed");
                    last_error = Some(err);
                }
            }
        }
        SubmissionOutcome::SavedLocally {
            error: last_error
                .unwrap_or_else(|| DeliveryError::Transport("no attempt made".to_string())),
        }
    }

    /// Mint a record from the form's final step, deliver it, and mirror it.
    ///
    /// The mirror is written whatever the delivery outcome. A mirror failure
    /// is reported on the returned submission and never hides the delivery
    /// outcome. The form's in-flight flag is held for the whole call and
    /// released afterwards.
    pub fn submit<B: MirrorBackend>(
        &self,
        form: &mut SignupForm,
        mirror: &mut LocalMirror<B>,
        now: DateTime<Utc>,
    ) -> Result<Submission> {
        let record = form.begin_submit(now)?;
        let start = Instant::now();
        let outcome = self.send(&record);
        let mirror_error = mirror.append(record.clone()).err().map(|err| {
            let message = format!("{err:#}");
            tracing::error!(
                record_id = %record.id,
                synced = outcome.is_synced(),
                error = %message,
                "local mirror write failed"
            );
            message
        });
        form.finish_submit();
        tracing::info!(
            record_id = %record.id,
            synced = outcome.is_synced(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            mirror_len = mirror.len(),
            "registration submitted"
        );
        Ok(Submission {
            record,
            outcome,
            mirror_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{Field, SubmitError};
    use crate::mirror::MemoryBackend;
    use crate::wire::{NotificationReport, NotificationResult};
    use chrono::NaiveDate;
    use std::cell::{Cell, RefCell};

    struct FakeTransport {
        reply: Result<DeliveryResponse, DeliveryError>,
        calls: Cell<usize>,
        seen: RefCell<Vec<DeliveryRequest>>,
    }

    impl FakeTransport {
        fn replying(reply: Result<DeliveryResponse, DeliveryError>) -> Self {
            Self {
                reply,
                calls: Cell::new(0),
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl DeliveryTransport for FakeTransport {
        fn deliver(&self, request: &DeliveryRequest) -> Result<DeliveryResponse, DeliveryError> {
            self.calls.set(self.calls.get() + 1);
            self.seen.borrow_mut().push(request.clone());
            self.reply.clone()
        }
    }

    fn notified_response(success: bool) -> DeliveryResponse {
        DeliveryResponse {
            success: true,
            message: "Data added successfully".to_string(),
            whatsapp: Some(NotificationReport {
                enabled: true,
                results: vec![NotificationResult {
                    success,
                    record_id: "1".to_string(),
                    phone_number: "+91 9876543210".to_string(),
                    error: None,
                }],
            }),
        }
    }

    fn ready_form() -> SignupForm {
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).expect("valid date");
        let mut form = SignupForm::new(today);
        form.set(Field::FullName, "Jane Doe");
        assert!(form.next());
        form.set(Field::Region, "+91");
        form.set(Field::PhoneNumber, "9876543210");
        assert!(form.next());
        form.set(Field::Email, "jane@x.com");
        form.set(Field::UserType, "Student");
        assert!(form.next());
        form.set(Field::Reason, "General curiosity about artificial intelligence");
        assert!(form.next());
        let date = form.dates()[1].value.clone();
        form.set(Field::PreferredDate, &date);
        form
    }

    #[test]
    fn plain_success_shows_generic_message() {
        let client = SubmissionClient::new(
            FakeTransport::replying(Ok(DeliveryResponse::ok("Data added successfully"))),
            DeliveryPolicy::default(),
        );
        let mut form = ready_form();
        let mut mirror = LocalMirror::open(MemoryBackend::default()).expect("open mirror");
        let submission = client
            .submit(&mut form, &mut mirror, Utc::now())
            .expect("submit");
        assert_eq!(submission.outcome, SubmissionOutcome::Synced { notified: false });
        assert_eq!(submission.outcome.message(), MESSAGE_SYNCED);
        assert_eq!(mirror.len(), 1);
        assert!(!form.is_submitting());
    }

    #[test]
    fn notification_success_shows_enhanced_message() {
        let client = SubmissionClient::new(
            FakeTransport::replying(Ok(notified_response(true))),
            DeliveryPolicy::default(),
        );
        let outcome = client.send(&ready_form().begin_submit(Utc::now()).expect("record"));
        assert_eq!(outcome.message(), MESSAGE_SYNCED_NOTIFIED);

        let failed_notify = SubmissionClient::new(
            FakeTransport::replying(Ok(notified_response(false))),
            DeliveryPolicy::default(),
        );
        let outcome = failed_notify.send(&ready_form().begin_submit(Utc::now()).expect("record"));
        assert_eq!(outcome.message(), MESSAGE_SYNCED);
    }

    #[test]
    fn network_failure_keeps_record_locally_without_retrying() {
        let client = SubmissionClient::new(
            FakeTransport::replying(Err(DeliveryError::Transport(
                "connection refused".to_string(),
            ))),
            DeliveryPolicy::default(),
        );
        let mut form = ready_form();
        let mut mirror = LocalMirror::open(MemoryBackend::default()).expect("open mirror");
        let submission = client
            .submit(&mut form, &mut mirror, Utc::now())
            .expect("submit");
        assert_eq!(submission.outcome.message(), MESSAGE_LOCAL_ONLY);
        assert_eq!(client.transport().calls.get(), 1);
        assert_eq!(mirror.list(), [submission.record]);
    }

    #[test]
    fn endpoint_reported_failure_is_treated_as_delivery_failure() {
        let client = SubmissionClient::new(
            FakeTransport::replying(Err(DeliveryError::Rejected("Error: no sheet".to_string()))),
            DeliveryPolicy::default(),
        );
        let outcome = client.send(&ready_form().begin_submit(Utc::now()).expect("record"));
        assert!(!outcome.is_synced());
    }

    #[test]
    fn configured_retries_are_explicit_and_bounded() {
        let client = SubmissionClient::new(
            FakeTransport::replying(Err(DeliveryError::Status {
                status: 502,
                message: "bad gateway".to_string(),
            })),
            DeliveryPolicy { retries: 2 },
        );
        let outcome = client.send(&ready_form().begin_submit(Utc::now()).expect("record"));
        assert_eq!(client.transport().calls.get(), 3);
        assert!(matches!(
            outcome,
            SubmissionOutcome::SavedLocally {
                error: DeliveryError::Status { status: 502, .. }
            }
        ));
    }

    #[test]
    fn sends_single_record_batch_with_wire_fields() {
        let client = SubmissionClient::new(
            FakeTransport::replying(Ok(DeliveryResponse::ok("ok"))),
            DeliveryPolicy::default(),
        );
        let start = Utc::now();
        let mut form = ready_form();
        let mut mirror = LocalMirror::open(MemoryBackend::default()).expect("open mirror");
        let submission = client
            .submit(&mut form, &mut mirror, Utc::now())
            .expect("submit");
        let seen = client.transport().seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].data.len(), 1);
        let sent = &seen[0].data[0];
        assert_eq!(sent.phone_number, "+91 9876543210");
        assert_eq!(sent.reason, "General curiosity about artificial intelligence");
        assert_eq!(sent.preferred_date, "2026-10-18");
        assert!(!sent.id.is_empty());
        let stamped = DateTime::parse_from_rfc3339(&sent.signup_timestamp).expect("rfc3339");
        assert!(stamped.timestamp_millis() >= start.timestamp_millis());
        assert_eq!(sent, &submission.record);
    }

    #[test]
    fn validation_failure_never_reaches_the_network() {
        let client = SubmissionClient::new(
            FakeTransport::replying(Ok(DeliveryResponse::ok("ok"))),
            DeliveryPolicy::default(),
        );
        let mut form = ready_form();
        form.set(Field::PreferredDate, "");
        let mut mirror = LocalMirror::open(MemoryBackend::default()).expect("open mirror");
        let err = client
            .submit(&mut form, &mut mirror, Utc::now())
            .expect_err("blocked");
        assert!(matches!(
            err.downcast_ref::<SubmitError>(),
            Some(SubmitError::Invalid { step: 5, count: 1 })
        ));
        assert_eq!(client.transport().calls.get(), 0);
        assert!(mirror.is_empty());
    }

    struct FailingBackend;

    impl MirrorBackend for FailingBackend {
        fn load(&self) -> Result<Vec<RegistrationRecord>> {
            Ok(Vec::new())
        }

        fn store(&mut self, _records: &[RegistrationRecord]) -> Result<()> {
            Err(anyhow::anyhow!("disk full"))
        }
    }

    #[test]
    fn mirror_failure_keeps_delivery_outcome() {
        let client = SubmissionClient::new(
            FakeTransport::replying(Ok(notified_response(true))),
            DeliveryPolicy::default(),
        );
        let mut form = ready_form();
        let mut mirror = LocalMirror::open(FailingBackend).expect("open mirror");
        let submission = client
            .submit(&mut form, &mut mirror, Utc::now())
            .expect("delivered submission");
        assert_eq!(client.transport().calls.get(), 1);
        assert_eq!(submission.outcome, SubmissionOutcome::Synced { notified: true });
        assert_eq!(submission.outcome.message(), MESSAGE_SYNCED_NOTIFIED);
        assert!(submission
            .mirror_error
            .as_deref()
            .is_some_and(|err| err.contains("disk full")));
        assert!(mirror.is_empty());
        assert!(!form.is_submitting());
    }

    #[test]
    fn duplicate_submissions_produce_distinct_records() {
        let client = SubmissionClient::new(
            FakeTransport::replying(Ok(DeliveryResponse::ok("ok"))),
            DeliveryPolicy::default(),
        );
        let mut form = ready_form();
        let mut mirror = LocalMirror::open(MemoryBackend::default()).expect("open mirror");
        let now = Utc::now();
        let first = client.submit(&mut form, &mut mirror, now).expect("first");
        let second = client.submit(&mut form, &mut mirror, now).expect("second");
        assert_ne!(first.record.id, second.record.id);
        assert_eq!(mirror.len(), 2);
    }
}
