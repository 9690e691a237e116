//! Registration record schema and the fixed catalogues the form draws from.
//!
//! A record is minted once, when the final form step is submitted, and is
//! never updated afterwards.
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Reason sentinel that requires a custom free-text reason.
pub const OTHER_REASON: &str = "Others";

/// Predefined reasons for learning about AI, in display order.
pub const LEARNING_REASONS: [&str; 9] = [
    "Help my child with future career opportunities",
    "Understand AI to guide my family better",
    "Learn about AI for my own career development",
    "Stay updated with technology trends",
    "Understand AI safety and ethics",
    "Help with school projects and homework",
    "Prepare for college and university",
    "General curiosity about artificial intelligence",
    OTHER_REASON,
];

/// A dialing region offered by the contact step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub code: &'static str,
    pub name: &'static str,
}

/// Dialing regions offered by the contact step. Codes may repeat (US/Canada).
pub const REGIONS: [Region; 10] = [
    Region { code: "+1", name: "United States" },
    Region { code: "+1", name: "Canada" },
    Region { code: "+44", name: "United Kingdom" },
    Region { code: "+91", name: "India" },
    Region { code: "+86", name: "China" },
    Region { code: "+81", name: "Japan" },
    Region { code: "+49", name: "Germany" },
    Region { code: "+33", name: "France" },
    Region { code: "+61", name: "Australia" },
    Region { code: "+55", name: "Brazil" },
];

/// Return true when `code` is one of the catalogued dialing codes.
pub fn is_known_region(code: &str) -> bool {
    REGIONS.iter().any(|region| region.code == code)
}

/// Who is signing up.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Parent,
    Student,
    Guardian,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Parent, Role::Student, Role::Guardian];

    /// Return the stable string identifier used on the wire and in the sheet.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Parent => "Parent",
            Role::Student => "Student",
            Role::Guardian => "Guardian",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(raw.trim()))
            .ok_or_else(|| format!("unknown role {raw:?} (expected Parent, Student, or Guardian)"))
    }
}

/// One completed registration submission.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRecord {
    pub id: String,
    pub full_name: String,
    /// Region code and local number joined with a single space.
    pub phone_number: String,
    pub email: String,
    pub user_type: Role,
    pub reason: String,
    /// `YYYY-MM-DD`, one of the dates offered by the form.
    pub preferred_date: String,
    /// RFC 3339 UTC with millisecond precision.
    pub signup_timestamp: String,
}

static ID_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Mint a time-based record identifier.
///
/// Epoch milliseconds followed by a process-local sequence, so two records
/// minted within the same millisecond still get distinct ids.
pub fn mint_record_id(now: DateTime<Utc>) -> String {
    let seq = ID_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{}-{seq:04}", now.timestamp_millis())
}

/// Format a submission instant the way records carry it.
pub fn format_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Join a region code and a local number into the stored phone format.
pub fn join_phone(region: &str, local: &str) -> String {
    format!("{} {}", region.trim(), local.trim())
}
