use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// A single stored form submission.
///
/// `payload` is the raw JSON text exactly as it was accepted; the store never
/// parses or rewrites it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Submission {
    pub id: Uuid,
    pub form_type: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub submitted_at: DateTime<Utc>,
    pub payload: String,
}

impl Submission {
    /// Creates a submission with a fresh id, stamped with the current time.
    pub fn new(form_type: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            form_type: form_type.into(),
            submitted_at: Utc::now(),
            payload: payload.into(),
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_submitted_at(mut self, submitted_at: DateTime<Utc>) -> Self {
        self.submitted_at = submitted_at;
        self
    }

    /// Replaces a nil id with a freshly generated one.
    pub(crate) fn ensure_identity(&mut self) {
        if self.id.is_nil() {
            self.id = Uuid::new_v4();
        }
    }
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

/// Parses an RFC 3339 timestamp, falling back to offset-less ISO-8601 read as UTC.
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(DateTime::from_naive_utc_and_offset(parsed, Utc));
    }

    Err(format!("unsupported timestamp format: {raw}"))
}
