// Core types for the submission lifecycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FormStoreError;

/// Persisted submission status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum SubmissionState {
    /// Still being filled in
    Draft,
    /// Withdrawn by the submitter; data has been purged
    Cancelled,
    /// Handed in
    Submitted,
}

impl SubmissionState {
    pub const DRAFT_LABEL: &'static str = "Draft";
    pub const CANCELLED_LABEL: &'static str = "Cancelled";
    pub const SUBMITTED_LABEL: &'static str = "Submitted";

    pub fn code(self) -> i64 {
        match self {
            SubmissionState::Draft => 0,
            SubmissionState::Cancelled => 1,
            SubmissionState::Submitted => 2,
        }
    }

    pub fn from_code(code: i64) -> Result<Self, FormStoreError> {
        match code {
            0 => Ok(SubmissionState::Draft),
            1 => Ok(SubmissionState::Cancelled),
            2 => Ok(SubmissionState::Submitted),
            _ => Err(FormStoreError::UnknownStatus { code }),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SubmissionState::Draft => Self::DRAFT_LABEL,
            SubmissionState::Cancelled => Self::CANCELLED_LABEL,
            SubmissionState::Submitted => Self::SUBMITTED_LABEL,
        }
    }

    pub fn is_final(self) -> bool {
        !matches!(self, SubmissionState::Draft)
    }
}

impl TryFrom<i64> for SubmissionState {
    type Error = FormStoreError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        SubmissionState::from_code(code)
    }
}

impl From<SubmissionState> for i64 {
    fn from(state: SubmissionState) -> Self {
        state.code()
    }
}

impl std::fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Accepts a label (`draft`, `Submitted`, ...) or a numeric code
impl std::str::FromStr for SubmissionState {
    type Err = FormStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(code) = s.parse::<i64>() {
            return SubmissionState::from_code(code);
        }

        [
            SubmissionState::Draft,
            SubmissionState::Cancelled,
            SubmissionState::Submitted,
        ]
        .into_iter()
        .find(|state| state.label().eq_ignore_ascii_case(s))
        .ok_or_else(|| FormStoreError::InvalidFilter {
            reason: format!("unknown submission state '{s}'"),
        })
    }
}

/// Display text for a raw status code
pub fn status_label(code: i64) -> Result<&'static str, FormStoreError> {
    SubmissionState::from_code(code).map(SubmissionState::label)
}

/// Polymorphic pointer to the record holding a submission's field values
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataRef {
    pub kind: String,
    pub id: i64,
}

impl DataRef {
    pub fn new(kind: &str, id: i64) -> Self {
        Self {
            kind: kind.to_string(),
            id,
        }
    }
}

/// Form-specific field values of a submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRecord {
    pub id: i64,
    pub kind: String,
    pub fields: Map<String, Value>,
}

impl DataRecord {
    pub fn data_ref(&self) -> DataRef {
        DataRef::new(&self.kind, self.id)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// Child record under one of the data record's relations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationRow {
    pub id: i64,
    pub data_id: i64,
    pub field: String,
    pub fields: Map<String, Value>,
}

/// Identity of the user who created a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submitter {
    pub id: i64,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A user's instance of filling out a form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: i64,
    pub status: SubmissionState,
    pub treated: Option<DateTime<Utc>>,
    pub form_id: i64,
    pub submitter_id: i64,
    pub data: Option<DataRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Submission {
    pub fn is_draft(&self) -> bool {
        self.status == SubmissionState::Draft
    }

    /// Display text of the status
    pub fn status_text(&self) -> &'static str {
        self.status.label()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_round_trip_through_labels() {
        assert_eq!(status_label(0).unwrap(), "Draft");
        assert_eq!(status_label(1).unwrap(), "Cancelled");
        assert_eq!(status_label(2).unwrap(), "Submitted");
    }

    #[test]
    fn test_unknown_status_code_is_an_error() {
        assert!(matches!(
            status_label(7),
            Err(FormStoreError::UnknownStatus { code: 7 })
        ));
        assert!(serde_json::from_str::<SubmissionState>("-1").is_err());
    }

    #[test]
    fn test_state_serializes_as_code() {
        assert_eq!(serde_json::to_string(&SubmissionState::Submitted).unwrap(), "2");
        assert!(SubmissionState::Cancelled.is_final());
        assert!(!SubmissionState::Draft.is_final());
    }

    #[test]
    fn test_state_parses_from_label_or_code() {
        assert_eq!("submitted".parse::<SubmissionState>().unwrap(), SubmissionState::Submitted);
        assert_eq!("1".parse::<SubmissionState>().unwrap(), SubmissionState::Cancelled);
        assert!("archived".parse::<SubmissionState>().is_err());
    }
}
