// Storage collaborator: persistence of forms, submitters, submissions and
// the polymorphic data records they point at.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::forms::Form;
use crate::submissions::scopes::SubmissionQuery;
use crate::submissions::types::{
    DataRecord, DataRef, RelationRow, Submission, SubmissionState, Submitter,
};

pub mod memory;
#[cfg(feature = "database")]
pub mod sqlite;

pub use memory::MemoryStore;
#[cfg(feature = "database")]
pub use sqlite::SqliteStore;

/// Withdrawal cleanup: every row under `relation_fields`, then the record itself.
///
/// The record is the one the stored submission points at when the commit
/// runs, never a reference supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Purge {
    pub relation_fields: Vec<String>,
}

/// One atomic status change.
///
/// Stores apply it as a compare-and-set: the status is only written if it is
/// still `from`, and the purge (if any) runs in the same transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionCommit {
    pub submission_id: i64,
    pub from: SubmissionState,
    pub to: SubmissionState,
    pub treated: DateTime<Utc>,
    pub purge: Option<Purge>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubmitter {
    pub email: String,
    pub name: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    async fn submission(&self, id: i64) -> Result<Option<Submission>>;

    async fn list_submissions(&self, query: &SubmissionQuery) -> Result<Vec<Submission>>;

    async fn create_submission(&self, form_id: i64, submitter_id: i64) -> Result<Submission>;

    /// Points a draft with no data yet at its data record. Fails when the
    /// submission is final or already has a record attached.
    async fn attach_data(&self, submission_id: i64, data: &DataRef) -> Result<()>;

    async fn form(&self, id: i64) -> Result<Option<Form>>;

    async fn forms(&self) -> Result<Vec<Form>>;

    /// Stores a form; an id of 0 asks the store to assign one
    async fn insert_form(&self, form: Form) -> Result<Form>;

    async fn submitter(&self, id: i64) -> Result<Option<Submitter>>;

    async fn submitters(&self) -> Result<Vec<Submitter>>;

    async fn insert_submitter(&self, submitter: NewSubmitter) -> Result<Submitter>;

    async fn data_record(&self, data: &DataRef) -> Result<Option<DataRecord>>;

    async fn insert_data_record(&self, kind: &str, fields: Map<String, Value>)
        -> Result<DataRecord>;

    /// Replaces the field values of an existing record
    async fn update_data_record(
        &self,
        data: &DataRef,
        fields: Map<String, Value>,
    ) -> Result<DataRecord>;

    /// Rows attached to `data` under relation `field`, in insertion order
    async fn relation_rows(&self, data: &DataRef, field: &str) -> Result<Vec<RelationRow>>;

    async fn insert_relation_row(
        &self,
        data: &DataRef,
        field: &str,
        fields: Map<String, Value>,
    ) -> Result<RelationRow>;

    /// Applies a transition atomically. Returns `false` when the stored status
    /// no longer matches `commit.from`, in which case nothing was changed.
    async fn commit_transition(&self, commit: &TransitionCommit) -> Result<bool>;
}
