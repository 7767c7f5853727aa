use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{FormStoreError, Result};
use crate::forms::Form;
use crate::submissions::scopes::SubmissionQuery;
use crate::submissions::types::{
    DataRecord, DataRef, RelationRow, Submission, SubmissionState, Submitter,
};

use super::{NewSubmitter, SubmissionStore, TransitionCommit};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    forms: BTreeMap<i64, Form>,
    submitters: BTreeMap<i64, Submitter>,
    submissions: BTreeMap<i64, Submission>,
    records: BTreeMap<i64, DataRecord>,
    rows: BTreeMap<i64, RelationRow>,
    next_id: i64,
    failing_rows: HashSet<i64>,
}

impl MemoryState {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-process store.
///
/// Transitions are staged on a copy of the state and swapped in only once
/// every step succeeded, which gives the same all-or-nothing behaviour as a
/// database transaction.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later attempt to delete `row_id` fail
    pub async fn fail_row_deletion(&self, row_id: i64) {
        self.state.write().await.failing_rows.insert(row_id);
    }

    /// Number of relation rows currently stored, across all records
    pub async fn relation_row_count(&self) -> usize {
        self.state.read().await.rows.len()
    }

    fn apply(state: &mut MemoryState, commit: &TransitionCommit) -> Result<()> {
        let stored_data = state
            .submissions
            .get(&commit.submission_id)
            .ok_or_else(|| FormStoreError::not_found("Submission", commit.submission_id))?
            .data
            .clone();

        if let (Some(purge), Some(data)) = (&commit.purge, &stored_data) {
            for field in &purge.relation_fields {
                let row_ids: Vec<i64> = state
                    .rows
                    .values()
                    .filter(|row| row.data_id == data.id && &row.field == field)
                    .map(|row| row.id)
                    .collect();

                for row_id in row_ids {
                    if state.failing_rows.contains(&row_id) {
                        return Err(FormStoreError::storage(format!(
                            "failed to delete relation row #{row_id}"
                        )));
                    }
                    state.rows.remove(&row_id);
                }
            }
            state.records.remove(&data.id);
        }

        let submission = state
            .submissions
            .get_mut(&commit.submission_id)
            .ok_or_else(|| FormStoreError::not_found("Submission", commit.submission_id))?;
        submission.status = commit.to;
        submission.treated = Some(commit.treated);
        submission.updated_at = Utc::now();
        if commit.purge.is_some() {
            submission.data = None;
        }

        Ok(())
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn submission(&self, id: i64) -> Result<Option<Submission>> {
        Ok(self.state.read().await.submissions.get(&id).cloned())
    }

    async fn list_submissions(&self, query: &SubmissionQuery) -> Result<Vec<Submission>> {
        Ok(self
            .state
            .read()
            .await
            .submissions
            .values()
            .filter(|s| query.matches(s))
            .cloned()
            .collect())
    }

    async fn create_submission(&self, form_id: i64, submitter_id: i64) -> Result<Submission> {
        let mut state = self.state.write().await;
        if !state.forms.contains_key(&form_id) {
            return Err(FormStoreError::not_found("Form", form_id));
        }
        if !state.submitters.contains_key(&submitter_id) {
            return Err(FormStoreError::not_found("Submitter", submitter_id));
        }

        let now = Utc::now();
        let submission = Submission {
            id: state.allocate_id(),
            status: SubmissionState::Draft,
            treated: None,
            form_id,
            submitter_id,
            data: None,
            created_at: now,
            updated_at: now,
        };
        state.submissions.insert(submission.id, submission.clone());
        debug!(submission.id = submission.id, form.id = form_id, "Created submission");
        Ok(submission)
    }

    async fn attach_data(&self, submission_id: i64, data: &DataRef) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.records.contains_key(&data.id) {
            return Err(FormStoreError::not_found("Data record", data.id));
        }
        let submission = state
            .submissions
            .get_mut(&submission_id)
            .ok_or_else(|| FormStoreError::not_found("Submission", submission_id))?;
        if submission.status.is_final() {
            return Err(FormStoreError::Locked {
                id: submission_id,
                status: submission.status.to_string(),
            });
        }
        if submission.data.is_some() {
            return Err(FormStoreError::DataAttached { id: submission_id });
        }
        submission.data = Some(data.clone());
        submission.updated_at = Utc::now();
        Ok(())
    }

    async fn form(&self, id: i64) -> Result<Option<Form>> {
        Ok(self.state.read().await.forms.get(&id).cloned())
    }

    async fn forms(&self) -> Result<Vec<Form>> {
        Ok(self.state.read().await.forms.values().cloned().collect())
    }

    async fn insert_form(&self, mut form: Form) -> Result<Form> {
        let mut state = self.state.write().await;
        if form.id == 0 {
            form.id = state.allocate_id();
        } else {
            state.next_id = state.next_id.max(form.id);
        }
        state.forms.insert(form.id, form.clone());
        Ok(form)
    }

    async fn submitter(&self, id: i64) -> Result<Option<Submitter>> {
        Ok(self.state.read().await.submitters.get(&id).cloned())
    }

    async fn submitters(&self) -> Result<Vec<Submitter>> {
        Ok(self.state.read().await.submitters.values().cloned().collect())
    }

    async fn insert_submitter(&self, submitter: NewSubmitter) -> Result<Submitter> {
        let mut state = self.state.write().await;
        let submitter = Submitter {
            id: state.allocate_id(),
            email: submitter.email,
            name: submitter.name,
        };
        state.submitters.insert(submitter.id, submitter.clone());
        Ok(submitter)
    }

    async fn data_record(&self, data: &DataRef) -> Result<Option<DataRecord>> {
        Ok(self
            .state
            .read()
            .await
            .records
            .get(&data.id)
            .filter(|record| record.kind == data.kind)
            .cloned())
    }

    async fn insert_data_record(
        &self,
        kind: &str,
        fields: Map<String, Value>,
    ) -> Result<DataRecord> {
        let mut state = self.state.write().await;
        let record = DataRecord {
            id: state.allocate_id(),
            kind: kind.to_string(),
            fields,
        };
        state.records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_data_record(
        &self,
        data: &DataRef,
        fields: Map<String, Value>,
    ) -> Result<DataRecord> {
        let mut state = self.state.write().await;
        let record = state
            .records
            .get_mut(&data.id)
            .filter(|record| record.kind == data.kind)
            .ok_or_else(|| FormStoreError::not_found("Data record", data.id))?;
        record.fields = fields;
        Ok(record.clone())
    }

    async fn relation_rows(&self, data: &DataRef, field: &str) -> Result<Vec<RelationRow>> {
        Ok(self
            .state
            .read()
            .await
            .rows
            .values()
            .filter(|row| row.data_id == data.id && row.field == field)
            .cloned()
            .collect())
    }

    async fn insert_relation_row(
        &self,
        data: &DataRef,
        field: &str,
        fields: Map<String, Value>,
    ) -> Result<RelationRow> {
        let mut state = self.state.write().await;
        if !state.records.contains_key(&data.id) {
            return Err(FormStoreError::not_found("Data record", data.id));
        }
        let row = RelationRow {
            id: state.allocate_id(),
            data_id: data.id,
            field: field.to_string(),
            fields,
        };
        state.rows.insert(row.id, row.clone());
        Ok(row)
    }

    async fn commit_transition(&self, commit: &TransitionCommit) -> Result<bool> {
        let mut state = self.state.write().await;

        let current = state
            .submissions
            .get(&commit.submission_id)
            .map(|s| s.status)
            .ok_or_else(|| FormStoreError::not_found("Submission", commit.submission_id))?;

        if current != commit.from {
            warn!(
                submission.id = commit.submission_id,
                expected = %commit.from,
                actual = %current,
                "Status changed underneath transition"
            );
            return Ok(false);
        }

        let mut staged = state.clone();
        Self::apply(&mut staged, commit)?;
        *state = staged;

        info!(
            submission.id = commit.submission_id,
            status = %commit.to,
            purged = commit.purge.is_some(),
            "Committed submission transition"
        );
        Ok(true)
    }
}
