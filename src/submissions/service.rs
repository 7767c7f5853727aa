use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, info, Instrument};

use crate::error::{FormStoreError, Result};
use crate::export::EmailExport;
use crate::forms::{Form, RecordRegistry};
use crate::observability::{create_lifecycle_span, lifecycle_metrics};
use crate::preview::{render_record, RelationPreview, SubmissionPreview};
use crate::storage::{Purge, SubmissionStore, TransitionCommit};
use crate::telemetry::generate_correlation_id;

use super::events::{EventBus, LifecycleEvent};
use super::scopes::SubmissionQuery;
use super::state_machine::{next_state, SubmissionEvent};
use super::types::{DataRecord, RelationRow, Submission, Submitter};
use super::views::{self, NotificationVars};

/// Submission lifecycle on top of a store, a record registry and an event bus
pub struct SubmissionService<S> {
    store: S,
    events: EventBus,
    registry: RecordRegistry,
}

impl<S: SubmissionStore> SubmissionService<S> {
    pub fn new(store: S, events: EventBus) -> Self {
        Self {
            store,
            events,
            registry: RecordRegistry::new(),
        }
    }

    /// Builds the record registry from every form the store knows
    pub async fn load(store: S, events: EventBus) -> Result<Self> {
        let forms = store.forms().await?;
        let registry: RecordRegistry = forms.iter().collect();
        debug!(forms = forms.len(), kinds = registry.len(), "Loaded record registry");

        Ok(Self {
            store,
            events,
            registry,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &RecordRegistry {
        &self.registry
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Stores a form and registers its record kinds
    pub async fn register_form(&mut self, form: Form) -> Result<Form> {
        let form = self.store.insert_form(form).await?;
        self.registry.register_form(&form);
        Ok(form)
    }

    pub async fn submission(&self, id: i64) -> Result<Submission> {
        self.store
            .submission(id)
            .await?
            .ok_or_else(|| FormStoreError::not_found("Submission", id))
    }

    pub async fn form(&self, id: i64) -> Result<Form> {
        self.store
            .form(id)
            .await?
            .ok_or_else(|| FormStoreError::not_found("Form", id))
    }

    pub async fn submitter_of(&self, submission: &Submission) -> Result<Option<Submitter>> {
        self.store.submitter(submission.submitter_id).await
    }

    /// The attached data record, if any is attached and still exists
    pub async fn data(&self, submission: &Submission) -> Result<Option<DataRecord>> {
        let Some(data) = &submission.data else {
            return Ok(None);
        };
        self.registry.resolve(&data.kind)?;
        self.store.data_record(data).await
    }

    /// Rows under one of the form's relations; empty when no data is attached
    pub async fn relation_rows(&self, submission: &Submission, field: &str) -> Result<Vec<RelationRow>> {
        match &submission.data {
            Some(data) => self.store.relation_rows(data, field).await,
            None => Ok(Vec::new()),
        }
    }

    /// Stores the form's field values and points the submission at them.
    ///
    /// A submission that already has a record gets that record's values
    /// replaced in place, so its relation rows stay attached. Final
    /// submissions are refused.
    pub async fn attach_data(
        &self,
        submission: &mut Submission,
        fields: Map<String, Value>,
    ) -> Result<DataRecord> {
        let stored = self.submission(submission.id).await?;
        if stored.status.is_final() {
            return Err(FormStoreError::Locked {
                id: stored.id,
                status: stored.status.to_string(),
            });
        }

        if let Some(data) = &stored.data {
            let record = self.store.update_data_record(data, fields).await?;
            submission.data = Some(data.clone());
            debug!(submission.id = submission.id, data.id = record.id, "Replaced data record values");
            return Ok(record);
        }

        let form = self.form(stored.form_id).await?;
        let kind = self.registry.resolve(&form.schema.kind)?.kind.clone();

        let record = self.store.insert_data_record(&kind, fields).await?;
        let data = record.data_ref();
        self.store.attach_data(submission.id, &data).await?;
        submission.data = Some(data);

        debug!(submission.id = submission.id, data.id = record.id, kind = %kind, "Attached data record");
        Ok(record)
    }

    /// Adds a row under relation `field` of the submission's data record
    pub async fn add_relation_row(
        &self,
        submission: &Submission,
        field: &str,
        fields: Map<String, Value>,
    ) -> Result<RelationRow> {
        let form = self.form(submission.form_id).await?;
        if !form.rels().iter().any(|r| r.field == field) {
            return Err(FormStoreError::InvalidFilter {
                reason: format!("form #{} has no relation '{field}'", form.id),
            });
        }
        let data = submission
            .data
            .as_ref()
            .ok_or_else(|| FormStoreError::storage(format!("submission #{} has no data", submission.id)))?;

        self.store.insert_relation_row(data, field, fields).await
    }

    /// Validation messages of a draft submission.
    ///
    /// Final submissions and submissions without data report nothing. With
    /// `deep`, each relation adds at most a shortfall message and a single
    /// summary of its row issues.
    pub async fn get_errors(&self, submission: &Submission, deep: bool) -> Result<Vec<String>> {
        if submission.status.is_final() {
            return Ok(Vec::new());
        }

        let Some(data) = &submission.data else {
            return Ok(Vec::new());
        };
        let Some(record) = self.data(submission).await? else {
            return Ok(Vec::new());
        };

        lifecycle_metrics().record_validation();
        let form = self.form(submission.form_id).await?;
        let mut errors = form.validate(&record.fields);

        if deep {
            for relation in form.rels() {
                let rows = self.store.relation_rows(data, &relation.field).await?;

                if rows.len() < relation.required_min as usize {
                    errors.push(format!(
                        "You have to add more {} ({} required)",
                        relation.target.title, relation.required_min
                    ));
                }

                let row_errors: Vec<String> = rows
                    .iter()
                    .flat_map(|row| relation.target.validate(&row.fields))
                    .collect();

                if !row_errors.is_empty() {
                    errors.push(format!(
                        "{} is not ready ({} issues, see below)",
                        relation.target.title,
                        row_errors.len()
                    ));
                }
            }
        }

        Ok(errors)
    }

    /// Hands in a draft with no open issues. Returns `false` without changing
    /// anything when the submission is final, not ready, or was changed
    /// concurrently.
    pub async fn submit(&self, submission: &mut Submission) -> Result<bool> {
        let correlation_id = generate_correlation_id();
        let span = create_lifecycle_span("submit", submission.id, &correlation_id);
        self.submit_inner(submission, correlation_id)
            .instrument(span)
            .await
    }

    async fn submit_inner(&self, submission: &mut Submission, correlation_id: String) -> Result<bool> {
        let open_issues = self.get_errors(submission, true).await?.len();
        let Some(next) = next_state(submission.id, submission.status, open_issues, SubmissionEvent::Submit)
        else {
            lifecycle_metrics().record_rejected();
            return Ok(false);
        };

        let snapshot = submission.clone();
        let data = self.data(submission).await?;
        let treated = Utc::now();

        let commit = TransitionCommit {
            submission_id: submission.id,
            from: submission.status,
            to: next,
            treated,
            purge: None,
        };
        if !self.store.commit_transition(&commit).await? {
            lifecycle_metrics().record_lost_race();
            return Ok(false);
        }

        submission.status = next;
        submission.treated = Some(treated);
        submission.updated_at = treated;
        lifecycle_metrics().record_submitted();

        info!(submission.id = submission.id, form.id = submission.form_id, "Submission submitted");
        self.emit(SubmissionEvent::Submit, snapshot, data, correlation_id);
        Ok(true)
    }

    /// Cancels a draft and purges its data: every relation row, then the data
    /// record. The purge and the status change commit as one unit.
    pub async fn withdraw(&self, submission: &mut Submission) -> Result<bool> {
        let correlation_id = generate_correlation_id();
        let span = create_lifecycle_span("withdraw", submission.id, &correlation_id);
        self.withdraw_inner(submission, correlation_id)
            .instrument(span)
            .await
    }

    async fn withdraw_inner(&self, submission: &mut Submission, correlation_id: String) -> Result<bool> {
        let Some(next) = next_state(submission.id, submission.status, 0, SubmissionEvent::Withdraw)
        else {
            lifecycle_metrics().record_rejected();
            return Ok(false);
        };

        let form = self.form(submission.form_id).await?;
        // the caller's copy may predate an attach, so listeners get the stored record
        let snapshot = self.submission(submission.id).await?;
        let data = self.data(&snapshot).await?;
        let treated = Utc::now();

        let purge = Some(Purge {
            relation_fields: form.rels().iter().map(|r| r.field.clone()).collect(),
        });

        let commit = TransitionCommit {
            submission_id: submission.id,
            from: submission.status,
            to: next,
            treated,
            purge,
        };
        if !self.store.commit_transition(&commit).await? {
            lifecycle_metrics().record_lost_race();
            return Ok(false);
        }

        submission.status = next;
        submission.treated = Some(treated);
        submission.updated_at = treated;
        submission.data = None;
        lifecycle_metrics().record_withdrawn();

        info!(submission.id = submission.id, form.id = submission.form_id, "Submission withdrawn");
        self.emit(SubmissionEvent::Withdraw, snapshot, data, correlation_id);
        Ok(true)
    }

    fn emit(
        &self,
        kind: SubmissionEvent,
        submission: Submission,
        data: Option<DataRecord>,
        correlation_id: String,
    ) {
        let event = LifecycleEvent {
            kind,
            submission,
            data,
            correlation_id,
            occurred_at: Utc::now(),
        };
        self.events.dispatch(&event);
    }

    pub async fn is_writable(&self, submission: &Submission) -> Result<bool> {
        let form = self.form(submission.form_id).await?;
        Ok(views::is_writable_at(submission, &form, Utc::now()))
    }

    pub async fn title(&self, submission: &Submission, suffix: &str) -> Result<String> {
        let data = self.data(submission).await?;
        Ok(views::title(submission, data.as_ref(), suffix))
    }

    pub async fn notification_vars(&self, submission: &Submission) -> Result<NotificationVars> {
        let submitter = self.submitter_of(submission).await?;
        let form = self.store.form(submission.form_id).await?;
        Ok(views::notification_vars(submission, submitter.as_ref(), form.as_ref()))
    }

    pub fn admin_url(&self, submission: &Submission, base_url: &str, action: &str) -> String {
        views::admin_url(submission, base_url, action)
    }

    pub async fn list(&self, query: &SubmissionQuery) -> Result<Vec<Submission>> {
        self.store.list_submissions(query).await
    }

    /// Submitter addresses of every submission matching `query`
    pub async fn export_emails(&self, query: &SubmissionQuery, filename: &str) -> Result<EmailExport> {
        let mut addresses = Vec::new();
        for submission in self.store.list_submissions(query).await? {
            if let Some(submitter) = self.store.submitter(submission.submitter_id).await? {
                addresses.push(submitter.email);
            }
        }
        Ok(EmailExport::from_addresses(addresses, filename))
    }

    pub async fn preview(&self, submission: &Submission) -> Result<SubmissionPreview> {
        let form = self.form(submission.form_id).await?;
        let data = self.data(submission).await?;

        let mut relations = Vec::new();
        if data.is_some() {
            for relation in form.rels() {
                let rows = self.relation_rows(submission, &relation.field).await?;
                relations.push(RelationPreview {
                    title: relation.title.clone(),
                    rows: rows
                        .iter()
                        .map(|row| render_record(&relation.target, &row.fields))
                        .collect(),
                });
            }
        }

        Ok(SubmissionPreview {
            title: views::title(submission, data.as_ref(), ""),
            status: submission.status_text().to_string(),
            data: data.map(|record| render_record(&form.schema, &record.fields)),
            relations,
        })
    }

    /// `(id, title)` pairs for form pickers
    pub async fn form_options(&self) -> Result<Vec<(i64, String)>> {
        Ok(self
            .store
            .forms()
            .await?
            .into_iter()
            .map(|form| (form.id, form.title))
            .collect())
    }

    /// `(id, email)` pairs for submitter pickers
    pub async fn submitter_options(&self) -> Result<Vec<(i64, String)>> {
        Ok(self
            .store
            .submitters()
            .await?
            .into_iter()
            .map(|submitter| (submitter.id, submitter.email))
            .collect())
    }
}
