use anyhow::Result;

use crate::storage::SubmissionStore;
use crate::submissions::SubmissionService;

use super::parse_fields;

pub struct CreateCommand {
    pub form_id: i64,
    pub submitter_id: i64,
}

impl CreateCommand {
    pub fn new(form_id: i64, submitter_id: i64) -> Self {
        Self {
            form_id,
            submitter_id,
        }
    }

    pub async fn execute<S: SubmissionStore>(&self, service: &SubmissionService<S>) -> Result<()> {
        let submission = service
            .store()
            .create_submission(self.form_id, self.submitter_id)
            .await?;
        println!("✏️  Created draft submission #{}", submission.id);
        Ok(())
    }
}

pub struct AttachCommand {
    pub submission_id: i64,
    pub data: String,
}

impl AttachCommand {
    pub fn new(submission_id: i64, data: String) -> Self {
        Self { submission_id, data }
    }

    pub async fn execute<S: SubmissionStore>(&self, service: &SubmissionService<S>) -> Result<()> {
        let fields = parse_fields(&self.data)?;
        let mut submission = service.submission(self.submission_id).await?;
        if !service.is_writable(&submission).await? {
            println!("🔒 Submission #{} can no longer be edited", submission.id);
            return Ok(());
        }

        let record = service.attach_data(&mut submission, fields).await?;
        println!(
            "📎 Attached {} record #{} to submission #{}",
            record.kind, record.id, submission.id
        );
        Ok(())
    }
}

pub struct AddRowCommand {
    pub submission_id: i64,
    pub field: String,
    pub data: String,
}

impl AddRowCommand {
    pub fn new(submission_id: i64, field: String, data: String) -> Self {
        Self {
            submission_id,
            field,
            data,
        }
    }

    pub async fn execute<S: SubmissionStore>(&self, service: &SubmissionService<S>) -> Result<()> {
        let fields = parse_fields(&self.data)?;
        let submission = service.submission(self.submission_id).await?;
        if !service.is_writable(&submission).await? {
            println!("🔒 Submission #{} can no longer be edited", submission.id);
            return Ok(());
        }

        let row = service.add_relation_row(&submission, &self.field, fields).await?;
        println!("➕ Added {} row #{} to submission #{}", self.field, row.id, submission.id);
        Ok(())
    }
}

pub struct ShowCommand {
    pub submission_id: i64,
    pub html: bool,
    pub verbose: bool,
    pub admin_base_url: String,
}

impl ShowCommand {
    pub fn new(submission_id: i64, admin_base_url: String) -> Self {
        Self {
            submission_id,
            html: false,
            verbose: false,
            admin_base_url,
        }
    }

    pub fn with_html(mut self, html: bool) -> Self {
        self.html = html;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub async fn execute<S: SubmissionStore>(&self, service: &SubmissionService<S>) -> Result<()> {
        let submission = service.submission(self.submission_id).await?;
        let preview = service.preview(&submission).await?;

        if self.html {
            println!("{}", preview.to_html());
        } else {
            print!("{preview}");
        }

        if self.verbose {
            println!();
            println!(
                "🔗 Preview: {}",
                service.admin_url(&submission, &self.admin_base_url, "preview")
            );
            println!(
                "🔗 Edit:    {}",
                service.admin_url(&submission, &self.admin_base_url, "update")
            );
            let vars = service.notification_vars(&submission).await?;
            println!("📨 Notification variables:");
            println!("{}", serde_json::to_string_pretty(&vars)?);
        }
        Ok(())
    }
}

pub struct ErrorsCommand {
    pub submission_id: i64,
    pub deep: bool,
}

impl ErrorsCommand {
    pub fn new(submission_id: i64, deep: bool) -> Self {
        Self {
            submission_id,
            deep,
        }
    }

    pub async fn execute<S: SubmissionStore>(&self, service: &SubmissionService<S>) -> Result<()> {
        let submission = service.submission(self.submission_id).await?;
        let errors = service.get_errors(&submission, self.deep).await?;

        if errors.is_empty() {
            println!("✅ Submission #{} has no open issues", submission.id);
            return Ok(());
        }

        println!("⚠️  Submission #{} has {} open issue(s):", submission.id, errors.len());
        for error in errors {
            println!("   • {error}");
        }
        Ok(())
    }
}
