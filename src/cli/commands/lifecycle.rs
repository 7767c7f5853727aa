use anyhow::Result;

use crate::storage::SubmissionStore;
use crate::submissions::SubmissionService;

pub struct SubmitCommand {
    pub submission_id: i64,
}

impl SubmitCommand {
    pub fn new(submission_id: i64) -> Self {
        Self { submission_id }
    }

    pub async fn execute<S: SubmissionStore>(&self, service: &SubmissionService<S>) -> Result<()> {
        let mut submission = service.submission(self.submission_id).await?;

        if service.submit(&mut submission).await? {
            println!("📬 Submission #{} submitted", submission.id);
            return Ok(());
        }

        println!(
            "⛔ Submission #{} was not submitted (status: {})",
            submission.id,
            submission.status_text()
        );
        for error in service.get_errors(&submission, true).await? {
            println!("   • {error}");
        }
        Ok(())
    }
}

pub struct WithdrawCommand {
    pub submission_id: i64,
}

impl WithdrawCommand {
    pub fn new(submission_id: i64) -> Self {
        Self { submission_id }
    }

    pub async fn execute<S: SubmissionStore>(&self, service: &SubmissionService<S>) -> Result<()> {
        let mut submission = service.submission(self.submission_id).await?;

        if service.withdraw(&mut submission).await? {
            println!("🗑️  Submission #{} withdrawn and its data removed", submission.id);
        } else {
            println!(
                "⛔ Submission #{} can no longer be withdrawn (status: {})",
                submission.id,
                submission.status_text()
            );
        }
        Ok(())
    }
}
