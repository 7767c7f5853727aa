use anyhow::Result;

use crate::storage::SubmissionStore;
use crate::submissions::{SubmissionQuery, SubmissionService};

pub struct ListCommand {
    pub query: SubmissionQuery,
}

impl ListCommand {
    pub fn new(query: SubmissionQuery) -> Self {
        Self { query }
    }

    pub async fn execute<S: SubmissionStore>(&self, service: &SubmissionService<S>) -> Result<()> {
        let submissions = service.list(&self.query).await?;
        if submissions.is_empty() {
            println!("📋 No matching submissions");
            return Ok(());
        }

        for submission in &submissions {
            let title = service.title(submission, "").await?;
            println!(
                "{:>6}  {:<10} form #{:<4} {}",
                submission.id,
                submission.status_text(),
                submission.form_id,
                title
            );
        }
        println!();
        println!("📈 {} submission(s)", submissions.len());
        Ok(())
    }
}
