use std::path::PathBuf;

use anyhow::Result;

use crate::storage::SubmissionStore;
use crate::submissions::{SubmissionQuery, SubmissionService};

pub struct ExportEmailsCommand {
    pub query: SubmissionQuery,
    pub filename: String,
    pub output: Option<PathBuf>,
}

impl ExportEmailsCommand {
    pub fn new(query: SubmissionQuery, filename: String) -> Self {
        Self {
            query,
            filename,
            output: None,
        }
    }

    pub fn with_output(mut self, output: Option<PathBuf>) -> Self {
        self.output = output;
        self
    }

    pub async fn execute<S: SubmissionStore>(&self, service: &SubmissionService<S>) -> Result<()> {
        let export = service.export_emails(&self.query, &self.filename).await?;

        match &self.output {
            Some(path) => {
                export.write_to(path).await?;
                println!("📤 Exported {} address(es) to {}", export.count, path.display());
            }
            None => {
                for (name, value) in export.headers() {
                    eprintln!("{name}: {value}");
                }
                print!("{}", export.body);
            }
        }
        Ok(())
    }
}
