use anyhow::{bail, Result};

use crate::forms::is_valid_email;
use crate::storage::{NewSubmitter, SubmissionStore};
use crate::submissions::SubmissionService;

pub struct AddSubmitterCommand {
    pub email: String,
    pub name: Option<String>,
}

impl AddSubmitterCommand {
    pub fn new(email: String, name: Option<String>) -> Self {
        Self { email, name }
    }

    pub async fn execute<S: SubmissionStore>(&self, service: &SubmissionService<S>) -> Result<()> {
        if !is_valid_email(&self.email) {
            bail!("'{}' is not a valid email address", self.email);
        }

        let submitter = service
            .store()
            .insert_submitter(NewSubmitter {
                email: self.email.clone(),
                name: self.name.clone(),
            })
            .await?;
        println!("👤 Registered submitter #{}: {}", submitter.id, submitter.email);
        Ok(())
    }
}

pub struct ListSubmittersCommand;

impl ListSubmittersCommand {
    pub async fn execute<S: SubmissionStore>(&self, service: &SubmissionService<S>) -> Result<()> {
        for (id, email) in service.submitter_options().await? {
            println!("{id:>6}  {email}");
        }
        Ok(())
    }
}
