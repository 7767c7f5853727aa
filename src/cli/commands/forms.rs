use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::forms::Form;
use crate::storage::SubmissionStore;
use crate::submissions::SubmissionService;

/// Loads a form definition (JSON) into the store
pub struct ImportFormCommand {
    pub path: PathBuf,
}

impl ImportFormCommand {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub async fn execute<S: SubmissionStore>(&self, service: &mut SubmissionService<S>) -> Result<()> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let form: Form = serde_json::from_str(&text)
            .with_context(|| format!("{} is not a valid form definition", self.path.display()))?;

        let form = service.register_form(form).await?;
        println!("📥 Imported form #{}: {}", form.id, form.title);
        println!("   🧩 Record kind: {}", form.schema.kind);
        if !form.rels().is_empty() {
            let relations: Vec<&str> = form.rels().iter().map(|r| r.field.as_str()).collect();
            println!("   🔗 Relations: {}", relations.join(", "));
        }
        Ok(())
    }
}

pub struct ListFormsCommand;

impl ListFormsCommand {
    pub async fn execute<S: SubmissionStore>(&self, service: &SubmissionService<S>) -> Result<()> {
        let options = service.form_options().await?;
        if options.is_empty() {
            println!("📋 No forms yet");
            println!("   💡 Import one with: formstore form import form.json");
            return Ok(());
        }

        for (id, title) in options {
            println!("{id:>6}  {title}");
        }
        Ok(())
    }
}
