use anyhow::Result;

use crate::storage::SqliteStore;

pub struct MigrateCommand;

impl MigrateCommand {
    pub fn new() -> Self {
        Self
    }

    pub async fn execute(&self, store: &SqliteStore) -> Result<()> {
        println!("🗄️  Applying database migrations...");
        store.migrate().await?;
        println!("✅ Database is up to date");
        Ok(())
    }
}

impl Default for MigrateCommand {
    fn default() -> Self {
        Self::new()
    }
}
