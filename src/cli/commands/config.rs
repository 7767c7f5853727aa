use anyhow::Result;

use crate::config::FormStoreConfig;

pub const CONFIG_FILE: &str = "formstore.toml";

pub struct ConfigCommand {
    pub write: bool,
}

impl ConfigCommand {
    pub fn new(write: bool) -> Self {
        Self { write }
    }

    pub fn execute(&self, config: &FormStoreConfig) -> Result<()> {
        if self.write {
            config.save_to_file(CONFIG_FILE)?;
            println!("⚙️  Wrote configuration to {CONFIG_FILE}");
            return Ok(());
        }

        print!("{}", toml::to_string_pretty(config)?);
        Ok(())
    }
}
