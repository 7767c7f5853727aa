use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, info};

use crate::error::Result;
use crate::forms::is_valid_email;

pub const DEFAULT_EXPORT_FILENAME: &str = "emails.txt";
pub const EXPORT_CONTENT_TYPE: &str = "text/plain";

/// Downloadable list of submitter addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailExport {
    pub filename: String,
    pub body: String,
    pub count: usize,
}

impl EmailExport {
    /// Keeps valid addresses in first-occurrence order; invalid and repeated
    /// ones are dropped without being reported.
    pub fn from_addresses<I, S>(addresses: I, filename: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut kept = Vec::new();
        let mut skipped = 0usize;

        for address in addresses {
            let address = address.as_ref();
            if is_valid_email(address) && seen.insert(address.to_string()) {
                kept.push(address.to_string());
            } else {
                skipped += 1;
            }
        }

        debug!(kept = kept.len(), skipped, "Collected export addresses");

        Self {
            filename: filename.to_string(),
            count: kept.len(),
            body: kept.join(","),
        }
    }

    pub fn content_type(&self) -> &'static str {
        EXPORT_CONTENT_TYPE
    }

    /// Length of the body in bytes
    pub fn content_length(&self) -> usize {
        self.body.len()
    }

    pub fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Content-Type", self.content_type().to_string()),
            (
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", self.filename),
            ),
            ("Content-Length", self.content_length().to_string()),
        ]
    }

    pub async fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        tokio::fs::write(path, self.body.as_bytes()).await?;
        info!(
            path = %path.display(),
            addresses = self.count,
            bytes = self.content_length(),
            "Wrote email export"
        );
        Ok(())
    }
}
