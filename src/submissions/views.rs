// Derived read-side views over a submission

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::forms::Form;

use super::types::{DataRecord, Submission, Submitter};

pub const REMOVED_TITLE: &str = "[Removed]";
const TITLE_FIELDS: [&str; 2] = ["name", "title"];

/// Whether the submitter may still edit the submission at `now`
pub fn is_writable_at(submission: &Submission, form: &Form, now: DateTime<Utc>) -> bool {
    if submission.status.is_final() {
        return false;
    }

    !form.is_closed_at(now)
}

/// Short label for lists and notifications.
///
/// Purged submissions read `[Removed]`; otherwise the first of `name` or
/// `title` holding more than three characters wins over `#id`.
pub fn title(submission: &Submission, data: Option<&DataRecord>, suffix: &str) -> String {
    let base = match data {
        None => REMOVED_TITLE.to_string(),
        Some(record) => TITLE_FIELDS
            .iter()
            .filter_map(|field| record.get(field).and_then(title_text))
            .find(|text| !text.is_empty() && text.chars().count() > 3)
            .unwrap_or_else(|| format!("#{}", submission.id)),
    };

    format!("{base}{suffix}")
}

fn title_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Backend URL of a submission page, e.g. `preview` or `update`
pub fn admin_url(submission: &Submission, base_url: &str, action: &str) -> String {
    format!(
        "{}/formstore/submissions/{}/{}",
        base_url.trim_end_matches('/'),
        action,
        submission.id
    )
}

/// Variables handed to notification templates
#[derive(Debug, Clone, Serialize)]
pub struct NotificationVars {
    pub id: i64,
    pub status: String,
    pub treated: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitter: Option<Submitter>,
    /// Same as `submitter`, kept for templates that address the sender
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<Submitter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<Form>,
}

pub fn notification_vars(
    submission: &Submission,
    submitter: Option<&Submitter>,
    form: Option<&Form>,
) -> NotificationVars {
    NotificationVars {
        id: submission.id,
        status: submission.status_text().to_string(),
        treated: submission.treated,
        submitter: submitter.cloned(),
        sender: submitter.cloned(),
        form: form.cloned(),
    }
}
