// Read-only rendering of a submission's data and relation rows, driven by
// the form's field config.

use std::fmt;

use serde_json::{Map, Value};

use crate::forms::{FieldDef, FieldType, FormSchema};

pub const NO_DATA_NOTICE: &str =
    "No data available, as the submission has been cancelled by the user.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPreview {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordPreview {
    pub fields: Vec<FieldPreview>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationPreview {
    pub title: String,
    pub rows: Vec<RecordPreview>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionPreview {
    pub title: String,
    pub status: String,
    /// `None` once the data record has been purged
    pub data: Option<RecordPreview>,
    pub relations: Vec<RelationPreview>,
}

/// Renders every field of `schema` in declaration order
pub fn render_record(schema: &FormSchema, values: &Map<String, Value>) -> RecordPreview {
    RecordPreview {
        fields: schema
            .fields_config()
            .iter()
            .map(|field| FieldPreview {
                label: field.display_label(),
                value: format_value(field, values.get(&field.name)),
            })
            .collect(),
    }
}

fn format_value(field: &FieldDef, value: Option<&Value>) -> String {
    let value = match value {
        None | Some(Value::Null) => return String::new(),
        Some(value) => value,
    };

    if field.field_type == FieldType::Checkbox {
        let checked = match value {
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_i64() == Some(1),
            Value::String(s) => matches!(s.as_str(), "1" | "true" | "on" | "yes"),
            _ => false,
        };
        return if checked { "Yes" } else { "No" }.to_string();
    }

    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

impl RecordPreview {
    pub fn to_html(&self) -> String {
        let mut html = String::from("<dl class=\"formstore-preview\">");
        for field in &self.fields {
            html.push_str(&format!(
                "<dt>{}</dt><dd>{}</dd>",
                escape_html(&field.label),
                escape_html(&field.value)
            ));
        }
        html.push_str("</dl>");
        html
    }
}

impl SubmissionPreview {
    /// Data block followed by the relation blocks
    pub fn to_html(&self) -> String {
        let mut html = match &self.data {
            None => format!("<p>{}</p>", escape_html(NO_DATA_NOTICE)),
            Some(record) => record.to_html(),
        };

        if !self.relations.is_empty() {
            html.push_str("<hr />");
            for relation in &self.relations {
                html.push_str(&format!("<h4>{}</h4>", escape_html(&relation.title)));
                for row in &relation.rows {
                    html.push_str(&row.to_html());
                }
            }
        }

        html
    }
}

impl fmt::Display for RecordPreview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .fields
            .iter()
            .map(|field| field.label.chars().count())
            .max()
            .unwrap_or(0);

        for field in &self.fields {
            writeln!(f, "  {:<width$}  {}", field.label, field.value, width = width)?;
        }
        Ok(())
    }
}

impl fmt::Display for SubmissionPreview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} [{}]", self.title, self.status)?;
        writeln!(f)?;

        match &self.data {
            None => writeln!(f, "{NO_DATA_NOTICE}")?,
            Some(record) => write!(f, "{record}")?,
        }

        for relation in &self.relations {
            writeln!(f)?;
            writeln!(f, "{} ({})", relation.title, relation.rows.len())?;
            for (index, row) in relation.rows.iter().enumerate() {
                writeln!(f, " #{}", index + 1)?;
                write!(f, "{row}")?;
            }
        }
        Ok(())
    }
}
