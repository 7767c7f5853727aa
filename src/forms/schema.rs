use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FormStoreError;

use super::validation;

/// Input widget used to render a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Textarea,
    Email,
    Number,
    Checkbox,
    Dropdown,
    Date,
}

/// A single validation rule attached to a field
#[derive(Debug, Clone)]
pub enum FieldRule {
    Required,
    Email,
    Numeric,
    Integer,
    Boolean,
    Date,
    Min(f64),
    Max(f64),
    In(Vec<String>),
    /// `regex:` takes the rest of the rule list as its pattern, pipes included,
    /// so it has to come last
    Pattern(Regex),
}

impl FieldRule {
    /// Parse one rule in `name:argument` notation (e.g. `max:255`, `in:a,b`)
    pub fn parse(rule: &str) -> Result<Self, FormStoreError> {
        let (name, arg) = match rule.split_once(':') {
            Some((name, arg)) => (name.trim(), Some(arg)),
            None => (rule.trim(), None),
        };

        let invalid = |reason: &str| FormStoreError::InvalidRule {
            rule: rule.to_string(),
            reason: reason.to_string(),
        };

        let bound = |arg: Option<&str>| -> Result<f64, FormStoreError> {
            arg.ok_or_else(|| invalid("missing bound"))?
                .trim()
                .parse::<f64>()
                .map_err(|_| invalid("bound must be a number"))
        };

        match name {
            "required" => Ok(FieldRule::Required),
            "email" => Ok(FieldRule::Email),
            "numeric" => Ok(FieldRule::Numeric),
            "integer" => Ok(FieldRule::Integer),
            "boolean" => Ok(FieldRule::Boolean),
            "date" => Ok(FieldRule::Date),
            "min" => Ok(FieldRule::Min(bound(arg)?)),
            "max" => Ok(FieldRule::Max(bound(arg)?)),
            "in" => {
                let values = arg
                    .ok_or_else(|| invalid("missing value list"))?
                    .split(',')
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .collect::<Vec<_>>();
                if values.is_empty() {
                    return Err(invalid("empty value list"));
                }
                Ok(FieldRule::In(values))
            }
            "regex" => {
                let pattern = arg.ok_or_else(|| invalid("missing pattern"))?;
                Regex::new(pattern)
                    .map(FieldRule::Pattern)
                    .map_err(|e| invalid(&e.to_string()))
            }
            _ => Err(invalid("unsupported rule")),
        }
    }
}

/// Parsed rule list, kept alongside the pipe-separated source it came from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RuleSet {
    source: String,
    rules: Vec<FieldRule>,
}

impl RuleSet {
    pub fn parse(source: &str) -> Result<Self, FormStoreError> {
        let (head, pattern) = match source.find("regex:") {
            Some(at) if source[..at].trim_end().is_empty() || source[..at].trim_end().ends_with('|') => {
                (&source[..at], Some(&source[at..]))
            }
            _ => (source, None),
        };

        let rules = head
            .split('|')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .chain(pattern)
            .map(FieldRule::parse)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            source: source.to_string(),
            rules,
        })
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    pub fn is_required(&self) -> bool {
        self.rules.iter().any(|r| matches!(r, FieldRule::Required))
    }

    pub fn expects_number(&self) -> bool {
        self.rules
            .iter()
            .any(|r| matches!(r, FieldRule::Numeric | FieldRule::Integer))
    }
}

impl TryFrom<String> for RuleSet {
    type Error = FormStoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RuleSet::parse(&value)
    }
}

impl From<RuleSet> for String {
    fn from(value: RuleSet) -> Self {
        value.source
    }
}

/// Field definition in a form schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub rules: RuleSet,
    /// Choices for dropdown fields
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl FieldDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            label: None,
            field_type: FieldType::Text,
            rules: RuleSet::default(),
            options: Vec::new(),
            comment: None,
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn with_type(mut self, field_type: FieldType) -> Self {
        self.field_type = field_type;
        self
    }

    pub fn with_rules(mut self, rules: &str) -> Result<Self, FormStoreError> {
        self.rules = RuleSet::parse(rules)?;
        Ok(self)
    }

    /// Human-readable name used in messages and previews
    pub fn display_label(&self) -> String {
        match &self.label {
            Some(label) if !label.trim().is_empty() => label.clone(),
            _ => self.name.replace('_', " "),
        }
    }
}

/// Field schema of a record kind.
///
/// `kind` doubles as the `data_type` identifier stored on submissions and
/// is what the record registry resolves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormSchema {
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl FormSchema {
    pub fn new(kind: &str, title: &str) -> Self {
        Self {
            kind: kind.to_string(),
            title: title.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Field configuration used for rendering
    pub fn fields_config(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn validate(&self, data: &Map<String, Value>) -> Vec<String> {
        validation::validate(self, data)
    }
}

/// Repeatable nested sub-form attached to a form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationDef {
    /// Relation name on the data record
    pub field: String,
    pub title: String,
    pub target: FormSchema,
    #[serde(default)]
    pub required_min: u32,
}

/// Form definition owning the field schema and nested relation definitions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Form {
    #[serde(default)]
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub closes_at: Option<DateTime<Utc>>,
    pub schema: FormSchema,
    #[serde(default)]
    pub relations: Vec<RelationDef>,
}

impl Form {
    pub fn new(id: i64, title: &str, schema: FormSchema) -> Self {
        Self {
            id,
            title: title.to_string(),
            closes_at: None,
            schema,
            relations: Vec::new(),
        }
    }

    pub fn with_relation(mut self, relation: RelationDef) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn closing_at(mut self, closes_at: DateTime<Utc>) -> Self {
        self.closes_at = Some(closes_at);
        self
    }

    pub fn fields_config(&self) -> &[FieldDef] {
        self.schema.fields_config()
    }

    pub fn validate(&self, data: &Map<String, Value>) -> Vec<String> {
        self.schema.validate(data)
    }

    pub fn rels(&self) -> &[RelationDef] {
        &self.relations
    }

    pub fn is_closed_at(&self, now: DateTime<Utc>) -> bool {
        self.closes_at.is_some_and(|closes_at| closes_at < now)
    }
}
