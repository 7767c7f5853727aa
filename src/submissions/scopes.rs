// Query scopes: predicate builders evaluated by the storage layer

use std::str::FromStr;

use serde_json::Value;

use crate::error::FormStoreError;
use crate::forms::Form;

use super::types::{Submission, SubmissionState};

/// Comparison operator of a status filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Comparison {
    #[default]
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    pub fn as_sql(self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Ne => "!=",
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
        }
    }

    pub fn holds(self, lhs: i64, rhs: i64) -> bool {
        match self {
            Comparison::Eq => lhs == rhs,
            Comparison::Ne => lhs != rhs,
            Comparison::Lt => lhs < rhs,
            Comparison::Le => lhs <= rhs,
            Comparison::Gt => lhs > rhs,
            Comparison::Ge => lhs >= rhs,
        }
    }
}

impl FromStr for Comparison {
    type Err = FormStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "=" | "==" => Ok(Comparison::Eq),
            "!=" | "<>" => Ok(Comparison::Ne),
            "<" => Ok(Comparison::Lt),
            "<=" => Ok(Comparison::Le),
            ">" => Ok(Comparison::Gt),
            ">=" => Ok(Comparison::Ge),
            other => Err(FormStoreError::InvalidFilter {
                reason: format!("unsupported operator '{other}'"),
            }),
        }
    }
}

/// Anything that identifies a form: an id, a form, or a JSON object with `id`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormSelector(pub i64);

impl From<i64> for FormSelector {
    fn from(id: i64) -> Self {
        FormSelector(id)
    }
}

impl From<&Form> for FormSelector {
    fn from(form: &Form) -> Self {
        FormSelector(form.id)
    }
}

impl TryFrom<&Value> for FormSelector {
    type Error = FormStoreError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let id = match value {
            Value::Object(map) => map.get("id").and_then(numeric_id),
            other => numeric_id(other),
        };

        id.map(FormSelector).ok_or_else(|| FormStoreError::InvalidFilter {
            reason: format!("cannot select a form from {value}"),
        })
    }
}

fn numeric_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    FormIs(i64),
    Status { op: Comparison, code: i64 },
}

impl Predicate {
    pub fn matches(&self, submission: &Submission) -> bool {
        match self {
            Predicate::FormIs(form_id) => submission.form_id == *form_id,
            Predicate::Status { op, code } => op.holds(submission.status.code(), *code),
        }
    }

    /// SQL fragment with a single positional parameter and its value
    pub fn to_sql(&self) -> (String, i64) {
        match self {
            Predicate::FormIs(form_id) => ("form_id = ?".to_string(), *form_id),
            Predicate::Status { op, code } => (format!("status {} ?", op.as_sql()), *code),
        }
    }
}

pub fn by_form(form: impl Into<FormSelector>) -> Predicate {
    Predicate::FormIs(form.into().0)
}

pub fn in_state(state: SubmissionState) -> Predicate {
    in_state_with(state, Comparison::Eq)
}

pub fn in_state_with(state: SubmissionState, op: Comparison) -> Predicate {
    Predicate::Status {
        op,
        code: state.code(),
    }
}

/// Everything that was not withdrawn
pub fn active() -> Predicate {
    in_state_with(SubmissionState::Cancelled, Comparison::Ne)
}

/// Conjunction of scopes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionQuery {
    predicates: Vec<Predicate>,
}

impl SubmissionQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn by_form(self, form: impl Into<FormSelector>) -> Self {
        self.with(by_form(form))
    }

    pub fn in_state(self, state: SubmissionState) -> Self {
        self.with(in_state(state))
    }

    pub fn in_state_with(self, state: SubmissionState, op: Comparison) -> Self {
        self.with(in_state_with(state, op))
    }

    pub fn active(self) -> Self {
        self.with(active())
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn matches(&self, submission: &Submission) -> bool {
        self.predicates.iter().all(|p| p.matches(submission))
    }

    /// `WHERE` clause (empty when unfiltered) and its bind values in order
    pub fn where_clause(&self) -> (String, Vec<i64>) {
        if self.predicates.is_empty() {
            return (String::new(), Vec::new());
        }

        let (fragments, binds): (Vec<String>, Vec<i64>) =
            self.predicates.iter().map(Predicate::to_sql).unzip();

        (format!("WHERE {}", fragments.join(" AND ")), binds)
    }
}
