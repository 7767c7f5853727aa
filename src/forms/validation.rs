use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::{Map, Value};

use super::schema::{FieldDef, FieldRule, FormSchema};

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
    )
    .expect("email pattern is valid")
});

/// Checks that an address is a plausible RFC 5322 mailbox
pub fn is_valid_email(address: &str) -> bool {
    if address.len() > 254 || !EMAIL_PATTERN.is_match(address) {
        return false;
    }

    match address.rsplit_once('@') {
        Some((local, _)) => {
            local.len() <= 64
                && !local.starts_with('.')
                && !local.ends_with('.')
                && !local.contains("..")
        }
        None => false,
    }
}

/// Validates a data map against a schema.
///
/// Messages are returned in field declaration order. Only `required` applies
/// to absent or empty values; every other rule is skipped for them.
pub fn validate(schema: &FormSchema, data: &Map<String, Value>) -> Vec<String> {
    let mut errors = Vec::new();

    for field in &schema.fields {
        let value = data.get(&field.name).unwrap_or(&Value::Null);

        if is_empty(value) {
            if field.rules.is_required() {
                errors.push(format!("The {} field is required.", field.display_label()));
            }
            continue;
        }

        for rule in field.rules.rules() {
            if let Some(message) = check_rule(field, rule, value) {
                errors.push(message);
            }
        }
    }

    errors
}

fn check_rule(field: &FieldDef, rule: &FieldRule, value: &Value) -> Option<String> {
    let label = field.display_label();

    match rule {
        FieldRule::Required => None,
        FieldRule::Email => match value.as_str() {
            Some(s) if is_valid_email(s.trim()) => None,
            _ => Some(format!("The {label} must be a valid email address.")),
        },
        FieldRule::Numeric => match as_number(value) {
            Some(_) => None,
            None => Some(format!("The {label} must be a number.")),
        },
        FieldRule::Integer => match as_number(value) {
            Some(n) if n.fract() == 0.0 => None,
            _ => Some(format!("The {label} must be an integer.")),
        },
        FieldRule::Boolean => {
            if as_bool(value).is_some() {
                None
            } else {
                Some(format!("The {label} field must be true or false."))
            }
        }
        FieldRule::Date => match value.as_str() {
            Some(s) if is_date(s.trim()) => None,
            _ => Some(format!("The {label} is not a valid date.")),
        },
        FieldRule::Min(min) => match measure(field, value) {
            Some(Measure::Value(n)) if n < *min => {
                Some(format!("The {label} must be at least {}.", fmt_bound(*min)))
            }
            Some(Measure::Chars(n)) if (n as f64) < *min => Some(format!(
                "The {label} must be at least {} characters.",
                fmt_bound(*min)
            )),
            Some(Measure::Items(n)) if (n as f64) < *min => Some(format!(
                "The {label} must have at least {} items.",
                fmt_bound(*min)
            )),
            _ => None,
        },
        FieldRule::Max(max) => match measure(field, value) {
            Some(Measure::Value(n)) if n > *max => Some(format!(
                "The {label} may not be greater than {}.",
                fmt_bound(*max)
            )),
            Some(Measure::Chars(n)) if (n as f64) > *max => Some(format!(
                "The {label} may not be greater than {} characters.",
                fmt_bound(*max)
            )),
            Some(Measure::Items(n)) if (n as f64) > *max => Some(format!(
                "The {label} may not have more than {} items.",
                fmt_bound(*max)
            )),
            _ => None,
        },
        FieldRule::In(allowed) => {
            let candidate = scalar_text(value);
            match candidate {
                Some(text) if allowed.iter().any(|a| *a == text) => None,
                _ => Some(format!("The selected {label} is invalid.")),
            }
        }
        FieldRule::Pattern(pattern) => match scalar_text(value) {
            Some(text) if pattern.is_match(&text) => None,
            _ => Some(format!("The {label} format is invalid.")),
        },
    }
}

enum Measure {
    Value(f64),
    Chars(usize),
    Items(usize),
}

fn measure(field: &FieldDef, value: &Value) -> Option<Measure> {
    match value {
        Value::Number(n) => n.as_f64().map(Measure::Value),
        Value::String(s) if field.rules.expects_number() => {
            s.trim().parse::<f64>().ok().map(Measure::Value)
        }
        Value::String(s) => Some(Measure::Chars(s.chars().count())),
        Value::Array(items) => Some(Measure::Items(items.len())),
        _ => None,
    }
}

fn fmt_bound(bound: f64) -> String {
    if bound.fract() == 0.0 {
        format!("{}", bound as i64)
    } else {
        bound.to_string()
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim() {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn is_date(text: &str) -> bool {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
        || NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").is_ok()
        || DateTime::parse_from_rfc3339(text).is_ok()
}
