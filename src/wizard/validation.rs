//! Per-step validation schemas.
//!
//! A `StepSchema` is a list of field specs plus optional cross-field checks.
//! Evaluation is plain code returning a `StepValidation`, so the runtime can
//! re-run it after every edit and once more on submit.

use std::collections::BTreeMap;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

/// Message used when a required field is missing.
pub const REQUIRED_MESSAGE: &str = "Required Field";

/// The shape of a single form field.
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// Exactly one of the enumerated options.
    Choice { options: Vec<String> },
    /// A list of enumerated options with at least `min` entries.
    MultiChoice { options: Vec<String>, min: usize },
    /// Free text, optionally matched against a pattern.
    Text { pattern: Option<Regex> },
    /// A number (or numeric string) within optional bounds.
    Number { min: Option<f64>, max: Option<f64> },
    /// A checkbox that must be ticked.
    Accept,
}

/// A field in a step form.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
    pub required: bool,
    /// Overrides the default message for constraint failures.
    pub message: Option<String>,
}

impl FieldSpec {
    fn new(name: &str, label: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            kind,
            required: true,
            message: None,
        }
    }

    pub fn choice(name: &str, label: &str, options: &[&str]) -> Self {
        Self::new(
            name,
            label,
            FieldKind::Choice {
                options: to_owned(options),
            },
        )
    }

    pub fn multi_choice(name: &str, label: &str, options: &[&str], min: usize) -> Self {
        Self::new(
            name,
            label,
            FieldKind::MultiChoice {
                options: to_owned(options),
                min,
            },
        )
    }

    pub fn text(name: &str, label: &str) -> Self {
        Self::new(name, label, FieldKind::Text { pattern: None })
    }

    pub fn pattern(name: &str, label: &str, pattern: Regex) -> Self {
        Self::new(
            name,
            label,
            FieldKind::Text {
                pattern: Some(pattern),
            },
        )
    }

    pub fn number(name: &str, label: &str, min: Option<f64>, max: Option<f64>) -> Self {
        Self::new(name, label, FieldKind::Number { min, max })
    }

    pub fn accept(name: &str, label: &str) -> Self {
        Self::new(name, label, FieldKind::Accept)
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }

    /// Options offered by choice fields, empty for everything else.
    pub fn options(&self) -> &[String] {
        match &self.kind {
            FieldKind::Choice { options } | FieldKind::MultiChoice { options, .. } => options,
            _ => &[],
        }
    }

    /// Check a single value against this field. Returns the failure message.
    pub fn check(&self, value: Option<&Value>) -> Option<String> {
        let value = match value {
            None | Some(Value::Null) => {
                return self.required.then(|| REQUIRED_MESSAGE.to_string());
            }
            Some(Value::String(s)) if s.trim().is_empty() => {
                return self.required.then(|| REQUIRED_MESSAGE.to_string());
            }
            Some(v) => v,
        };

        let failure = match &self.kind {
            FieldKind::Choice { options } => match value.as_str() {
                Some(s) if options.iter().any(|o| o == s) => None,
                Some(s) => Some(format!("{} must be one of the listed options, got \"{s}\"", self.name)),
                None => Some(format!("{} must be a single option", self.name)),
            },
            FieldKind::MultiChoice { options, min } => match value.as_array() {
                Some(items) => {
                    if let Some(bad) = items
                        .iter()
                        .find(|item| !item.as_str().is_some_and(|s| options.iter().any(|o| o == s)))
                    {
                        Some(format!("{} contains an unknown option {bad}", self.name))
                    } else if items.len() < *min {
                        if items.is_empty() && self.required {
                            Some(REQUIRED_MESSAGE.to_string())
                        } else {
                            Some(format!("{} must have at least {min} items", self.name))
                        }
                    } else {
                        None
                    }
                }
                None => Some(format!("{} must be a list of options", self.name)),
            },
            FieldKind::Text { pattern } => match value.as_str() {
                Some(s) => match pattern {
                    Some(re) if !re.is_match(s.trim()) => {
                        Some(format!("{} has an invalid format", self.name))
                    }
                    _ => None,
                },
                None => Some(format!("{} must be text", self.name)),
            },
            FieldKind::Number { min, max } => match as_number(value) {
                Some(n) if min.is_some_and(|m| n < m) => Some(format!(
                    "{} must be at least {}",
                    self.name,
                    min.unwrap_or_default()
                )),
                Some(n) if max.is_some_and(|m| n > m) => Some(format!(
                    "{} must be at most {}",
                    self.name,
                    max.unwrap_or_default()
                )),
                Some(_) => None,
                None => Some(format!("{} must be a number", self.name)),
            },
            FieldKind::Accept => match value.as_bool() {
                Some(true) => None,
                Some(false) if !self.required => None,
                _ => Some(format!("{} must be accepted", self.name)),
            },
        };

        failure.map(|default| self.message.clone().unwrap_or(default))
    }
}

/// A predicate over the whole form, reported against one field.
#[derive(Debug, Clone)]
pub struct CrossFieldCheck {
    pub field: String,
    pub message: String,
    pub predicate: fn(&Map<String, Value>) -> bool,
}

/// Declarative constraints for one step.
#[derive(Debug, Clone, Default)]
pub struct StepSchema {
    pub fields: Vec<FieldSpec>,
    pub checks: Vec<CrossFieldCheck>,
}

impl StepSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self {
            fields,
            checks: Vec::new(),
        }
    }

    /// A schema with no fields; always valid.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_check(
        mut self,
        field: &str,
        message: &str,
        predicate: fn(&Map<String, Value>) -> bool,
    ) -> Self {
        self.checks.push(CrossFieldCheck {
            field: field.to_string(),
            message: message.to_string(),
            predicate,
        });
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Validate one field in the context of the whole form.
    ///
    /// Field constraints win; cross-field checks only report once the
    /// field itself is well-formed.
    pub fn validate_field(&self, name: &str, form: &Map<String, Value>) -> Option<String> {
        if let Some(spec) = self.field(name)
            && let Some(message) = spec.check(form.get(name))
        {
            return Some(message);
        }
        self.checks
            .iter()
            .filter(|c| c.field == name)
            .find(|c| !(c.predicate)(form))
            .map(|c| c.message.clone())
    }

    /// Validate every field, keeping the first failure per field.
    pub fn validate(&self, form: &Map<String, Value>) -> StepValidation {
        let mut field_errors = BTreeMap::new();
        for spec in &self.fields {
            if let Some(message) = self.validate_field(&spec.name, form) {
                field_errors.insert(spec.name.clone(), message);
            }
        }
        for check in &self.checks {
            if field_errors.contains_key(&check.field) {
                continue;
            }
            if !(check.predicate)(form) {
                field_errors.insert(check.field.clone(), check.message.clone());
            }
        }
        StepValidation { field_errors }
    }
}

/// Outcome of validating a step form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StepValidation {
    pub field_errors: BTreeMap<String, String>,
}

impl StepValidation {
    pub fn is_valid(&self) -> bool {
        self.field_errors.is_empty()
    }

    pub fn error_for(&self, field: &str) -> Option<&str> {
        self.field_errors.get(field).map(String::as_str)
    }
}

/// Read a number from either a JSON number or a numeric string.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn to_owned(options: &[&str]) -> Vec<String> {
    options.iter().map(|o| o.to_string()).collect()
}
