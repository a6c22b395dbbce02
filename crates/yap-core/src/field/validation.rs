//! Field value validation
//!
//! Rules are declared per field in its pattern row. Validation happens
//! after sanitisation and before anything is persisted; the first failing
//! rule aborts the write.

use super::definition::FieldDefinition;
use crate::types::{FieldType, Value};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Declarative validation rules of a field
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationRules {
    pub required: bool,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Regular expression the textual value must match
    pub pattern: Option<String>,
    pub email: bool,
    pub url: bool,
    /// Restrict select/radio/checkbox values to the configured choices
    pub choices_only: bool,
    /// Message shown instead of the rule's default one
    pub message: Option<String>,
}

impl ValidationRules {
    pub fn required() -> Self {
        Self {
            required: true,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &ValidationRules::default()
    }
}

/// Why a value was rejected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub field: String,
    pub rule: String,
    pub message: String,
}

impl ValidationFailure {
    pub fn new(field: impl Into<String>, rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            rule: rule.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.field, self.rule, self.message)
    }
}

impl std::error::Error for ValidationFailure {}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").expect("valid regex")
    })
}

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("valid regex"))
}

/// Validate `value` against the rules and type constraints of `field`.
///
/// `visible` is the outcome of the field's conditional logic; hidden fields
/// are not required.
pub fn validate(
    value: &Value,
    field: &FieldDefinition,
    visible: bool,
) -> Result<(), ValidationFailure> {
    let rules = &field.validation_rules;
    let fail = |rule: &str, default_message: String| {
        ValidationFailure::new(
            field.user_name.clone(),
            rule,
            rules.message.clone().unwrap_or(default_message),
        )
    };

    if value.is_empty_like() {
        if rules.required && visible {
            return Err(fail("required", "This field is required".to_string()));
        }
        return Ok(());
    }

    match &field.field_type {
        FieldType::Number | FieldType::Range => {
            let n = value
                .as_f64()
                .ok_or_else(|| fail("number", format!("Expected a number, got {}", value.type_name())))?;
            let min = rules.min.or_else(|| field.numeric_option("min"));
            let max = rules.max.or_else(|| field.numeric_option("max"));
            if let Some(min) = min {
                if n < min {
                    return Err(fail("min", format!("Value must be at least {}", min)));
                }
            }
            if let Some(max) = max {
                if n > max {
                    return Err(fail("max", format!("Value must be at most {}", max)));
                }
            }
        }
        FieldType::Repeater | FieldType::FlexibleContent => {
            let count = value.as_array().map(Vec::len).unwrap_or(0);
            if let Some(min) = field.repeater_min {
                if count < min as usize {
                    return Err(fail("repeater_min", format!("At least {} rows are required", min)));
                }
            }
            if let Some(max) = field.repeater_max {
                if count > max as usize {
                    return Err(fail("repeater_max", format!("At most {} rows are allowed", max)));
                }
            }
        }
        _ => {}
    }

    if let Some(text) = value.as_str() {
        let length = text.chars().count();
        if let Some(min) = rules.min_length {
            if length < min {
                return Err(fail("min_length", format!("Must be at least {} characters", min)));
            }
        }
        if let Some(max) = rules.max_length {
            if length > max {
                return Err(fail("max_length", format!("Must be at most {} characters", max)));
            }
        }
        if (rules.email || field.field_type == FieldType::Email) && !email_regex().is_match(text) {
            return Err(fail("email", "Invalid email address".to_string()));
        }
        if (rules.url || matches!(field.field_type, FieldType::Url | FieldType::Oembed))
            && !url_regex().is_match(text)
        {
            return Err(fail("url", "Invalid URL".to_string()));
        }
        if let Some(pattern) = &rules.pattern {
            match Regex::new(pattern) {
                Ok(re) if !re.is_match(text) => {
                    return Err(fail("pattern", "Value does not match the required format".to_string()));
                }
                Ok(_) => {}
                Err(e) => {
                    return Err(fail("pattern", format!("Invalid validation pattern: {}", e)));
                }
            }
        }
    }

    if rules.choices_only {
        let choices = field.choices();
        let candidates: Vec<String> = match value {
            Value::Array(items) => items.iter().map(Value::to_storage_string).collect(),
            other => vec![other.to_storage_string()],
        };
        if let Some(bad) = candidates.iter().find(|c| !choices.contains(c)) {
            return Err(fail("choices", format!("'{}' is not an allowed choice", bad)));
        }
    }

    Ok(())
}
