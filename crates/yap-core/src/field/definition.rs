//! Field definitions (pattern rows) and data rows

use super::conditional::ConditionalLogic;
use super::validation::ValidationRules;
use crate::group::slugify;
use crate::types::{FieldType, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Type specific configuration of a field (choices, return format, ...)
pub type FieldOptions = HashMap<String, Value>;

/// A field definition as stored in a group's pattern table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Row id, assigned by the store
    #[serde(default)]
    pub id: Option<i64>,

    /// Stable machine key, unique within the group
    pub generated_name: String,

    /// Display label
    pub user_name: String,

    pub field_type: FieldType,

    #[serde(default)]
    pub field_options: FieldOptions,

    #[serde(default)]
    pub validation_rules: ValidationRules,

    #[serde(default)]
    pub conditional_logic: Option<ConditionalLogic>,

    #[serde(default)]
    pub is_repeater: bool,

    #[serde(default)]
    pub repeater_min: Option<u32>,

    #[serde(default)]
    pub repeater_max: Option<u32>,

    /// Layout used when rendering repeater / group sub fields
    #[serde(default)]
    pub layout_type: Option<String>,

    /// Parent definition for sub fields
    #[serde(default)]
    pub parent_id: Option<i64>,
}

impl FieldDefinition {
    /// Create a definition with a generated machine key
    pub fn new(label: impl Into<String>, field_type: FieldType) -> Self {
        let user_name = label.into();
        let generated_name = generate_name(&user_name, &field_type);
        Self {
            id: None,
            generated_name,
            is_repeater: field_type == FieldType::Repeater,
            user_name,
            field_type,
            field_options: FieldOptions::new(),
            validation_rules: ValidationRules::default(),
            conditional_logic: None,
            repeater_min: None,
            repeater_max: None,
            layout_type: None,
            parent_id: None,
        }
    }

    /// Override the generated machine key
    pub fn with_name(mut self, generated_name: impl Into<String>) -> Self {
        self.generated_name = generated_name.into();
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.field_options.insert(key.into(), value.into());
        self
    }

    pub fn with_rules(mut self, rules: ValidationRules) -> Self {
        self.validation_rules = rules;
        self
    }

    pub fn with_conditional_logic(mut self, logic: ConditionalLogic) -> Self {
        self.conditional_logic = Some(logic);
        self
    }

    pub fn with_parent(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_repeater_bounds(mut self, min: Option<u32>, max: Option<u32>) -> Self {
        self.repeater_min = min;
        self.repeater_max = max;
        self
    }

    /// True when `name` is this field's label or machine key
    pub fn matches_name(&self, name: &str) -> bool {
        self.generated_name == name || self.user_name == name
    }

    /// Configured choices for select/radio/checkbox fields.
    ///
    /// Accepts either an array of values or a `{value: label}` map.
    pub fn choices(&self) -> Vec<String> {
        match self.field_options.get("choices") {
            Some(Value::Array(items)) => items.iter().map(Value::to_storage_string).collect(),
            Some(Value::Object(map)) => {
                let mut keys: Vec<String> = map.keys().cloned().collect();
                keys.sort();
                keys
            }
            _ => Vec::new(),
        }
    }

    /// Group names referenced by a nested group field
    pub fn nested_group_ids(&self) -> Vec<String> {
        match self.field_options.get("nested_field_ids") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Image/file fields configured to return a URL instead of an id
    pub fn return_url(&self) -> bool {
        matches!(
            self.field_options.get("return_format"),
            Some(Value::String(s)) if s == "url"
        )
    }

    /// Numeric option lookup (`min`, `max`, `step`, ...)
    pub fn numeric_option(&self, key: &str) -> Option<f64> {
        self.field_options.get(key).and_then(Value::as_f64)
    }
}

/// Build a stable machine key from a label
pub fn generate_name(label: &str, field_type: &FieldType) -> String {
    let slug = slugify(label);
    match field_type {
        FieldType::Repeater => format!("repeater_{}", slug),
        _ => format!("field_{}", slug),
    }
}

/// A value row as stored in a group's data table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValueRow {
    #[serde(default)]
    pub id: Option<i64>,
    pub generated_name: String,
    /// Copy of the field label for lookup without the pattern table
    pub user_name: String,
    pub field_type: FieldType,
    /// Encoded value, JSON for composite types
    pub field_value: String,
    /// Owning post
    pub associated_id: i64,
}

impl FieldValueRow {
    /// Build a row for `value`, copying label and type from the definition
    pub fn for_field(definition: &FieldDefinition, value: &Value, post_id: i64) -> Self {
        Self {
            id: None,
            generated_name: definition.generated_name.clone(),
            user_name: definition.user_name.clone(),
            field_type: definition.field_type.clone(),
            field_value: value.to_storage_string(),
            associated_id: post_id,
        }
    }

    /// Decode the stored value according to the row's type
    pub fn decoded(&self) -> Value {
        Value::from_storage(&self.field_value, &self.field_type)
    }
}

/// A decoded value with its label, as returned by "all fields" reads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldEntry {
    pub label: String,
    pub name: String,
    pub value: Value,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}
