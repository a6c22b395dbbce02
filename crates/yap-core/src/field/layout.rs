//! Flexible content layouts

use super::definition::FieldDefinition;
use serde::{Deserialize, Serialize};

/// One allowed section layout of a flexible content field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutDefinition {
    /// Machine name stored on each section
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub sub_fields: Vec<FieldDefinition>,
}

impl LayoutDefinition {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            sub_fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: FieldDefinition) -> Self {
        self.sub_fields.push(field);
        self
    }
}
