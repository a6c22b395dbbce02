//! Conditional display logic
//!
//! A field's conditional logic is an OR of AND-groups, the same shape as
//! location rules. A field hidden by its logic is skipped by `required`
//! validation.

use crate::types::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Comparison used by a single condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionOperator {
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "empty")]
    Empty,
    #[serde(rename = "not_empty")]
    NotEmpty,
}

/// A single comparison against a sibling field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Sibling field, by label or machine key
    pub field: String,
    pub operator: ConditionOperator,
    #[serde(default)]
    pub value: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: ConditionOperator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    fn holds(&self, values: &HashMap<String, Value>) -> bool {
        let actual = values.get(&self.field).unwrap_or(&Value::Null);

        match self.operator {
            ConditionOperator::Empty => actual.is_empty_like(),
            ConditionOperator::NotEmpty => !actual.is_empty_like(),
            ConditionOperator::Equal => loosely_equal(actual, &self.value),
            ConditionOperator::NotEqual => !loosely_equal(actual, &self.value),
            ConditionOperator::GreaterThan => match (actual.as_f64(), self.value.as_f64()) {
                (Some(a), Some(b)) => a > b,
                _ => false,
            },
            ConditionOperator::LessThan => match (actual.as_f64(), self.value.as_f64()) {
                (Some(a), Some(b)) => a < b,
                _ => false,
            },
            ConditionOperator::Contains => match actual {
                Value::Array(items) => items.iter().any(|item| loosely_equal(item, &self.value)),
                Value::String(s) => s.contains(&self.value.to_storage_string()),
                _ => false,
            },
        }
    }
}

/// OR of AND-groups of conditions
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionalLogic {
    pub groups: Vec<Vec<Condition>>,
}

impl ConditionalLogic {
    pub fn new(groups: Vec<Vec<Condition>>) -> Self {
        Self { groups }
    }

    /// Evaluate against the current values of sibling fields.
    ///
    /// No groups means the field is always visible.
    pub fn is_visible(&self, values: &HashMap<String, Value>) -> bool {
        if self.groups.is_empty() {
            return true;
        }
        self.groups
            .iter()
            .any(|group| group.iter().all(|condition| condition.holds(values)))
    }
}

/// Form values arrive as strings, so compare via the storage encoding
fn loosely_equal(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) if !matches!(a, Value::Bool(_)) && !matches!(b, Value::Bool(_)) => {
            x == y
        }
        _ => a.to_storage_string() == b.to_storage_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_empty_logic_is_visible() {
        assert!(ConditionalLogic::default().is_visible(&HashMap::new()));
    }

    #[test]
    fn test_and_within_group_or_across_groups() {
        let logic = ConditionalLogic::new(vec![
            vec![
                Condition::new("type", ConditionOperator::Equal, "book"),
                Condition::new("pages", ConditionOperator::GreaterThan, 100.0),
            ],
            vec![Condition::new("featured", ConditionOperator::Equal, true)],
        ]);

        let long_book = values(&[("type", Value::from("book")), ("pages", Value::from("250"))]);
        assert!(logic.is_visible(&long_book));

        let short_book = values(&[("type", Value::from("book")), ("pages", Value::from(20.0))]);
        assert!(!logic.is_visible(&short_book));

        let featured = values(&[("featured", Value::Bool(true))]);
        assert!(logic.is_visible(&featured));
    }

    #[test]
    fn test_empty_and_contains() {
        let logic = ConditionalLogic::new(vec![vec![
            Condition::new("notes", ConditionOperator::Empty, Value::Null),
            Condition::new("tags", ConditionOperator::Contains, "sale"),
        ]]);

        let current = values(&[(
            "tags",
            Value::Array(vec![Value::from("new"), Value::from("sale")]),
        )]);
        assert!(logic.is_visible(&current));
    }

    #[test]
    fn test_serde_shape() {
        let json = r#"[[{"field": "type", "operator": "==", "value": "book"}]]"#;
        let logic: ConditionalLogic = serde_json::from_str(json).unwrap();
        assert_eq!(logic.groups.len(), 1);
        assert_eq!(logic.groups[0][0].operator, ConditionOperator::Equal);
    }
}
