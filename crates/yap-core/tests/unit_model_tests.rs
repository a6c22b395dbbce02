//! Tests across the core data model

use std::collections::HashMap;
use yap_core::field::validate;
use yap_core::location::{matches, group_rule_sets};
use yap_core::{
    Condition, ConditionOperator, ConditionalLogic, FieldDefinition, FieldType, GroupName,
    LocationOperator, LocationRule, LocationType, PostContext, ValidationRules, Value,
};

#[test]
fn test_hidden_required_field_passes_validation() {
    let field = FieldDefinition::new("ISBN", FieldType::ShortText)
        .with_rules(ValidationRules::required())
        .with_conditional_logic(ConditionalLogic::new(vec![vec![Condition::new(
            "type",
            ConditionOperator::Equal,
            "book",
        )]]));

    let mut siblings = HashMap::new();
    siblings.insert("type".to_string(), Value::from("movie"));

    let visible = field
        .conditional_logic
        .as_ref()
        .map(|logic| logic.is_visible(&siblings))
        .unwrap_or(true);
    assert!(!visible);
    assert!(validate(&Value::Null, &field, visible).is_ok());

    siblings.insert("type".to_string(), Value::from("book"));
    let visible = field.conditional_logic.as_ref().unwrap().is_visible(&siblings);
    assert!(validate(&Value::Null, &field, visible).is_err());
}

#[test]
fn test_stored_rules_round_trip_through_grouping() {
    let rows = vec![
        LocationRule {
            group_name: "pricing".to_string(),
            rule_group: 1,
            rule_order: 0,
            location_type: LocationType::PostType,
            location_operator: LocationOperator::Equal,
            location_value: "page".to_string(),
        },
        LocationRule {
            group_name: "pricing".to_string(),
            rule_group: 0,
            rule_order: 1,
            location_type: LocationType::Category,
            location_operator: LocationOperator::Equal,
            location_value: "12".to_string(),
        },
        LocationRule {
            group_name: "pricing".to_string(),
            rule_group: 0,
            rule_order: 0,
            location_type: LocationType::PostType,
            location_operator: LocationOperator::Equal,
            location_value: "product".to_string(),
        },
    ];

    let sets = group_rule_sets(rows);
    assert_eq!(sets.len(), 2);

    let product = PostContext::new(42, "product").with_categories(vec![12]);
    let uncategorised = PostContext::new(43, "product");
    let page = PostContext::new(44, "page");

    assert!(matches(&product, &sets));
    assert!(!matches(&uncategorised, &sets));
    assert!(matches(&page, &sets));
}

#[test]
fn test_group_name_drives_every_table() {
    let tables = GroupName::new("Pricing").unwrap().tables();
    assert!(tables.pattern_table.ends_with("_pricing"));
    assert!(tables.data_table.ends_with("_pricing"));
    assert_ne!(tables.pattern_table, tables.data_table);
}
