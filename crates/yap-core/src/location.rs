//! Location rules and their resolution against a post
//!
//! A group's rules are stored flat, one row per rule. Rows sharing a
//! `rule_group` are ANDed (in `rule_order`); distinct rule groups are ORed.
//! A group with no rules applies everywhere.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// What attribute of the post a rule inspects
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    PostType,
    /// Numeric category term id
    Category,
    /// Specific post id
    Post,
    PostStatus,
    PageTemplate,
    #[serde(untagged)]
    Other(String),
}

impl fmt::Display for LocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationType::PostType => f.write_str("post_type"),
            LocationType::Category => f.write_str("category"),
            LocationType::Post => f.write_str("post"),
            LocationType::PostStatus => f.write_str("post_status"),
            LocationType::PageTemplate => f.write_str("page_template"),
            LocationType::Other(name) => f.write_str(name),
        }
    }
}

impl LocationType {
    pub fn parse(s: &str) -> Self {
        match s {
            "post_type" => LocationType::PostType,
            "category" | "post_category" => LocationType::Category,
            "post" | "post_id" => LocationType::Post,
            "post_status" => LocationType::PostStatus,
            "page_template" => LocationType::PageTemplate,
            other => LocationType::Other(other.to_string()),
        }
    }
}

/// Comparison of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocationOperator {
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
}

impl LocationOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationOperator::Equal => "==",
            LocationOperator::NotEqual => "!=",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "==" => Some(LocationOperator::Equal),
            "!=" => Some(LocationOperator::NotEqual),
            _ => None,
        }
    }
}

/// A stored location rule row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRule {
    pub group_name: String,
    pub rule_group: u32,
    pub rule_order: u32,
    pub location_type: LocationType,
    pub location_operator: LocationOperator,
    pub location_value: String,
}

impl LocationRule {
    pub fn new(
        location_type: LocationType,
        location_operator: LocationOperator,
        location_value: impl Into<String>,
    ) -> Self {
        Self {
            group_name: String::new(),
            rule_group: 0,
            rule_order: 0,
            location_type,
            location_operator,
            location_value: location_value.into(),
        }
    }

    /// Shorthand for `post_type == value`
    pub fn post_type_is(value: impl Into<String>) -> Self {
        Self::new(LocationType::PostType, LocationOperator::Equal, value)
    }

    /// Evaluate this rule against a post
    pub fn holds(&self, post: &PostContext) -> bool {
        let equal = match &self.location_type {
            LocationType::PostType => post.post_type == self.location_value,
            LocationType::Category => match self.location_value.trim().parse::<i64>() {
                Ok(term_id) => post.categories.contains(&term_id),
                Err(_) => false,
            },
            LocationType::Post => self
                .location_value
                .trim()
                .parse::<i64>()
                .map(|id| id == post.id)
                .unwrap_or(false),
            LocationType::PostStatus => post.status.as_deref() == Some(self.location_value.as_str()),
            LocationType::PageTemplate => {
                post.template.as_deref() == Some(self.location_value.as_str())
            }
            // Unknown attributes never match
            LocationType::Other(_) => return false,
        };

        match self.location_operator {
            LocationOperator::Equal => equal,
            LocationOperator::NotEqual => !equal,
        }
    }
}

/// The attributes of a post consulted by location rules
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PostContext {
    pub id: i64,
    pub post_type: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
    /// Category term ids
    #[serde(default)]
    pub categories: Vec<i64>,
}

impl PostContext {
    pub fn new(id: i64, post_type: impl Into<String>) -> Self {
        Self {
            id,
            post_type: post_type.into(),
            ..Default::default()
        }
    }

    pub fn with_categories(mut self, categories: Vec<i64>) -> Self {
        self.categories = categories;
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }
}

/// OR of AND-groups
pub type RuleSets = Vec<Vec<LocationRule>>;

/// Decide whether rule sets apply to a post.
///
/// Empty rule sets apply to every post.
pub fn matches(post: &PostContext, rule_sets: &[Vec<LocationRule>]) -> bool {
    if rule_sets.is_empty() {
        return true;
    }
    rule_sets
        .iter()
        .any(|group| group.iter().all(|rule| rule.holds(post)))
}

/// Group flat rule rows into rule sets, ordered by `rule_group` then `rule_order`
pub fn group_rule_sets(rules: Vec<LocationRule>) -> RuleSets {
    let mut grouped: BTreeMap<u32, Vec<LocationRule>> = BTreeMap::new();
    for rule in rules {
        grouped.entry(rule.rule_group).or_default().push(rule);
    }
    grouped
        .into_values()
        .map(|mut group| {
            group.sort_by_key(|rule| rule.rule_order);
            group
        })
        .collect()
}

/// Flatten rule sets into rows for `group_name`, numbering groups and orders
pub fn flatten_rule_sets(group_name: &str, rule_sets: &[Vec<LocationRule>]) -> Vec<LocationRule> {
    rule_sets
        .iter()
        .enumerate()
        .flat_map(|(group_index, group)| {
            group.iter().enumerate().map(move |(order, rule)| LocationRule {
                group_name: group_name.to_string(),
                rule_group: group_index as u32,
                rule_order: order as u32,
                ..rule.clone()
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_type_rule() {
        let rules = vec![vec![LocationRule::post_type_is("page")]];
        assert!(matches(&PostContext::new(1, "page"), &rules));
        assert!(!matches(&PostContext::new(2, "post"), &rules));
    }

    #[test]
    fn test_empty_rules_match_everything() {
        assert!(matches(&PostContext::new(1, "anything"), &[]));
    }

    #[test]
    fn test_category_is_numeric() {
        let post = PostContext::new(7, "post").with_categories(vec![3, 5]);

        let by_id = vec![vec![LocationRule::new(
            LocationType::Category,
            LocationOperator::Equal,
            "5",
        )]];
        assert!(matches(&post, &by_id));

        let by_slug = vec![vec![LocationRule::new(
            LocationType::Category,
            LocationOperator::Equal,
            "news",
        )]];
        assert!(!matches(&post, &by_slug));
    }

    #[test]
    fn test_and_or_semantics() {
        let rules = vec![
            vec![
                LocationRule::post_type_is("post"),
                LocationRule::new(LocationType::Category, LocationOperator::Equal, "9"),
            ],
            vec![LocationRule::new(LocationType::Post, LocationOperator::Equal, "42")],
        ];

        assert!(!matches(&PostContext::new(1, "post"), &rules));
        assert!(matches(&PostContext::new(1, "post").with_categories(vec![9]), &rules));
        assert!(matches(&PostContext::new(42, "page"), &rules));
    }

    #[test]
    fn test_not_equal_and_unknown_type() {
        let not_page = vec![vec![LocationRule::new(
            LocationType::PostType,
            LocationOperator::NotEqual,
            "page",
        )]];
        assert!(matches(&PostContext::new(1, "post"), &not_page));

        let unknown = vec![vec![LocationRule::new(
            LocationType::Other("user_role".to_string()),
            LocationOperator::NotEqual,
            "admin",
        )]];
        assert!(!matches(&PostContext::new(1, "post"), &unknown));
    }

    #[test]
    fn test_group_and_flatten() {
        let sets = vec![
            vec![LocationRule::post_type_is("post"), LocationRule::post_type_is("page")],
            vec![LocationRule::post_type_is("product")],
        ];
        let flat = flatten_rule_sets("shop", &sets);
        assert_eq!(flat.len(), 3);
        assert_eq!(flat[2].rule_group, 1);
        assert_eq!(flat[1].rule_order, 1);

        let mut shuffled = flat.clone();
        shuffled.reverse();
        let regrouped = group_rule_sets(shuffled);
        assert_eq!(regrouped.len(), 2);
        assert_eq!(regrouped[0][0].location_value, "post");
        assert_eq!(regrouped[1][0].location_value, "product");
    }

    #[test]
    fn test_location_type_serde() {
        let json = serde_json::to_string(&LocationType::PostType).unwrap();
        assert_eq!(json, "\"post_type\"");
        let other: LocationType = serde_json::from_str("\"user_role\"").unwrap();
        assert_eq!(other, LocationType::Other("user_role".to_string()));
    }
}
