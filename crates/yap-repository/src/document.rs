//! Portable field group documents
//!
//! A document holds a group's field definitions as a tree (sub fields
//! nested under their parent), its location rules as OR-ed lists of
//! AND-ed rules, and the layouts of its flexible content fields.

use crate::error::{RepositoryError, RepositoryResult};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use yap_core::field::{generate_name, FieldOptions};
use yap_core::location::{flatten_rule_sets, group_rule_sets};
use yap_core::{
    ConditionalLogic, FieldDefinition, FieldType, GroupMeta, GroupName, LayoutDefinition,
    LocationOperator, LocationRule, LocationType, ValidationRules,
};

/// Current document format version
pub const DOCUMENT_VERSION: &str = "1.0";

fn default_version() -> String {
    DOCUMENT_VERSION.to_string()
}

/// Versions are written as strings but older exports carry numbers
fn deserialize_version<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawVersion {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match RawVersion::deserialize(deserializer)? {
        RawVersion::Text(text) => text,
        RawVersion::Number(number) => number.to_string(),
    })
}

fn default_active() -> bool {
    true
}

/// A field group as exported to / imported from JSON or YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDocument {
    #[serde(default = "default_version", deserialize_with = "deserialize_version")]
    pub version: String,

    pub group_name: String,

    #[serde(default)]
    pub title: String,

    #[serde(default = "default_active")]
    pub active: bool,

    /// Unix timestamp of the export; ignored by change detection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<i64>,

    #[serde(default)]
    pub fields: Vec<FieldDocument>,

    /// OR of AND-groups
    #[serde(default)]
    pub location: Vec<Vec<LocationDocument>>,

    /// Flexible content layouts by field machine key
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub layouts: BTreeMap<String, Vec<LayoutDefinition>>,
}

/// One field definition with its sub fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// Machine key; generated from the label when empty
    #[serde(default)]
    pub name: String,

    pub label: String,

    #[serde(rename = "type")]
    pub field_type: FieldType,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub options: FieldOptions,

    #[serde(default)]
    pub validation: ValidationRules,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional_logic: Option<ConditionalLogic>,

    #[serde(default)]
    pub is_repeater: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeater_min: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeater_max: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_fields: Vec<FieldDocument>,
}

/// One location rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationDocument {
    #[serde(rename = "type", alias = "param")]
    pub location_type: LocationType,
    #[serde(default = "default_operator")]
    pub operator: LocationOperator,
    pub value: String,
}

fn default_operator() -> LocationOperator {
    LocationOperator::Equal
}

/// How a document relates to what was last imported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Never imported
    New,
    /// Imported before, content changed since
    Modified,
    InSync,
}

impl FieldDocument {
    fn from_definition(definition: &FieldDefinition, sub_fields: Vec<FieldDocument>) -> Self {
        Self {
            id: definition.id,
            name: definition.generated_name.clone(),
            label: definition.user_name.clone(),
            field_type: definition.field_type.clone(),
            options: definition.field_options.clone(),
            validation: definition.validation_rules.clone(),
            conditional_logic: definition.conditional_logic.clone(),
            is_repeater: definition.is_repeater,
            repeater_min: definition.repeater_min,
            repeater_max: definition.repeater_max,
            layout_type: definition.layout_type.clone(),
            parent_id: definition.parent_id,
            sub_fields,
        }
    }

    /// Machine key, generated from the label when the document has none
    pub fn machine_name(&self) -> String {
        if self.name.trim().is_empty() {
            generate_name(&self.label, &self.field_type)
        } else {
            self.name.clone()
        }
    }

    /// Definition without store ids; parents are linked by the importer
    pub fn to_definition(&self) -> FieldDefinition {
        FieldDefinition {
            id: None,
            generated_name: self.machine_name(),
            user_name: self.label.clone(),
            field_type: self.field_type.clone(),
            field_options: self.options.clone(),
            validation_rules: self.validation.clone(),
            conditional_logic: self.conditional_logic.clone(),
            is_repeater: self.is_repeater || self.field_type == FieldType::Repeater,
            repeater_min: self.repeater_min,
            repeater_max: self.repeater_max,
            layout_type: self.layout_type.clone(),
            parent_id: None,
        }
    }

    fn flatten_into(&self, parent: Option<String>, out: &mut Vec<(Option<String>, FieldDefinition)>) {
        let definition = self.to_definition();
        let name = definition.generated_name.clone();
        out.push((parent, definition));
        for sub_field in &self.sub_fields {
            sub_field.flatten_into(Some(name.clone()), out);
        }
    }
}

impl GroupDocument {
    /// Build a document from stored parts
    pub fn from_parts(
        meta: &GroupMeta,
        definitions: &[FieldDefinition],
        rules: &[LocationRule],
        layouts: BTreeMap<String, Vec<LayoutDefinition>>,
    ) -> Self {
        let mut children: HashMap<i64, Vec<&FieldDefinition>> = HashMap::new();
        let mut roots = Vec::new();
        for definition in definitions {
            match definition.parent_id {
                Some(parent) if definitions.iter().any(|d| d.id == Some(parent)) => {
                    children.entry(parent).or_default().push(definition)
                }
                _ => roots.push(definition),
            }
        }

        let fields = roots
            .into_iter()
            .map(|root| nest(root, &children, definitions.len()))
            .collect();

        let location = group_rule_sets(rules.to_vec())
            .into_iter()
            .map(|set| {
                set.into_iter()
                    .map(|rule| LocationDocument {
                        location_type: rule.location_type,
                        operator: rule.location_operator,
                        value: rule.location_value,
                    })
                    .collect()
            })
            .collect();

        Self {
            version: default_version(),
            group_name: meta.name.to_string(),
            title: meta.title.clone(),
            active: meta.active,
            modified: meta.modified,
            fields,
            location,
            layouts,
        }
    }

    /// Validated group name
    pub fn group(&self) -> RepositoryResult<GroupName> {
        Ok(GroupName::new(&self.group_name)?)
    }

    /// Every definition with its parent's machine key, parents first
    pub fn flatten(&self) -> Vec<(Option<String>, FieldDefinition)> {
        let mut out = Vec::new();
        for field in &self.fields {
            field.flatten_into(None, &mut out);
        }
        out
    }

    /// Flat location rule rows for the group
    pub fn location_rules(&self) -> Vec<LocationRule> {
        let sets: Vec<Vec<LocationRule>> = self
            .location
            .iter()
            .map(|set| {
                set.iter()
                    .map(|rule| {
                        LocationRule::new(rule.location_type.clone(), rule.operator, rule.value.clone())
                    })
                    .collect()
            })
            .collect();
        flatten_rule_sets(&self.group_name, &sets)
    }

    /// Registration record carrying this document's hash
    pub fn to_meta(&self) -> RepositoryResult<GroupMeta> {
        let mut meta = GroupMeta::new(self.group()?, self.title.clone());
        meta.active = self.active;
        meta.modified = self.modified;
        meta.content_hash = Some(self.content_hash()?);
        Ok(meta)
    }

    pub fn from_json(json: &str) -> RepositoryResult<Self> {
        let document: Self = serde_json::from_str(json)?;
        document.group()?;
        Ok(document)
    }

    pub fn from_yaml(yaml: &str) -> RepositoryResult<Self> {
        let document: Self = serde_yaml::from_str(yaml)?;
        document.group()?;
        Ok(document)
    }

    pub fn to_json_pretty(&self) -> RepositoryResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// SHA-256 over the canonical JSON form, ignoring `modified`, the format
    /// version and store ids.
    ///
    /// A document and its export after import hash the same.
    pub fn content_hash(&self) -> RepositoryResult<String> {
        let mut canonical = self.clone();
        canonical.modified = None;
        canonical.version = default_version();
        if let Ok(group) = self.group() {
            canonical.group_name = group.to_string();
        }
        canonical.fields.iter_mut().for_each(canonicalize);

        // serde_json::Value keeps object keys sorted
        let value = serde_json::to_value(&canonical)?;
        let bytes = serde_json::to_vec(&value)?;
        Ok(format!("{:x}", Sha256::digest(&bytes)))
    }

    /// Compare against the hash recorded at the last import
    pub fn sync_status(&self, stored_hash: Option<&str>) -> RepositoryResult<SyncStatus> {
        let Some(stored) = stored_hash else {
            return Ok(SyncStatus::New);
        };
        if self.content_hash()? == stored {
            Ok(SyncStatus::InSync)
        } else {
            Ok(SyncStatus::Modified)
        }
    }

    /// Number of definitions, sub fields included
    pub fn field_count(&self) -> usize {
        self.flatten().len()
    }

    /// Reject documents whose structure cannot be imported
    pub fn check(&self) -> RepositoryResult<()> {
        self.group()?;
        let flat = self.flatten();
        let mut seen = std::collections::HashSet::new();
        for (_, definition) in &flat {
            if !seen.insert(definition.generated_name.as_str()) {
                return Err(RepositoryError::InvalidDocument(format!(
                    "duplicate field name '{}' in group '{}'",
                    definition.generated_name, self.group_name
                )));
            }
        }
        Ok(())
    }
}

fn nest(
    definition: &FieldDefinition,
    children: &HashMap<i64, Vec<&FieldDefinition>>,
    budget: usize,
) -> FieldDocument {
    let sub_fields = match (definition.id, budget) {
        (Some(id), 1..) => children
            .get(&id)
            .map(|subs| subs.iter().map(|sub| nest(sub, children, budget - 1)).collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    };
    FieldDocument::from_definition(definition, sub_fields)
}

/// Drop store ids and fill in what an import would derive
fn canonicalize(field: &mut FieldDocument) {
    field.id = None;
    field.parent_id = None;
    field.name = field.machine_name();
    field.is_repeater = field.is_repeater || field.field_type == FieldType::Repeater;
    field.sub_fields.iter_mut().for_each(canonicalize);
}
