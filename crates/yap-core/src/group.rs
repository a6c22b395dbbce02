//! Group identity and table descriptors
//!
//! Every table name in the engine is derived here from a [`GroupName`],
//! which is only constructible through its sanitising constructor.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix shared by every table the engine owns
pub const TABLE_PREFIX: &str = "yap";

/// Sanitised group identifier.
///
/// Lowercase ASCII letters, digits and single underscores only; never
/// empty, never starting or ending with `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupName(String);

impl GroupName {
    /// Sanitise a raw group name
    pub fn new(raw: &str) -> Result<Self> {
        let slug = slugify(raw);
        if slug.is_empty() {
            return Err(CoreError::InvalidGroupName(raw.to_string()));
        }
        Ok(Self(slug))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve the tables backing this group
    pub fn tables(&self) -> TableDescriptor {
        TableDescriptor::for_group(self)
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for GroupName {
    type Error = CoreError;

    fn try_from(raw: String) -> Result<Self> {
        GroupName::new(&raw)
    }
}

impl From<GroupName> for String {
    fn from(name: GroupName) -> Self {
        name.0
    }
}

impl AsRef<str> for GroupName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Names of the tables that back one group
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableDescriptor {
    pub group: GroupName,
    /// Field definitions
    pub pattern_table: String,
    /// One row per (field, post)
    pub data_table: String,
    /// Ordered child rows of repeater and flexible content fields
    pub rows_table: String,
}

impl TableDescriptor {
    pub fn for_group(group: &GroupName) -> Self {
        Self {
            group: group.clone(),
            pattern_table: format!("{}_pattern_{}", TABLE_PREFIX, group.as_str()),
            data_table: format!("{}_data_{}", TABLE_PREFIX, group.as_str()),
            rows_table: format!("{}_rows_{}", TABLE_PREFIX, group.as_str()),
        }
    }
}

/// Registration record of a group.
///
/// Location resolution only considers groups that have one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMeta {
    pub name: GroupName,
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Unix timestamp of the last registration or import
    #[serde(default)]
    pub modified: Option<i64>,
    /// Hash of the group document last imported, for sync change detection
    #[serde(default)]
    pub content_hash: Option<String>,
}

fn default_active() -> bool {
    true
}

impl GroupMeta {
    pub fn new(name: GroupName, title: impl Into<String>) -> Self {
        Self {
            name,
            title: title.into(),
            active: true,
            modified: None,
            content_hash: None,
        }
    }
}

/// Lowercase, map anything outside `[a-z0-9]` to `_`, collapse and trim.
pub fn slugify(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    let mut last_underscore = true;

    for c in raw.trim().chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
            last_underscore = false;
        } else if !last_underscore {
            slug.push('_');
            last_underscore = true;
        }
    }

    while slug.ends_with('_') {
        slug.pop();
    }
    slug
}
