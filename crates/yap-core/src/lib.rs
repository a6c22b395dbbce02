//! YAP Core - Core types and definitions for the YAP custom fields engine
//!
//! This crate provides the data model shared across the workspace:
//! - Value and field types
//! - Group names and the tables derived from them
//! - Field definitions, data rows, conditional logic and validation rules
//! - Location rules and their resolution against a post
//! - Error types

pub mod error;
pub mod field;
pub mod group;
pub mod location;
pub mod types;

// Re-export commonly used types
pub use error::CoreError;
pub use field::{
    Condition, ConditionOperator, ConditionalLogic, FieldDefinition, FieldEntry, FieldValueRow,
    LayoutDefinition, ValidationFailure, ValidationRules,
};
pub use group::{GroupMeta, GroupName, TableDescriptor};
pub use location::{LocationOperator, LocationRule, LocationType, PostContext, RuleSets};
pub use types::{FieldType, Value};
