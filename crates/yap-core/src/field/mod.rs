//! Field definitions, value rows, conditional logic and validation

pub mod conditional;
pub mod definition;
pub mod layout;
pub mod validation;

pub use conditional::{Condition, ConditionOperator, ConditionalLogic};
pub use definition::{generate_name, FieldDefinition, FieldEntry, FieldOptions, FieldValueRow};
pub use layout::LayoutDefinition;
pub use validation::{validate, ValidationFailure, ValidationRules};
