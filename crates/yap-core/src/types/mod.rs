//! Type system for field data
//!
//! This module contains:
//! - Value types
//! - Field type enumeration

pub mod field_type;
pub mod value;

pub use field_type::FieldType;
pub use value::{format_number, Value};
