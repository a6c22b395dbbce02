//! Field type enumeration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of a field definition.
///
/// Serialized as its snake_case name. Unknown names are kept as
/// [`FieldType::Custom`] so documents written by newer versions still load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldType {
    #[default]
    ShortText,
    LongText,
    Number,
    Email,
    Url,
    Password,
    Image,
    File,
    Gallery,
    Select,
    Checkbox,
    Radio,
    TrueFalse,
    Date,
    Datetime,
    Time,
    Color,
    Range,
    Relationship,
    Taxonomy,
    User,
    GoogleMap,
    Wysiwyg,
    Oembed,
    Repeater,
    NestedGroup,
    FlexibleContent,
    /// Type registered by an extension
    Custom(String),
}

impl FieldType {
    /// The canonical snake_case name
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::ShortText => "short_text",
            FieldType::LongText => "long_text",
            FieldType::Number => "number",
            FieldType::Email => "email",
            FieldType::Url => "url",
            FieldType::Password => "password",
            FieldType::Image => "image",
            FieldType::File => "file",
            FieldType::Gallery => "gallery",
            FieldType::Select => "select",
            FieldType::Checkbox => "checkbox",
            FieldType::Radio => "radio",
            FieldType::TrueFalse => "true_false",
            FieldType::Date => "date",
            FieldType::Datetime => "datetime",
            FieldType::Time => "time",
            FieldType::Color => "color",
            FieldType::Range => "range",
            FieldType::Relationship => "relationship",
            FieldType::Taxonomy => "taxonomy",
            FieldType::User => "user",
            FieldType::GoogleMap => "google_map",
            FieldType::Wysiwyg => "wysiwyg",
            FieldType::Oembed => "oembed",
            FieldType::Repeater => "repeater",
            FieldType::NestedGroup => "nested_group",
            FieldType::FlexibleContent => "flexible_content",
            FieldType::Custom(name) => name,
        }
    }

    /// Types whose stored value is a JSON document rather than plain text
    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            FieldType::Repeater
                | FieldType::Gallery
                | FieldType::Relationship
                | FieldType::Checkbox
                | FieldType::FlexibleContent
                | FieldType::NestedGroup
                | FieldType::GoogleMap
                | FieldType::Taxonomy
                | FieldType::User
        )
    }

    /// Types whose rows live in the child rows table
    pub fn has_rows(&self) -> bool {
        matches!(self, FieldType::Repeater | FieldType::FlexibleContent)
    }

    /// Free text types that get whitespace trimming on save
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            FieldType::ShortText
                | FieldType::LongText
                | FieldType::Email
                | FieldType::Url
                | FieldType::Password
                | FieldType::Wysiwyg
                | FieldType::Oembed
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FieldType {
    /// Parse a stored type name. Unknown names become [`FieldType::Custom`].
    pub fn from_name(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "short_text" | "text" => FieldType::ShortText,
            "long_text" | "textarea" => FieldType::LongText,
            "number" => FieldType::Number,
            "email" => FieldType::Email,
            "url" => FieldType::Url,
            "password" => FieldType::Password,
            "image" => FieldType::Image,
            "file" => FieldType::File,
            "gallery" => FieldType::Gallery,
            "select" => FieldType::Select,
            "checkbox" => FieldType::Checkbox,
            "radio" => FieldType::Radio,
            "true_false" => FieldType::TrueFalse,
            "date" => FieldType::Date,
            "datetime" | "date_time" => FieldType::Datetime,
            "time" => FieldType::Time,
            "color" => FieldType::Color,
            "range" => FieldType::Range,
            "relationship" => FieldType::Relationship,
            "taxonomy" => FieldType::Taxonomy,
            "user" => FieldType::User,
            "google_map" => FieldType::GoogleMap,
            "wysiwyg" => FieldType::Wysiwyg,
            "oembed" => FieldType::Oembed,
            "repeater" => FieldType::Repeater,
            "nested_group" | "group" => FieldType::NestedGroup,
            "flexible_content" => FieldType::FlexibleContent,
            other => FieldType::Custom(other.to_string()),
        }
    }
}

impl FromStr for FieldType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(FieldType::from_name(s))
    }
}

impl TryFrom<String> for FieldType {
    type Error = std::convert::Infallible;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<FieldType> for String {
    fn from(t: FieldType) -> Self {
        t.as_str().to_string()
    }
}
