//! Built-in per-type sanitisation, applied on write before validation

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use std::sync::OnceLock;
use yap_core::{FieldDefinition, FieldType, Value};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d", "%d/%m/%Y", "%d.%m.%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"];
const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M", "%I:%M %p"];

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid regex"))
}

/// Normalise a submitted value for its field type.
///
/// Values that cannot be normalised are returned unchanged so validation
/// can report them.
pub fn sanitize(value: Value, field: &FieldDefinition) -> Value {
    match &field.field_type {
        FieldType::ShortText | FieldType::Password => map_str(value, |s| {
            Value::String(tag_regex().replace_all(s, "").trim().to_string())
        }),
        FieldType::LongText | FieldType::Url | FieldType::Oembed => {
            map_str(value, |s| Value::String(s.trim().to_string()))
        }
        FieldType::Email => map_str(value, |s| Value::String(s.trim().to_lowercase())),
        FieldType::Number => to_number(value),
        FieldType::Range => clamp(to_number(value), field),
        FieldType::TrueFalse => match value.as_bool() {
            Some(b) => Value::Bool(b),
            None => value,
        },
        FieldType::Color => map_str(value, normalize_color),
        FieldType::Date => map_str(value, reformat_date),
        FieldType::Datetime => map_str(value, reformat_datetime),
        FieldType::Time => map_str(value, reformat_time),
        FieldType::Checkbox | FieldType::Gallery | FieldType::Relationship => to_list(value),
        _ => value,
    }
}

fn map_str(value: Value, f: impl FnOnce(&str) -> Value) -> Value {
    if let Value::String(s) = &value {
        return f(s);
    }
    value
}

fn to_number(value: Value) -> Value {
    match value {
        Value::String(s) if s.trim().is_empty() => Value::Null,
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(n) => Value::Number(n),
            Err(_) => Value::String(s),
        },
        Value::Bool(b) => Value::Number(if b { 1.0 } else { 0.0 }),
        other => other,
    }
}

fn clamp(value: Value, field: &FieldDefinition) -> Value {
    let Value::Number(mut n) = value else {
        return value;
    };
    if let Some(min) = field.numeric_option("min") {
        n = n.max(min);
    }
    if let Some(max) = field.numeric_option("max") {
        n = n.min(max);
    }
    Value::Number(n)
}

fn to_list(value: Value) -> Value {
    match value {
        Value::Array(_) | Value::Null => value,
        Value::String(s) if s.trim().is_empty() => Value::Array(Vec::new()),
        other => Value::Array(vec![other]),
    }
}

/// `#abc`, `ABC` and `#AABBCC` all become `#aabbcc`
fn normalize_color(raw: &str) -> Value {
    let hex = raw.trim().trim_start_matches('#').to_ascii_lowercase();
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Value::String(raw.to_string());
    }
    match hex.len() {
        3 => Value::String(format!("#{}", hex.chars().flat_map(|c| [c, c]).collect::<String>())),
        6 | 8 => Value::String(format!("#{}", hex)),
        _ => Value::String(raw.to_string()),
    }
}

fn reformat_date(raw: &str) -> Value {
    let trimmed = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .map(|date| Value::String(date.format("%Y-%m-%d").to_string()))
        .unwrap_or_else(|| Value::String(raw.to_string()))
}

fn reformat_datetime(raw: &str) -> Value {
    let trimmed = raw.trim();
    if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return Value::String(parsed.naive_utc().format("%Y-%m-%d %H:%M:%S").to_string());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .map(|dt| Value::String(dt.format("%Y-%m-%d %H:%M:%S").to_string()))
        .unwrap_or_else(|| Value::String(raw.to_string()))
}

fn reformat_time(raw: &str) -> Value {
    let trimmed = raw.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(trimmed, fmt).ok())
        .map(|time| Value::String(time.format("%H:%M:%S").to_string()))
        .unwrap_or_else(|| Value::String(raw.to_string()))
}
