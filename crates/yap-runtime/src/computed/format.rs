//! Output formats of computed fields

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use yap_core::Value;

fn default_decimals() -> usize {
    2
}

fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

fn default_datetime_format() -> String {
    "%Y-%m-%d %H:%M:%S".to_string()
}

/// How a computed value is presented
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComputedFormat {
    /// Fixed decimals, e.g. `"12.50"`
    Number {
        #[serde(default = "default_decimals")]
        decimals: usize,
    },

    /// Fixed decimals plus a currency suffix, e.g. `"123.00 PLN"`.
    /// Without a currency the engine's default currency is used.
    Price {
        #[serde(default = "default_decimals")]
        decimals: usize,
        #[serde(default)]
        currency: Option<String>,
    },

    /// Fixed decimals plus `%`; the value is taken as already scaled
    Percentage {
        #[serde(default = "default_decimals")]
        decimals: usize,
    },

    /// chrono format string applied to a date or unix timestamp
    Date {
        #[serde(default = "default_date_format")]
        format: String,
    },

    Datetime {
        #[serde(default = "default_datetime_format")]
        format: String,
    },

    Boolean,
}

impl ComputedFormat {
    pub fn price(currency: impl Into<String>) -> Self {
        ComputedFormat::Price {
            decimals: 2,
            currency: Some(currency.into()),
        }
    }

    /// Format `value`. Values the format cannot interpret are returned as is.
    pub fn apply(&self, value: Value, default_currency: &str) -> Value {
        match self {
            ComputedFormat::Number { decimals } => match value.as_f64() {
                Some(n) => Value::String(format!("{:.*}", decimals, n)),
                None => value,
            },
            ComputedFormat::Price { decimals, currency } => {
                let Some(n) = value.as_f64() else {
                    return value;
                };
                let currency = currency.as_deref().unwrap_or(default_currency);
                if currency.is_empty() {
                    Value::String(format!("{:.*}", decimals, n))
                } else {
                    Value::String(format!("{:.*} {}", decimals, n, currency))
                }
            }
            ComputedFormat::Percentage { decimals } => match value.as_f64() {
                Some(n) => Value::String(format!("{:.*}%", decimals, n)),
                None => value,
            },
            ComputedFormat::Date { format } | ComputedFormat::Datetime { format } => {
                let Some(moment) = parse_moment(&value) else {
                    return value;
                };
                // Invalid format strings fail the write instead of panicking
                let mut out = String::new();
                match write!(out, "{}", moment.format(format)) {
                    Ok(()) => Value::String(out),
                    Err(_) => value,
                }
            }
            ComputedFormat::Boolean => match value.as_bool() {
                Some(b) => Value::Bool(b),
                None => value,
            },
        }
    }
}

/// Dates, datetimes and unix timestamps
fn parse_moment(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Number(secs) => DateTime::from_timestamp(*secs as i64, 0).map(|dt| dt.naive_utc()),
        Value::String(raw) => {
            let raw = raw.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
                return Some(dt.naive_utc());
            }
            if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
                return Some(dt);
            }
            if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
                return date.and_hms_opt(0, 0, 0);
            }
            raw.parse::<i64>()
                .ok()
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
                .map(|dt| dt.naive_utc())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price() {
        let value = Value::Number(100.0 * 1.23);
        assert_eq!(
            ComputedFormat::price("PLN").apply(value.clone(), "USD"),
            Value::from("123.00 PLN")
        );
        let fallback = ComputedFormat::Price {
            decimals: 2,
            currency: None,
        };
        assert_eq!(fallback.apply(value, "USD"), Value::from("123.00 USD"));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            ComputedFormat::Number { decimals: 1 }.apply(Value::from("2.26"), ""),
            Value::from("2.3")
        );
        assert_eq!(
            ComputedFormat::Percentage { decimals: 0 }.apply(Value::Number(45.0), ""),
            Value::from("45%")
        );
        assert_eq!(
            ComputedFormat::Number { decimals: 2 }.apply(Value::from("n/a"), ""),
            Value::from("n/a")
        );
    }

    #[test]
    fn test_dates_and_booleans() {
        let date = ComputedFormat::Date {
            format: "%d.%m.%Y".to_string(),
        };
        assert_eq!(date.apply(Value::from("2024-03-09"), ""), Value::from("09.03.2024"));
        assert_eq!(date.apply(Value::Number(0.0), ""), Value::from("01.01.1970"));

        let datetime = ComputedFormat::Datetime {
            format: default_datetime_format(),
        };
        assert_eq!(
            datetime.apply(Value::from("2024-03-09T08:00:00Z"), ""),
            Value::from("2024-03-09 08:00:00")
        );
        assert_eq!(ComputedFormat::Boolean.apply(Value::from("yes"), ""), Value::Bool(true));
    }

    #[test]
    fn test_deserialize_tagged() {
        let format: ComputedFormat =
            serde_json::from_str(r#"{"type": "price", "currency": "EUR"}"#).unwrap();
        assert_eq!(
            format,
            ComputedFormat::Price {
                decimals: 2,
                currency: Some("EUR".to_string())
            }
        );
    }
}
