//! Value type kinds and their text conversions.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::value::{Datum, Value};

/// Accepted date-time layouts, tried after RFC 3339.
const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Closed set of value kinds a variable can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Text,
    Integer,
    Decimal,
    Boolean,
    Date,
    DateTime,
    Binary,
    Locale,
}

impl ValueType {
    pub const ALL: [ValueType; 8] = [
        ValueType::Text,
        ValueType::Integer,
        ValueType::Decimal,
        ValueType::Boolean,
        ValueType::Date,
        ValueType::DateTime,
        ValueType::Binary,
        ValueType::Locale,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Binary => "binary",
            Self::Locale => "locale",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Decimal)
    }

    pub fn is_date_time(&self) -> bool {
        matches!(self, Self::Date | Self::DateTime)
    }

    /// Returns true when values of this type have a natural ordering.
    pub fn is_comparable(&self) -> bool {
        !matches!(self, Self::Binary)
    }

    pub fn null_value(self) -> Value {
        Value::null(self)
    }

    pub fn null_sequence(self) -> Value {
        Value::null_sequence(self)
    }

    /// Build a sequence of this type. Every element must be a non-sequence
    /// value of the same type (null elements are allowed).
    pub fn sequence_of<I>(self, values: I) -> Result<Value>
    where
        I: IntoIterator<Item = Value>,
    {
        let values: Vec<Value> = values.into_iter().collect();
        for value in &values {
            if value.value_type() != self || value.is_sequence() {
                return Err(ModelError::InvalidSequence {
                    expected: self,
                    actual: value.value_type(),
                });
            }
        }
        Ok(Value::sequence_unchecked(self, values))
    }

    /// Parse text into a value of this type.
    ///
    /// Blank input yields the null value for every type except text, where the
    /// input is kept as-is. Malformed input is a [`ModelError::TypeConversion`].
    pub fn value_of(self, text: &str) -> Result<Value> {
        if self == Self::Text {
            return Ok(Value::text(text));
        }
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(self.null_value());
        }
        self.parse_datum(trimmed)
            .map(Value::from)
            .ok_or_else(|| ModelError::TypeConversion {
                value_type: self,
                input: text.to_string(),
            })
    }

    /// Parse a comma separated list into a sequence of this type.
    pub fn sequence_of_text(self, text: &str) -> Result<Value> {
        if text.trim().is_empty() {
            return Ok(Value::sequence_unchecked(self, Vec::new()));
        }
        let values = text
            .split(',')
            .map(|item| self.value_of(item))
            .collect::<Result<Vec<_>>>()?;
        self.sequence_of(values)
    }

    /// Format a value of this type as text. Null formats as `None`.
    pub fn format(self, value: &Value) -> Result<Option<String>> {
        if value.value_type() != self {
            return Err(ModelError::TypeConversion {
                value_type: self,
                input: value.to_string(),
            });
        }
        Ok(value.to_text())
    }

    fn parse_datum(self, trimmed: &str) -> Option<Datum> {
        match self {
            Self::Text => Some(Datum::Text(trimmed.to_string())),
            Self::Integer => parse_integer(trimmed).map(Datum::Integer),
            Self::Decimal => trimmed
                .parse::<f64>()
                .ok()
                .filter(|number| number.is_finite())
                .map(Datum::Decimal),
            Self::Boolean => parse_boolean(trimmed).map(Datum::Boolean),
            Self::Date => parse_date(trimmed).map(Datum::Date),
            Self::DateTime => parse_date_time(trimmed).map(Datum::DateTime),
            Self::Binary => hex::decode(trimmed).ok().map(Datum::Binary),
            Self::Locale => is_locale(trimmed).then(|| Datum::Locale(trimmed.replace('-', "_"))),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ValueType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "text" | "string" => Ok(Self::Text),
            "integer" | "int" | "long" => Ok(Self::Integer),
            "decimal" | "double" | "number" => Ok(Self::Decimal),
            "boolean" | "bool" => Ok(Self::Boolean),
            "date" => Ok(Self::Date),
            "datetime" | "date_time" | "timestamp" => Ok(Self::DateTime),
            "binary" => Ok(Self::Binary),
            "locale" => Ok(Self::Locale),
            _ => Err(ModelError::InvalidName {
                kind: "value type",
                name: s.to_string(),
            }),
        }
    }
}

fn parse_integer(text: &str) -> Option<i64> {
    if let Ok(value) = text.parse::<i64>() {
        return Some(value);
    }
    // "12.0" is an integer written by a decimal-minded producer
    let number = text.parse::<f64>().ok()?;
    if number.is_finite() && number.fract() == 0.0 && number.abs() < i64::MAX as f64 {
        Some(number as i64)
    } else {
        None
    }
}

fn parse_boolean(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_date_time(text).map(|moment| moment.date_naive()))
}

fn parse_date_time(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(moment) = DateTime::parse_from_rfc3339(text) {
        return Some(moment.with_timezone(&Utc));
    }
    for format in DATE_TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn is_locale(text: &str) -> bool {
    let mut parts = text.split(['_', '-']);
    let Some(language) = parts.next() else {
        return false;
    };
    (2..=3).contains(&language.len())
        && language.chars().all(|ch| ch.is_ascii_alphabetic())
        && parts.all(|part| !part.is_empty() && part.chars().all(|ch| ch.is_ascii_alphanumeric()))
}
