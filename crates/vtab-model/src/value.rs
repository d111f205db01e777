//! Typed, nullable values.
//!
//! A [`Value`] always reports a [`ValueType`] that agrees with its payload.
//! Sequences hold non-sequence values of the same type; a null sequence and
//! an empty sequence are distinct states.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::value_type::ValueType;

/// Non-null scalar payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Datum {
    Text(String),
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Binary(Vec<u8>),
    Locale(String),
}

impl Datum {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Text(_) => ValueType::Text,
            Self::Integer(_) => ValueType::Integer,
            Self::Decimal(_) => ValueType::Decimal,
            Self::Boolean(_) => ValueType::Boolean,
            Self::Date(_) => ValueType::Date,
            Self::DateTime(_) => ValueType::DateTime,
            Self::Binary(_) => ValueType::Binary,
            Self::Locale(_) => ValueType::Locale,
        }
    }

    fn compare(&self, other: &Datum) -> Result<Ordering> {
        let ordering = match (self, other) {
            (Self::Text(a), Self::Text(b)) | (Self::Locale(a), Self::Locale(b)) => a.cmp(b),
            (Self::Integer(a), Self::Integer(b)) => a.cmp(b),
            (Self::Decimal(a), Self::Decimal(b)) => a.total_cmp(b),
            (Self::Boolean(a), Self::Boolean(b)) => a.cmp(b),
            (Self::Date(a), Self::Date(b)) => a.cmp(b),
            (Self::DateTime(a), Self::DateTime(b)) => a.cmp(b),
            (Self::Binary(a), Self::Binary(b)) => a.cmp(b),
            _ => {
                return Err(ModelError::IllegalComparison {
                    left: self.value_type(),
                    right: other.value_type(),
                });
            }
        };
        Ok(ordering)
    }

    fn to_text(&self) -> String {
        match self {
            Self::Text(text) | Self::Locale(text) => text.clone(),
            Self::Integer(number) => number.to_string(),
            Self::Decimal(number) => number.to_string(),
            Self::Boolean(flag) => flag.to_string(),
            Self::Date(date) => date.format("%Y-%m-%d").to_string(),
            Self::DateTime(moment) => moment.to_rfc3339(),
            Self::Binary(bytes) => hex::encode(bytes),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Content {
    Null,
    Scalar(Datum),
    Sequence(Option<Vec<Value>>),
}

/// An immutable typed value, possibly null, possibly a sequence.
///
/// Deserialization goes through the same checks as the constructors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawValue")]
pub struct Value {
    value_type: ValueType,
    content: Content,
}

/// Serialized shape of a [`Value`] before validation.
#[derive(Deserialize)]
struct RawValue {
    value_type: ValueType,
    content: Content,
}

impl TryFrom<RawValue> for Value {
    type Error = ModelError;

    fn try_from(raw: RawValue) -> Result<Self> {
        match raw.content {
            Content::Null => Ok(Self::null(raw.value_type)),
            Content::Sequence(None) => Ok(Self::null_sequence(raw.value_type)),
            Content::Sequence(Some(values)) => raw.value_type.sequence_of(values),
            Content::Scalar(datum) => {
                if datum.value_type() != raw.value_type {
                    return Err(ModelError::PayloadMismatch {
                        declared: raw.value_type,
                        actual: datum.value_type(),
                    });
                }
                if let Datum::Decimal(number) = &datum
                    && !number.is_finite()
                {
                    return Err(ModelError::TypeConversion {
                        value_type: ValueType::Decimal,
                        input: number.to_string(),
                    });
                }
                Ok(datum.into())
            }
        }
    }
}

impl Value {
    pub fn null(value_type: ValueType) -> Self {
        Self {
            value_type,
            content: Content::Null,
        }
    }

    pub fn null_sequence(value_type: ValueType) -> Self {
        Self {
            value_type,
            content: Content::Sequence(None),
        }
    }

    pub(crate) fn sequence_unchecked(value_type: ValueType, values: Vec<Value>) -> Self {
        Self {
            value_type,
            content: Content::Sequence(Some(values)),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Datum::Text(text.into()).into()
    }

    pub fn integer(number: i64) -> Self {
        Datum::Integer(number).into()
    }

    /// Non-finite numbers have no text form and become null.
    pub fn decimal(number: f64) -> Self {
        if number.is_finite() {
            Datum::Decimal(number).into()
        } else {
            Self::null(ValueType::Decimal)
        }
    }

    pub fn boolean(flag: bool) -> Self {
        Datum::Boolean(flag).into()
    }

    pub fn date(date: NaiveDate) -> Self {
        Datum::Date(date).into()
    }

    pub fn date_time(moment: DateTime<Utc>) -> Self {
        Datum::DateTime(moment).into()
    }

    pub fn binary(bytes: impl Into<Vec<u8>>) -> Self {
        Datum::Binary(bytes.into()).into()
    }

    pub fn locale(tag: impl Into<String>) -> Self {
        Datum::Locale(tag.into()).into()
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// A null scalar or a null sequence. An empty sequence is not null.
    pub fn is_null(&self) -> bool {
        matches!(self.content, Content::Null | Content::Sequence(None))
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self.content, Content::Sequence(_))
    }

    pub fn datum(&self) -> Option<&Datum> {
        match &self.content {
            Content::Scalar(datum) => Some(datum),
            _ => None,
        }
    }

    /// Elements of a sequence value. A null sequence has no elements.
    pub fn as_sequence(&self) -> Result<&[Value]> {
        match &self.content {
            Content::Sequence(Some(values)) => Ok(values),
            Content::Sequence(None) => Ok(&[]),
            _ => Err(ModelError::NotASequence {
                value_type: self.value_type,
            }),
        }
    }

    /// Number of elements for sequences, 1 for a non-null scalar, 0 for null.
    pub fn size(&self) -> usize {
        match &self.content {
            Content::Null | Content::Sequence(None) => 0,
            Content::Scalar(_) => 1,
            Content::Sequence(Some(values)) => values.len(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self.datum()? {
            Datum::Text(text) | Datum::Locale(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self.datum()? {
            Datum::Integer(number) => Some(*number),
            _ => None,
        }
    }

    /// Decimal payload, widening integers.
    pub fn as_decimal(&self) -> Option<f64> {
        match self.datum()? {
            Datum::Decimal(number) => Some(*number),
            Datum::Integer(number) => Some(*number as f64),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self.datum()? {
            Datum::Boolean(flag) => Some(*flag),
            _ => None,
        }
    }

    /// Date payload; date-times are truncated to their UTC date.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self.datum()? {
            Datum::Date(date) => Some(*date),
            Datum::DateTime(moment) => Some(moment.date_naive()),
            _ => None,
        }
    }

    pub fn as_date_time(&self) -> Option<DateTime<Utc>> {
        match self.datum()? {
            Datum::DateTime(moment) => Some(*moment),
            Datum::Date(date) => date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc()),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<&[u8]> {
        match self.datum()? {
            Datum::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Text form of the value; `None` when null. Sequence elements are
    /// joined with `,` and null elements render empty.
    pub fn to_text(&self) -> Option<String> {
        match &self.content {
            Content::Null | Content::Sequence(None) => None,
            Content::Scalar(datum) => Some(datum.to_text()),
            Content::Sequence(Some(values)) => Some(
                values
                    .iter()
                    .map(|value| value.to_text().unwrap_or_default())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
        }
    }

    /// Ordering between values of the same type. Nulls sort first;
    /// sequences compare element-wise.
    pub fn compare(&self, other: &Value) -> Result<Ordering> {
        if self.value_type != other.value_type {
            return Err(ModelError::IllegalComparison {
                left: self.value_type,
                right: other.value_type,
            });
        }
        match (&self.content, &other.content) {
            (Content::Scalar(a), Content::Scalar(b)) => a.compare(b),
            (Content::Sequence(a), Content::Sequence(b)) => {
                let left = a.as_deref().unwrap_or_default();
                let right = b.as_deref().unwrap_or_default();
                match (a, b) {
                    (None, None) => return Ok(Ordering::Equal),
                    (None, Some(_)) => return Ok(Ordering::Less),
                    (Some(_), None) => return Ok(Ordering::Greater),
                    _ => {}
                }
                for (x, y) in left.iter().zip(right) {
                    let ordering = x.compare(y)?;
                    if ordering != Ordering::Equal {
                        return Ok(ordering);
                    }
                }
                Ok(left.len().cmp(&right.len()))
            }
            (Content::Null, Content::Null) => Ok(Ordering::Equal),
            (Content::Null, Content::Scalar(_)) => Ok(Ordering::Less),
            (Content::Scalar(_), Content::Null) => Ok(Ordering::Greater),
            _ => Err(ModelError::IllegalComparison {
                left: self.value_type,
                right: other.value_type,
            }),
        }
    }

    /// Equality defined only between same-typed values.
    pub fn try_eq(&self, other: &Value) -> Result<bool> {
        self.compare(other).map(|ordering| ordering == Ordering::Equal)
    }

    /// Convert into another type through the text form. Null converts to the
    /// target's null; sequences convert element-wise.
    pub fn convert(&self, target: ValueType) -> Result<Value> {
        if self.value_type == target {
            return Ok(self.clone());
        }
        match &self.content {
            Content::Null => Ok(Value::null(target)),
            Content::Sequence(None) => Ok(Value::null_sequence(target)),
            Content::Sequence(Some(values)) => {
                let converted = values
                    .iter()
                    .map(|value| value.convert(target))
                    .collect::<Result<Vec<_>>>()?;
                target.sequence_of(converted)
            }
            Content::Scalar(datum) => target.value_of(&datum.to_text()),
        }
    }
}

impl From<Datum> for Value {
    fn from(datum: Datum) -> Self {
        Self {
            value_type: datum.value_type(),
            content: Content::Scalar(datum),
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::text(text)
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::text(text)
    }
}

impl From<i64> for Value {
    fn from(number: i64) -> Self {
        Value::integer(number)
    }
}

impl From<f64> for Value {
    fn from(number: f64) -> Self {
        Value::decimal(number)
    }
}

impl From<bool> for Value {
    fn from(flag: bool) -> Self {
        Value::boolean(flag)
    }
}

impl From<NaiveDate> for Value {
    fn from(date: NaiveDate) -> Self {
        Value::date(date)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_text() {
            Some(text) => f.write_str(&text),
            None => f.write_str("null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_scalar_and_empty_sequence_differ() {
        let null = Value::null(ValueType::Integer);
        let empty = ValueType::Integer.sequence_of(Vec::new()).unwrap();
        let null_seq = Value::null_sequence(ValueType::Integer);
        assert!(null.is_null());
        assert!(!empty.is_null());
        assert!(null_seq.is_null());
        assert!(empty.is_sequence());
        assert!(null_seq.is_sequence());
        assert_ne!(null, null_seq);
    }

    #[test]
    fn non_finite_decimal_is_null() {
        assert!(Value::decimal(f64::NAN).is_null());
        assert_eq!(Value::decimal(f64::INFINITY).value_type(), ValueType::Decimal);
    }

    #[test]
    fn sequence_text_joins_elements() {
        let seq = ValueType::Integer
            .sequence_of([Value::integer(1), Value::null(ValueType::Integer), Value::integer(3)])
            .unwrap();
        assert_eq!(seq.to_text().as_deref(), Some("1,,3"));
        assert_eq!(seq.size(), 3);
    }

    #[test]
    fn convert_goes_through_text() {
        let value = Value::text("42").convert(ValueType::Integer).unwrap();
        assert_eq!(value.as_integer(), Some(42));
        assert!(Value::text("abc").convert(ValueType::Integer).is_err());
        let null = Value::null(ValueType::Text).convert(ValueType::Date).unwrap();
        assert!(null.is_null());
        assert_eq!(null.value_type(), ValueType::Date);
    }
}
