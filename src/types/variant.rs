//! Typed field values and their JSON bodies.
//!
//! Bodies follow the JSON mapping of the OPC UA built-in types: 64-bit
//! integers travel as decimal strings, non-finite floats as `"NaN"`,
//! `"Infinity"` or `"-Infinity"`, byte strings as base64 and date-times as
//! RFC 3339 text.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::{DecodeError, Error, Result};

/// Reversible variant: type id field.
pub const TYPE_FIELD: &str = "Type";

/// Reversible variant: body field.
pub const BODY_FIELD: &str = "Body";

/// Built-in type identifiers understood by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum BuiltInType {
    /// No value.
    #[default]
    Null = 0,
    /// `true` or `false`.
    Boolean = 1,
    /// Signed 8-bit integer.
    SByte = 2,
    /// Unsigned 8-bit integer.
    Byte = 3,
    /// Signed 16-bit integer.
    Int16 = 4,
    /// Unsigned 16-bit integer.
    UInt16 = 5,
    /// Signed 32-bit integer.
    Int32 = 6,
    /// Unsigned 32-bit integer.
    UInt32 = 7,
    /// Signed 64-bit integer.
    Int64 = 8,
    /// Unsigned 64-bit integer.
    UInt64 = 9,
    /// IEEE 754 single precision.
    Float = 10,
    /// IEEE 754 double precision.
    Double = 11,
    /// UTF-8 text.
    String = 12,
    /// Point in time.
    DateTime = 13,
    /// Opaque bytes.
    ByteString = 15,
    /// Operation status code.
    StatusCode = 19,
}

impl BuiltInType {
    /// Parses a built-in type from its numeric id.
    #[must_use]
    pub const fn from_id(id: u64) -> Option<Self> {
        match id {
            0 => Some(Self::Null),
            1 => Some(Self::Boolean),
            2 => Some(Self::SByte),
            3 => Some(Self::Byte),
            4 => Some(Self::Int16),
            5 => Some(Self::UInt16),
            6 => Some(Self::Int32),
            7 => Some(Self::UInt32),
            8 => Some(Self::Int64),
            9 => Some(Self::UInt64),
            10 => Some(Self::Float),
            11 => Some(Self::Double),
            12 => Some(Self::String),
            13 => Some(Self::DateTime),
            15 => Some(Self::ByteString),
            19 => Some(Self::StatusCode),
            _ => None,
        }
    }

    /// Returns the numeric id.
    #[must_use]
    pub const fn id(self) -> u8 {
        self as u8
    }
}

/// OPC UA status code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(pub u32);

impl StatusCode {
    /// Operation succeeded.
    pub const GOOD: Self = Self(0);

    /// Value is uncertain.
    pub const UNCERTAIN: Self = Self(0x4000_0000);

    /// Operation failed.
    pub const BAD: Self = Self(0x8000_0000);

    /// Returns true for a good severity.
    #[must_use]
    pub const fn is_good(self) -> bool {
        self.0 & 0xC000_0000 == 0
    }

    /// Returns true for a bad severity.
    #[must_use]
    pub const fn is_bad(self) -> bool {
        self.0 & 0x8000_0000 != 0
    }
}

/// A typed value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Variant {
    /// No value.
    #[default]
    Null,
    /// Boolean.
    Boolean(bool),
    /// Signed 8-bit integer.
    SByte(i8),
    /// Unsigned 8-bit integer.
    Byte(u8),
    /// Signed 16-bit integer.
    Int16(i16),
    /// Unsigned 16-bit integer.
    UInt16(u16),
    /// Signed 32-bit integer.
    Int32(i32),
    /// Unsigned 32-bit integer.
    UInt32(u32),
    /// Signed 64-bit integer.
    Int64(i64),
    /// Unsigned 64-bit integer.
    UInt64(u64),
    /// Single precision float.
    Float(f32),
    /// Double precision float.
    Double(f64),
    /// Text.
    String(String),
    /// Point in time.
    DateTime(OffsetDateTime),
    /// Opaque bytes.
    ByteString(Vec<u8>),
    /// Status code.
    StatusCode(StatusCode),
    /// One-dimensional array of one element type.
    Array(BuiltInType, Vec<Variant>),
}

impl Variant {
    /// Returns the built-in type (the element type for arrays).
    #[must_use]
    pub const fn built_in_type(&self) -> BuiltInType {
        match self {
            Self::Null => BuiltInType::Null,
            Self::Boolean(_) => BuiltInType::Boolean,
            Self::SByte(_) => BuiltInType::SByte,
            Self::Byte(_) => BuiltInType::Byte,
            Self::Int16(_) => BuiltInType::Int16,
            Self::UInt16(_) => BuiltInType::UInt16,
            Self::Int32(_) => BuiltInType::Int32,
            Self::UInt32(_) => BuiltInType::UInt32,
            Self::Int64(_) => BuiltInType::Int64,
            Self::UInt64(_) => BuiltInType::UInt64,
            Self::Float(_) => BuiltInType::Float,
            Self::Double(_) => BuiltInType::Double,
            Self::String(_) => BuiltInType::String,
            Self::DateTime(_) => BuiltInType::DateTime,
            Self::ByteString(_) => BuiltInType::ByteString,
            Self::StatusCode(_) => BuiltInType::StatusCode,
            Self::Array(element, _) => *element,
        }
    }

    /// Returns true for an array value.
    #[must_use]
    pub const fn is_array(&self) -> bool {
        matches!(self, Self::Array(..))
    }

    /// Returns true for the null value.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Encodes the bare body, without type information.
    pub fn to_json_body(&self) -> Result<Value> {
        Ok(match self {
            Self::Null => Value::Null,
            Self::Boolean(v) => Value::Bool(*v),
            Self::SByte(v) => Value::from(*v),
            Self::Byte(v) => Value::from(*v),
            Self::Int16(v) => Value::from(*v),
            Self::UInt16(v) => Value::from(*v),
            Self::Int32(v) => Value::from(*v),
            Self::UInt32(v) => Value::from(*v),
            Self::Int64(v) => Value::String(v.to_string()),
            Self::UInt64(v) => Value::String(v.to_string()),
            Self::Float(v) => float_body(f64::from(*v)),
            Self::Double(v) => float_body(*v),
            Self::String(v) => Value::String(v.clone()),
            Self::DateTime(v) => Value::String(format_date_time(*v)?),
            Self::ByteString(v) => Value::String(BASE64_STANDARD.encode(v)),
            Self::StatusCode(v) => Value::from(v.0),
            Self::Array(_, items) => Value::Array(
                items
                    .iter()
                    .map(Self::to_json_body)
                    .collect::<Result<Vec<_>>>()?,
            ),
        })
    }

    /// Encodes a reversible `{"Type", "Body"}` variant.
    ///
    /// The null variant is written as JSON `null`.
    pub fn to_reversible_json(&self) -> Result<Value> {
        if self.is_null() {
            return Ok(Value::Null);
        }
        let mut fields = Map::new();
        fields.insert(
            TYPE_FIELD.to_owned(),
            Value::from(self.built_in_type().id()),
        );
        fields.insert(BODY_FIELD.to_owned(), self.to_json_body()?);
        Ok(Value::Object(fields))
    }

    /// Decodes a bare body of a known type.
    ///
    /// JSON `null` decodes to [`Variant::Null`] regardless of the type.
    pub fn from_json_body(
        built_in_type: BuiltInType,
        is_array: bool,
        value: &Value,
        field: &str,
    ) -> std::result::Result<Self, DecodeError> {
        if value.is_null() {
            return Ok(Self::Null);
        }
        if !is_array {
            return scalar_from_json(built_in_type, value, field);
        }
        match value {
            Value::Array(items) => {
                let items = items
                    .iter()
                    .map(|item| scalar_from_json(built_in_type, item, field))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(Self::Array(built_in_type, items))
            }
            _ => Err(DecodeError::shape(field, "array")),
        }
    }

    /// Decodes a reversible `{"Type", "Body"}` variant.
    pub fn from_reversible_json(
        value: &Value,
        field: &str,
    ) -> std::result::Result<Self, DecodeError> {
        let fields = match value {
            Value::Null => return Ok(Self::Null),
            Value::Object(fields) => fields,
            Value::Bool(_) | Value::Number(_) | Value::String(_) | Value::Array(_) => {
                return Err(DecodeError::shape(field, "variant object"));
            }
        };
        let type_id = fields
            .get(TYPE_FIELD)
            .and_then(Value::as_u64)
            .ok_or_else(|| DecodeError::shape(field, "variant type id"))?;
        let built_in_type =
            BuiltInType::from_id(type_id).ok_or(DecodeError::UnknownBuiltInType(type_id))?;
        match fields.get(BODY_FIELD) {
            None => Ok(Self::Null),
            Some(body) => Self::from_json_body(built_in_type, body.is_array(), body, field),
        }
    }
}

fn float_body(value: f64) -> Value {
    if value.is_nan() {
        Value::String("NaN".into())
    } else if value.is_infinite() {
        Value::String(if value > 0.0 { "Infinity" } else { "-Infinity" }.into())
    } else {
        Value::from(value)
    }
}

fn float_from_json(value: &Value, field: &str) -> std::result::Result<f64, DecodeError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| DecodeError::value(field, "number out of range")),
        Value::String(s) => match s.as_str() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            other => Err(DecodeError::value(field, format!("not a float: {other}"))),
        },
        _ => Err(DecodeError::shape(field, "number")),
    }
}

fn integer_from_json<T>(value: &Value, field: &str) -> std::result::Result<T, DecodeError>
where
    T: TryFrom<i64> + TryFrom<u64> + std::str::FromStr,
{
    let out_of_range = || DecodeError::value(field, format!("{value} out of range"));
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                T::try_from(v).map_err(|_| out_of_range())
            } else if let Some(v) = n.as_i64() {
                T::try_from(v).map_err(|_| out_of_range())
            } else {
                Err(DecodeError::value(field, "not an integer"))
            }
        }
        Value::String(s) => s.parse().map_err(|_| out_of_range()),
        _ => Err(DecodeError::shape(field, "integer")),
    }
}

fn scalar_from_json(
    built_in_type: BuiltInType,
    value: &Value,
    field: &str,
) -> std::result::Result<Variant, DecodeError> {
    Ok(match built_in_type {
        BuiltInType::Null => Variant::Null,
        BuiltInType::Boolean => Variant::Boolean(
            value
                .as_bool()
                .ok_or_else(|| DecodeError::shape(field, "boolean"))?,
        ),
        BuiltInType::SByte => Variant::SByte(integer_from_json(value, field)?),
        BuiltInType::Byte => Variant::Byte(integer_from_json(value, field)?),
        BuiltInType::Int16 => Variant::Int16(integer_from_json(value, field)?),
        BuiltInType::UInt16 => Variant::UInt16(integer_from_json(value, field)?),
        BuiltInType::Int32 => Variant::Int32(integer_from_json(value, field)?),
        BuiltInType::UInt32 => Variant::UInt32(integer_from_json(value, field)?),
        BuiltInType::Int64 => Variant::Int64(integer_from_json(value, field)?),
        BuiltInType::UInt64 => Variant::UInt64(integer_from_json(value, field)?),
        BuiltInType::Float => Variant::Float(float_from_json(value, field)? as f32),
        BuiltInType::Double => Variant::Double(float_from_json(value, field)?),
        BuiltInType::String => Variant::String(
            value
                .as_str()
                .ok_or_else(|| DecodeError::shape(field, "string"))?
                .to_owned(),
        ),
        BuiltInType::DateTime => Variant::DateTime(parse_date_time(value, field)?),
        BuiltInType::ByteString => {
            let text = value
                .as_str()
                .ok_or_else(|| DecodeError::shape(field, "base64 string"))?;
            Variant::ByteString(
                BASE64_STANDARD
                    .decode(text)
                    .map_err(|e| DecodeError::value(field, e.to_string()))?,
            )
        }
        BuiltInType::StatusCode => {
            Variant::StatusCode(StatusCode(integer_from_json(value, field)?))
        }
    })
}

/// Formats a date-time as RFC 3339 text.
pub fn format_date_time(value: OffsetDateTime) -> Result<String> {
    value.format(&Rfc3339).map_err(|e| Error::Encoder {
        message: format!("date-time not representable: {e}"),
    })
}

/// Parses an RFC 3339 date-time body.
pub fn parse_date_time(
    value: &Value,
    field: &str,
) -> std::result::Result<OffsetDateTime, DecodeError> {
    let text = value
        .as_str()
        .ok_or_else(|| DecodeError::shape(field, "date-time string"))?;
    OffsetDateTime::parse(text, &Rfc3339).map_err(|e| DecodeError::value(field, e.to_string()))
}

impl From<bool> for Variant {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i32> for Variant {
    fn from(value: i32) -> Self {
        Self::Int32(value)
    }
}

impl From<u32> for Variant {
    fn from(value: u32) -> Self {
        Self::UInt32(value)
    }
}

impl From<i64> for Variant {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<u64> for Variant {
    fn from(value: u64) -> Self {
        Self::UInt64(value)
    }
}

impl From<f32> for Variant {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<f64> for Variant {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Variant {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<OffsetDateTime> for Variant {
    fn from(value: OffsetDateTime) -> Self {
        Self::DateTime(value)
    }
}

impl From<StatusCode> for Variant {
    fn from(value: StatusCode) -> Self {
        Self::StatusCode(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn test_built_in_type_ids() {
        assert_eq!(BuiltInType::from_id(11), Some(BuiltInType::Double));
        assert_eq!(BuiltInType::from_id(14), None);
        assert_eq!(BuiltInType::StatusCode.id(), 19);
    }

    #[test]
    fn test_status_code_severity() {
        assert!(StatusCode::GOOD.is_good());
        assert!(!StatusCode::UNCERTAIN.is_good());
        assert!(!StatusCode::UNCERTAIN.is_bad());
        assert!(StatusCode(0x8034_0000).is_bad());
    }

    #[test]
    fn test_int64_travels_as_string() {
        let body = Variant::Int64(-9_007_199_254_740_993).to_json_body().unwrap();
        assert_eq!(body, json!("-9007199254740993"));

        let decoded = Variant::from_json_body(BuiltInType::Int64, false, &body, "f").unwrap();
        assert_eq!(decoded, Variant::Int64(-9_007_199_254_740_993));

        // Plain numbers are accepted as well.
        let decoded =
            Variant::from_json_body(BuiltInType::UInt64, false, &json!(7), "f").unwrap();
        assert_eq!(decoded, Variant::UInt64(7));
    }

    #[test]
    fn test_non_finite_floats() {
        assert_eq!(
            Variant::Double(f64::INFINITY).to_json_body().unwrap(),
            json!("Infinity")
        );
        let nan = Variant::from_json_body(BuiltInType::Float, false, &json!("NaN"), "f").unwrap();
        assert!(matches!(nan, Variant::Float(v) if v.is_nan()));
    }

    #[test]
    fn test_integer_range_checked() {
        let err = Variant::from_json_body(BuiltInType::Byte, false, &json!(300), "Level")
            .unwrap_err();
        assert!(matches!(err, DecodeError::InvalidValue { ref field, .. } if field == "Level"));

        let err =
            Variant::from_json_body(BuiltInType::UInt16, false, &json!(-1), "x").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidValue { .. }));
    }

    #[test]
    fn test_reversible_variant() {
        let value = Variant::Double(20.5).to_reversible_json().unwrap();
        assert_eq!(value, json!({"Type": 11, "Body": 20.5}));
        assert_eq!(
            Variant::from_reversible_json(&value, "t").unwrap(),
            Variant::Double(20.5)
        );
        assert_eq!(Variant::Null.to_reversible_json().unwrap(), Value::Null);
    }

    #[test]
    fn test_reversible_unknown_type() {
        let err =
            Variant::from_reversible_json(&json!({"Type": 99, "Body": 1}), "x").unwrap_err();
        assert_eq!(err, DecodeError::UnknownBuiltInType(99));
    }

    #[test]
    fn test_array_body() {
        let value = Variant::Array(
            BuiltInType::Int32,
            vec![Variant::Int32(1), Variant::Int32(-2)],
        );
        let json = value.to_reversible_json().unwrap();
        assert_eq!(json, json!({"Type": 6, "Body": [1, -2]}));
        assert_eq!(Variant::from_reversible_json(&json, "a").unwrap(), value);
    }

    #[test]
    fn test_date_time_and_bytes() {
        let when = datetime!(2024-05-01 12:30:00 UTC);
        let body = Variant::DateTime(when).to_json_body().unwrap();
        assert_eq!(body, json!("2024-05-01T12:30:00Z"));
        assert_eq!(
            Variant::from_json_body(BuiltInType::DateTime, false, &body, "t").unwrap(),
            Variant::DateTime(when)
        );

        let body = Variant::ByteString(vec![1, 2, 3]).to_json_body().unwrap();
        assert_eq!(body, json!("AQID"));
    }

    #[test]
    fn test_null_body() {
        assert_eq!(
            Variant::from_json_body(BuiltInType::Double, false, &Value::Null, "x").unwrap(),
            Variant::Null
        );
    }
}
