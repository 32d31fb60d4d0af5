//! Data set field values and their field encodings.

use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::error::{DecodeError, Result};
use crate::protocol::{DataSetFieldContentMask, FieldEncoding};
use crate::types::config::FieldMetaData;
use crate::types::variant::{StatusCode, Variant, format_date_time, parse_date_time};

const VALUE_FIELD: &str = "Value";
const STATUS_CODE_FIELD: &str = "StatusCode";
const SOURCE_TIMESTAMP_FIELD: &str = "SourceTimestamp";
const SOURCE_PICOSECONDS_FIELD: &str = "SourcePicoseconds";
const SERVER_TIMESTAMP_FIELD: &str = "ServerTimestamp";
const SERVER_PICOSECONDS_FIELD: &str = "ServerPicoseconds";

/// A field value with optional quality and timing information.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataValue {
    /// The value itself.
    pub value: Variant,
    /// Quality of the value.
    pub status: Option<StatusCode>,
    /// When the source produced the value.
    pub source_timestamp: Option<OffsetDateTime>,
    /// Sub-tick resolution of the source timestamp.
    pub source_picoseconds: Option<u16>,
    /// When the server observed the value.
    pub server_timestamp: Option<OffsetDateTime>,
    /// Sub-tick resolution of the server timestamp.
    pub server_picoseconds: Option<u16>,
}

impl DataValue {
    /// Creates a data value carrying only a value.
    #[must_use]
    pub fn new(value: impl Into<Variant>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    /// Sets the status code.
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the source timestamp.
    #[must_use]
    pub fn with_source_timestamp(mut self, timestamp: OffsetDateTime) -> Self {
        self.source_timestamp = Some(timestamp);
        self
    }

    /// Sets the server timestamp.
    #[must_use]
    pub fn with_server_timestamp(mut self, timestamp: OffsetDateTime) -> Self {
        self.server_timestamp = Some(timestamp);
        self
    }

    /// Encodes this value as one data set field.
    pub fn to_field_json(&self, mask: DataSetFieldContentMask) -> Result<Value> {
        match mask.field_encoding() {
            FieldEncoding::Variant => self.value.to_reversible_json(),
            FieldEncoding::RawData => self.value.to_json_body(),
            FieldEncoding::DataValue => {
                let mut fields = Map::new();
                if !self.value.is_null() {
                    fields.insert(VALUE_FIELD.to_owned(), self.value.to_reversible_json()?);
                }
                if mask.contains(DataSetFieldContentMask::STATUS_CODE) {
                    if let Some(status) = self.status.filter(|s| *s != StatusCode::GOOD) {
                        fields.insert(STATUS_CODE_FIELD.to_owned(), Value::from(status.0));
                    }
                }
                if mask.contains(DataSetFieldContentMask::SOURCE_TIMESTAMP) {
                    if let Some(ts) = self.source_timestamp {
                        fields.insert(
                            SOURCE_TIMESTAMP_FIELD.to_owned(),
                            Value::String(format_date_time(ts)?),
                        );
                    }
                }
                if mask.contains(DataSetFieldContentMask::SOURCE_PICO_SECONDS) {
                    if let Some(ps) = self.source_picoseconds {
                        fields.insert(SOURCE_PICOSECONDS_FIELD.to_owned(), Value::from(ps));
                    }
                }
                if mask.contains(DataSetFieldContentMask::SERVER_TIMESTAMP) {
                    if let Some(ts) = self.server_timestamp {
                        fields.insert(
                            SERVER_TIMESTAMP_FIELD.to_owned(),
                            Value::String(format_date_time(ts)?),
                        );
                    }
                }
                if mask.contains(DataSetFieldContentMask::SERVER_PICO_SECONDS) {
                    if let Some(ps) = self.server_picoseconds {
                        fields.insert(SERVER_PICOSECONDS_FIELD.to_owned(), Value::from(ps));
                    }
                }
                Ok(Value::Object(fields))
            }
        }
    }

    /// Decodes one data set field as the reader's metadata describes it.
    ///
    /// A good status is never written, so an absent `StatusCode` decodes as
    /// `None`; [`StatusCode::GOOD`] set explicitly does not survive a round
    /// trip.
    pub fn from_field_json(
        value: &Value,
        mask: DataSetFieldContentMask,
        field: &FieldMetaData,
    ) -> std::result::Result<Self, DecodeError> {
        let name = field.name.as_str();
        match mask.field_encoding() {
            FieldEncoding::Variant => Ok(Self::new(Variant::from_reversible_json(value, name)?)),
            FieldEncoding::RawData => Ok(Self::new(Variant::from_json_body(
                field.built_in_type,
                field.is_array,
                value,
                name,
            )?)),
            FieldEncoding::DataValue => {
                let Value::Object(fields) = value else {
                    return Err(DecodeError::shape(name, "data value object"));
                };
                let mut decoded = match fields.get(VALUE_FIELD) {
                    Some(inner) => Self::new(Variant::from_reversible_json(inner, name)?),
                    None => Self::default(),
                };
                if mask.contains(DataSetFieldContentMask::STATUS_CODE) {
                    decoded.status = fields
                        .get(STATUS_CODE_FIELD)
                        .map(|code| read_u32(code, name).map(StatusCode))
                        .transpose()?;
                }
                if mask.contains(DataSetFieldContentMask::SOURCE_TIMESTAMP) {
                    decoded.source_timestamp = fields
                        .get(SOURCE_TIMESTAMP_FIELD)
                        .map(|ts| parse_date_time(ts, name))
                        .transpose()?;
                }
                if mask.contains(DataSetFieldContentMask::SOURCE_PICO_SECONDS) {
                    decoded.source_picoseconds = fields
                        .get(SOURCE_PICOSECONDS_FIELD)
                        .map(|ps| read_u16(ps, name))
                        .transpose()?;
                }
                if mask.contains(DataSetFieldContentMask::SERVER_TIMESTAMP) {
                    decoded.server_timestamp = fields
                        .get(SERVER_TIMESTAMP_FIELD)
                        .map(|ts| parse_date_time(ts, name))
                        .transpose()?;
                }
                if mask.contains(DataSetFieldContentMask::SERVER_PICO_SECONDS) {
                    decoded.server_picoseconds = fields
                        .get(SERVER_PICOSECONDS_FIELD)
                        .map(|ps| read_u16(ps, name))
                        .transpose()?;
                }
                Ok(decoded)
            }
        }
    }
}

fn read_u32(value: &Value, field: &str) -> std::result::Result<u32, DecodeError> {
    value
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| DecodeError::shape(field, "32-bit unsigned integer"))
}

fn read_u16(value: &Value, field: &str) -> std::result::Result<u16, DecodeError> {
    value
        .as_u64()
        .and_then(|v| u16::try_from(v).ok())
        .ok_or_else(|| DecodeError::shape(field, "16-bit unsigned integer"))
}

/// Ordered mapping from field name to value.
///
/// Fields keep insertion order, which is also the order they are written.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataSet {
    fields: Vec<(String, DataValue)>,
}

impl DataSet {
    /// Creates an empty data set.
    #[must_use]
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Inserts a field, replacing any previous value with the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: DataValue) {
        let name = name.into();
        if let Some(slot) = self.fields.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.fields.push((name, value));
        }
    }

    /// Returns the value of a field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DataValue> {
        self.fields
            .iter()
            .find_map(|(n, v)| (n == name).then_some(v))
    }

    /// Iterates fields in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DataValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if no field is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, DataValue)> for DataSet {
    fn from_iter<I: IntoIterator<Item = (S, DataValue)>>(iter: I) -> Self {
        let mut data_set = Self::new();
        for (name, value) in iter {
            data_set.insert(name, value);
        }
        data_set
    }
}
