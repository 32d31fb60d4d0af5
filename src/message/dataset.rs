//! DataSetMessage codec.
//!
//! With a header, a DataSetMessage is an object carrying the header fields
//! selected by its message mask followed by the field map under `"Payload"`:
//! ```text
//! { "DataSetWriterId": 1, "SequenceNumber": 7, ..., "Payload": { <fields> } }
//! ```
//! Without a header it is the field map itself.

use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::error::{DecodeError, Result};
use crate::protocol::{
    DataSetFieldContentMask, DataSetMessageContentMask, JsonEncoder, MessageBody, Scope,
};
use crate::types::{
    ConfigurationVersion, DataSet, DataSetWriterConfig, DataValue, ReaderConfig, StatusCode,
    format_date_time, parse_date_time,
};

/// Field holding the data set fields when a header is present.
pub const PAYLOAD_FIELD: &str = "Payload";

const DATA_SET_WRITER_ID_FIELD: &str = "DataSetWriterId";
const SEQUENCE_NUMBER_FIELD: &str = "SequenceNumber";
const META_DATA_VERSION_FIELD: &str = "MetaDataVersion";
const MAJOR_VERSION_FIELD: &str = "MajorVersion";
const MINOR_VERSION_FIELD: &str = "MinorVersion";
const TIMESTAMP_FIELD: &str = "Timestamp";
const STATUS_FIELD: &str = "Status";

/// One data set's snapshot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataSetMessage {
    has_header: bool,
    message_content_mask: DataSetMessageContentMask,
    field_content_mask: DataSetFieldContentMask,
    data_set: DataSet,
    /// Id of the writer that produced the data set.
    pub data_set_writer_id: u16,
    /// Per-writer sequence number.
    pub sequence_number: u32,
    /// Version of the metadata the data set was written under.
    pub metadata_version: ConfigurationVersion,
    /// When the data set was sampled.
    pub timestamp: Option<OffsetDateTime>,
    /// Overall status of the data set.
    pub status: StatusCode,
}

impl DataSetMessage {
    /// Creates a message for writing, with empty masks.
    #[must_use]
    pub fn new(data_set: DataSet) -> Self {
        Self {
            data_set,
            ..Self::default()
        }
    }

    /// Creates a message for writing as the given writer describes it.
    ///
    /// Unknown mask bits in the writer configuration are ignored.
    #[must_use]
    pub fn from_writer(writer: &DataSetWriterConfig, data_set: DataSet) -> Self {
        Self {
            message_content_mask: DataSetMessageContentMask::from_bits_truncate(
                writer.data_set_message_content_mask,
            ),
            field_content_mask: DataSetFieldContentMask::from_bits_truncate(
                writer.data_set_field_content_mask,
            ),
            data_set_writer_id: writer.data_set_writer_id,
            ..Self::new(data_set)
        }
    }

    /// Creates an empty message to decode into.
    #[must_use]
    pub fn with_masks(
        message_content_mask: DataSetMessageContentMask,
        field_content_mask: DataSetFieldContentMask,
    ) -> Self {
        Self {
            message_content_mask,
            field_content_mask,
            ..Self::default()
        }
    }

    /// Sets the sequence number.
    #[must_use]
    pub fn sequence_number(mut self, sequence_number: u32) -> Self {
        self.sequence_number = sequence_number;
        self
    }

    /// Sets the sampling timestamp.
    #[must_use]
    pub fn timestamp(mut self, timestamp: OffsetDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Returns true if this message is written with its own header.
    #[must_use]
    pub const fn has_header(&self) -> bool {
        self.has_header
    }

    /// Sets whether this message is written with its own header.
    pub fn set_has_header(&mut self, has_header: bool) {
        self.has_header = has_header;
    }

    /// Returns the header field mask.
    #[must_use]
    pub const fn message_content_mask(&self) -> DataSetMessageContentMask {
        self.message_content_mask
    }

    /// Returns the field mask.
    #[must_use]
    pub const fn field_content_mask(&self) -> DataSetFieldContentMask {
        self.field_content_mask
    }

    /// Sets both content masks.
    pub fn set_content_masks(
        &mut self,
        message_content_mask: DataSetMessageContentMask,
        field_content_mask: DataSetFieldContentMask,
    ) {
        self.message_content_mask = message_content_mask;
        self.field_content_mask = field_content_mask;
    }

    /// Returns the data set.
    #[must_use]
    pub const fn data_set(&self) -> &DataSet {
        &self.data_set
    }

    /// Consumes the message, returning its data set.
    #[must_use]
    pub fn into_data_set(self) -> DataSet {
        self.data_set
    }

    /// Writes this message as one structure.
    ///
    /// `field_name` names the structure inside an object scope and must be
    /// `None` inside an array.
    pub fn encode(&self, encoder: &mut JsonEncoder, field_name: Option<&str>) -> Result<()> {
        encoder.push_structure(field_name)?;
        self.encode_payload(encoder, self.has_header)?;
        encoder.pop_structure()
    }

    /// Writes this message's content into the current scope.
    ///
    /// With `write_header` the header fields and a `"Payload"` structure are
    /// written, otherwise only the field map.
    pub fn encode_payload(&self, encoder: &mut JsonEncoder, write_header: bool) -> Result<()> {
        if !write_header {
            return self.encode_fields(encoder);
        }

        let mask = self.message_content_mask;
        if mask.contains(DataSetMessageContentMask::DATA_SET_WRITER_ID) {
            encoder.write_value(
                Some(DATA_SET_WRITER_ID_FIELD),
                Value::from(self.data_set_writer_id),
            )?;
        }
        if mask.contains(DataSetMessageContentMask::SEQUENCE_NUMBER) {
            encoder.write_value(
                Some(SEQUENCE_NUMBER_FIELD),
                Value::from(self.sequence_number),
            )?;
        }
        if mask.contains(DataSetMessageContentMask::META_DATA_VERSION) {
            let mut version = Map::new();
            version.insert(
                MAJOR_VERSION_FIELD.to_owned(),
                Value::from(self.metadata_version.major_version),
            );
            version.insert(
                MINOR_VERSION_FIELD.to_owned(),
                Value::from(self.metadata_version.minor_version),
            );
            encoder.write_value(Some(META_DATA_VERSION_FIELD), Value::Object(version))?;
        }
        if mask.contains(DataSetMessageContentMask::TIMESTAMP) {
            if let Some(timestamp) = self.timestamp {
                encoder.write_string(Some(TIMESTAMP_FIELD), &format_date_time(timestamp)?)?;
            }
        }
        if mask.contains(DataSetMessageContentMask::STATUS) {
            encoder.write_value(Some(STATUS_FIELD), Value::from(self.status.0))?;
        }

        encoder.push_structure(Some(PAYLOAD_FIELD))?;
        self.encode_fields(encoder)?;
        encoder.pop_structure()
    }

    fn encode_fields(&self, encoder: &mut JsonEncoder) -> Result<()> {
        for (name, value) in self.data_set.iter() {
            encoder.write_value(Some(name), value.to_field_json(self.field_content_mask)?)?;
        }
        Ok(())
    }

    /// Decodes the first candidate of `body` that matches `reader`.
    ///
    /// Candidates are visited by index over the shared body; a candidate is
    /// skipped when its header names another writer or an incompatible
    /// metadata version, or when none of the reader's fields are present.
    /// Header fields are taken from the matching candidate only. On return
    /// the data set is empty if nothing matched.
    ///
    /// # Errors
    ///
    /// Returns an error if a candidate is malformed.
    pub fn decode_possible(
        &mut self,
        body: &MessageBody<'_>,
        reader: &ReaderConfig,
    ) -> std::result::Result<(), DecodeError> {
        for index in 0..body.count() {
            let Some(element) = body.element(index) else {
                break;
            };
            if !element.is_structure() {
                return Err(DecodeError::shape(element_label(body, index), "object"));
            }

            let (header, payload) = if self.has_header {
                let Some(header) = self.decode_header(element, reader)? else {
                    continue;
                };
                let Some(payload) = element.structure(PAYLOAD_FIELD) else {
                    tracing::trace!(
                        "reader {}: {} has no payload",
                        reader.name,
                        element_label(body, index)
                    );
                    continue;
                };
                (Some(header), payload)
            } else {
                (None, element)
            };

            let data_set = self.decode_fields(payload, reader)?;
            if !data_set.is_empty() {
                if let Some(header) = header {
                    self.apply_header(header);
                }
                self.data_set = data_set;
                return Ok(());
            }
        }
        Ok(())
    }

    /// Reads one candidate's header.
    ///
    /// Returns `None` if the header rules this candidate out for `reader`.
    /// A reader bound to a writer id rejects candidates that carry another
    /// id or none at all.
    fn decode_header(
        &self,
        element: Scope<'_>,
        reader: &ReaderConfig,
    ) -> std::result::Result<Option<Header>, DecodeError> {
        let mask = self.message_content_mask;
        let mut header = Header::default();

        if mask.contains(DataSetMessageContentMask::DATA_SET_WRITER_ID)
            || reader.data_set_writer_id != 0
        {
            if let Some(id) = element.read_u64(DATA_SET_WRITER_ID_FIELD)? {
                header.data_set_writer_id = u16::try_from(id).map_err(|_| {
                    DecodeError::value(DATA_SET_WRITER_ID_FIELD, format!("{id} out of range"))
                })?;
            }
            if reader.data_set_writer_id != 0
                && reader.data_set_writer_id != header.data_set_writer_id
            {
                tracing::trace!(
                    "reader {}: writer {} does not match {}",
                    reader.name,
                    header.data_set_writer_id,
                    reader.data_set_writer_id
                );
                return Ok(None);
            }
        }

        if mask.contains(DataSetMessageContentMask::META_DATA_VERSION) {
            if let Some(version) = element.structure(META_DATA_VERSION_FIELD) {
                let version = ConfigurationVersion::new(
                    read_u32(version, MAJOR_VERSION_FIELD)?,
                    read_u32(version, MINOR_VERSION_FIELD)?,
                );
                if !reader
                    .metadata
                    .configuration_version
                    .is_compatible_with(version)
                {
                    tracing::debug!(
                        "reader {}: metadata version {}.{} not compatible",
                        reader.name,
                        version.major_version,
                        version.minor_version
                    );
                    return Ok(None);
                }
                header.metadata_version = version;
            }
        }

        if mask.contains(DataSetMessageContentMask::SEQUENCE_NUMBER) {
            header.sequence_number = read_u32(element, SEQUENCE_NUMBER_FIELD)?;
        }

        if mask.contains(DataSetMessageContentMask::TIMESTAMP) {
            header.timestamp = element
                .read_field(TIMESTAMP_FIELD)
                .map(|ts| parse_date_time(ts, TIMESTAMP_FIELD))
                .transpose()?;
        }

        if mask.contains(DataSetMessageContentMask::STATUS) {
            header.status = StatusCode(read_u32(element, STATUS_FIELD)?);
        }

        Ok(Some(header))
    }

    fn apply_header(&mut self, header: Header) {
        self.data_set_writer_id = header.data_set_writer_id;
        self.metadata_version = header.metadata_version;
        self.sequence_number = header.sequence_number;
        self.timestamp = header.timestamp;
        self.status = header.status;
    }

    fn decode_fields(
        &self,
        payload: Scope<'_>,
        reader: &ReaderConfig,
    ) -> std::result::Result<DataSet, DecodeError> {
        let mut data_set = DataSet::new();
        for field in &reader.metadata.fields {
            if let Some(value) = payload.read_field(&field.name) {
                data_set.insert(
                    field.name.clone(),
                    DataValue::from_field_json(value, self.field_content_mask, field)?,
                );
            }
        }
        Ok(data_set)
    }
}

/// Header fields of one candidate.
#[derive(Debug, Default)]
struct Header {
    data_set_writer_id: u16,
    metadata_version: ConfigurationVersion,
    sequence_number: u32,
    timestamp: Option<OffsetDateTime>,
    status: StatusCode,
}

/// Reads an optional `u32`, defaulting to zero when absent.
fn read_u32(scope: Scope<'_>, name: &str) -> std::result::Result<u32, DecodeError> {
    match scope.read_u64(name)? {
        None => Ok(0),
        Some(v) => u32::try_from(v).map_err(|_| DecodeError::value(name, format!("{v} out of range"))),
    }
}

fn element_label(body: &MessageBody<'_>, index: usize) -> String {
    match body.name().and_then(|name| name.field_name()) {
        Some(name) => format!("{name}[{index}]"),
        None => format!("[{index}]"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::JsonDecoder;
    use crate::types::{BuiltInType, DataSetMetaData, FieldMetaData, Variant};
    use serde_json::json;

    fn boiler_metadata() -> DataSetMetaData {
        DataSetMetaData::new("Boiler")
            .field(FieldMetaData::new("Temperature", BuiltInType::Double))
            .field(FieldMetaData::new("Running", BuiltInType::Boolean))
    }

    fn boiler_data_set() -> DataSet {
        [
            ("Temperature", DataValue::new(71.5)),
            ("Running", DataValue::new(true)),
        ]
        .into_iter()
        .collect()
    }

    fn encode_to_json(message: &DataSetMessage) -> serde_json::Value {
        let mut encoder = JsonEncoder::new();
        message.encode_payload(&mut encoder, message.has_header()).unwrap();
        serde_json::from_slice(&encoder.finish().unwrap()).unwrap()
    }

    #[test]
    fn test_encode_without_header() {
        let message = DataSetMessage::new(boiler_data_set());
        assert_eq!(
            encode_to_json(&message),
            json!({
                "Temperature": {"Type": 11, "Body": 71.5},
                "Running": {"Type": 1, "Body": true}
            })
        );
    }

    #[test]
    fn test_encode_with_header() {
        let writer = DataSetWriterConfig::new("boiler", 7).masks(
            DataSetMessageContentMask::DATA_SET_WRITER_ID
                | DataSetMessageContentMask::SEQUENCE_NUMBER,
            DataSetFieldContentMask::RAW_DATA,
        );
        let mut message = DataSetMessage::from_writer(&writer, boiler_data_set()).sequence_number(3);
        message.set_has_header(true);

        assert_eq!(
            encode_to_json(&message),
            json!({
                "DataSetWriterId": 7,
                "SequenceNumber": 3,
                "Payload": {"Temperature": 71.5, "Running": true}
            })
        );
    }

    #[test]
    fn test_decode_skips_other_writers() {
        let decoder = JsonDecoder::parse(
            br#"[
                {"DataSetWriterId": 1, "Payload": {"Temperature": {"Type": 11, "Body": 1.0}}},
                {"DataSetWriterId": 2, "Payload": {"Temperature": {"Type": 11, "Body": 2.0}}}
            ]"#,
        )
        .unwrap();
        let body = decoder.locate_body();
        let reader = ReaderConfig::new("r", boiler_metadata()).writer_id(2);

        let mut message = DataSetMessage::with_masks(
            DataSetMessageContentMask::DATA_SET_WRITER_ID,
            DataSetFieldContentMask::NONE,
        );
        message.set_has_header(true);
        message.decode_possible(&body, &reader).unwrap();

        assert_eq!(message.data_set_writer_id, 2);
        assert_eq!(
            message.data_set().get("Temperature").unwrap().value,
            Variant::Double(2.0)
        );
    }

    #[test]
    fn test_decode_is_repeatable_on_shared_body() {
        let decoder = JsonDecoder::parse(
            br#"[{"Running": {"Type": 1, "Body": false}}, {"Running": {"Type": 1, "Body": true}}]"#,
        )
        .unwrap();
        let body = decoder.locate_body();
        let reader = ReaderConfig::new("r", boiler_metadata());

        for _ in 0..2 {
            let mut message = DataSetMessage::default();
            message.decode_possible(&body, &reader).unwrap();
            assert_eq!(
                message.data_set().get("Running").unwrap().value,
                Variant::Boolean(false)
            );
        }
    }

    #[test]
    fn test_decode_incompatible_version() {
        let decoder = JsonDecoder::parse(
            br#"{"MetaDataVersion": {"MajorVersion": 2, "MinorVersion": 0},
                 "Payload": {"Running": {"Type": 1, "Body": true}}}"#,
        )
        .unwrap();
        let body = decoder.locate_body();
        let metadata = boiler_metadata().version(ConfigurationVersion::new(1, 0));
        let reader = ReaderConfig::new("r", metadata);

        let mut message = DataSetMessage::with_masks(
            DataSetMessageContentMask::META_DATA_VERSION,
            DataSetFieldContentMask::NONE,
        );
        message.set_has_header(true);
        message.decode_possible(&body, &reader).unwrap();
        assert!(message.data_set().is_empty());
    }

    #[test]
    fn test_decode_header_taken_from_matching_candidate() {
        let decoder = JsonDecoder::parse(
            br#"{"Messages": [
                {"DataSetWriterId": 1, "MetaDataVersion": {"MajorVersion": 1, "MinorVersion": 3},
                 "Payload": {"Other": {"Type": 11, "Body": 1.0}}},
                {"Payload": {"Temperature": {"Type": 11, "Body": 2.0}}}
            ]}"#,
        )
        .unwrap();
        let body = decoder.locate_body();
        let reader = ReaderConfig::new("r", boiler_metadata());

        let mut message = DataSetMessage::with_masks(
            DataSetMessageContentMask::DATA_SET_WRITER_ID
                | DataSetMessageContentMask::META_DATA_VERSION,
            DataSetFieldContentMask::NONE,
        );
        message.set_has_header(true);
        message.decode_possible(&body, &reader).unwrap();

        assert_eq!(message.data_set().len(), 1);
        assert_eq!(message.data_set_writer_id, 0);
        assert_eq!(message.metadata_version, ConfigurationVersion::default());
    }

    #[test]
    fn test_writer_bound_reader_rejects_missing_id() {
        let decoder = JsonDecoder::parse(
            br#"{"Messages": [{"Payload": {"Temperature": {"Type": 11, "Body": 2.0}}}]}"#,
        )
        .unwrap();
        let body = decoder.locate_body();
        let reader = ReaderConfig::new("r", boiler_metadata()).writer_id(7);

        for mask in [
            DataSetMessageContentMask::DATA_SET_WRITER_ID,
            DataSetMessageContentMask::NONE,
        ] {
            let mut message = DataSetMessage::with_masks(mask, DataSetFieldContentMask::NONE);
            message.set_has_header(true);
            message.decode_possible(&body, &reader).unwrap();
            assert!(message.data_set().is_empty());
        }
    }

    #[test]
    fn test_writer_bound_reader_without_mask_bit() {
        let decoder = JsonDecoder::parse(
            br#"[
                {"DataSetWriterId": 3, "Payload": {"Temperature": {"Type": 11, "Body": 3.0}}},
                {"DataSetWriterId": 7, "Payload": {"Temperature": {"Type": 11, "Body": 7.0}}}
            ]"#,
        )
        .unwrap();
        let body = decoder.locate_body();
        let reader = ReaderConfig::new("r", boiler_metadata()).writer_id(7);

        let mut message =
            DataSetMessage::with_masks(DataSetMessageContentMask::NONE, DataSetFieldContentMask::NONE);
        message.set_has_header(true);
        message.decode_possible(&body, &reader).unwrap();

        assert_eq!(message.data_set_writer_id, 7);
        assert_eq!(
            message.data_set().get("Temperature").unwrap().value,
            Variant::Double(7.0)
        );
    }

    #[test]
    fn test_decode_no_matching_fields() {
        let decoder = JsonDecoder::parse(br#"{"Pressure": {"Type": 11, "Body": 1.0}}"#).unwrap();
        let body = decoder.locate_body();
        let reader = ReaderConfig::new("r", boiler_metadata());

        let mut message = DataSetMessage::default();
        message.decode_possible(&body, &reader).unwrap();
        assert!(message.data_set().is_empty());
    }

    #[test]
    fn test_decode_non_object_element() {
        let decoder = JsonDecoder::parse(b"[1, 2]").unwrap();
        let body = decoder.locate_body();
        let reader = ReaderConfig::new("r", boiler_metadata());

        let mut message = DataSetMessage::default();
        let err = message.decode_possible(&body, &reader).unwrap_err();
        assert_eq!(err, DecodeError::shape("[0]", "object"));
    }
}
