//! Reader and writer configuration.
//!
//! These are plain values handed to the codec by the host application.
//! They can be built in code with the builder methods or deserialized from
//! whatever configuration format the host uses.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::protocol::{
    DataSetFieldContentMask, DataSetMessageContentMask, NetworkMessageContentMask,
};
use crate::types::variant::BuiltInType;

/// Publisher identity a reader accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublisherFilter {
    /// Accept messages from any publisher.
    #[default]
    Any,
    /// Accept only this publisher id (case-sensitive).
    Exact(String),
}

impl PublisherFilter {
    /// Checks a message's publisher id against this filter.
    ///
    /// `observed` is `None` when the message did not carry a publisher id.
    #[must_use]
    pub fn matches(&self, observed: Option<&str>) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(expected) => observed == Some(expected.as_str()),
        }
    }
}

/// Version of a data set's metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigurationVersion {
    /// Bumped on incompatible changes.
    pub major_version: u32,
    /// Bumped on compatible changes.
    pub minor_version: u32,
}

impl ConfigurationVersion {
    /// Creates a version.
    #[must_use]
    pub const fn new(major_version: u32, minor_version: u32) -> Self {
        Self {
            major_version,
            minor_version,
        }
    }

    /// Returns true if data written under `other` can be read under `self`.
    ///
    /// A zero major version on either side means "unversioned".
    #[must_use]
    pub const fn is_compatible_with(self, other: Self) -> bool {
        self.major_version == 0
            || other.major_version == 0
            || self.major_version == other.major_version
    }
}

/// Description of one data set field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMetaData {
    /// Field name as written on the wire.
    pub name: String,
    /// Type of the field (element type for arrays).
    pub built_in_type: BuiltInType,
    /// Whether the field holds a one-dimensional array.
    #[serde(default)]
    pub is_array: bool,
}

impl FieldMetaData {
    /// Creates a scalar field description.
    #[must_use]
    pub fn new(name: impl Into<String>, built_in_type: BuiltInType) -> Self {
        Self {
            name: name.into(),
            built_in_type,
            is_array: false,
        }
    }

    /// Marks the field as an array.
    #[must_use]
    pub fn array(mut self) -> Self {
        self.is_array = true;
        self
    }
}

/// Schema a reader expects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSetMetaData {
    /// Data set name.
    pub name: String,
    /// Fields in wire order.
    pub fields: Vec<FieldMetaData>,
    /// Metadata version.
    #[serde(default)]
    pub configuration_version: ConfigurationVersion,
}

impl DataSetMetaData {
    /// Creates metadata with no fields.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Appends a field.
    #[must_use]
    pub fn field(mut self, field: FieldMetaData) -> Self {
        self.fields.push(field);
        self
    }

    /// Sets the metadata version.
    #[must_use]
    pub const fn version(mut self, version: ConfigurationVersion) -> Self {
        self.configuration_version = version;
        self
    }
}

/// Raw content masks a reader expects.
///
/// Kept as the integers the configuration carries; [`Self::masks`] checks
/// them before use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderMessageSettings {
    /// Expected network message mask.
    pub network_message_content_mask: u32,
    /// Expected data set message mask.
    pub data_set_message_content_mask: u32,
    /// Expected field mask.
    pub data_set_field_content_mask: u32,
}

impl ReaderMessageSettings {
    /// Creates settings from typed masks.
    #[must_use]
    pub const fn new(
        network: NetworkMessageContentMask,
        data_set: DataSetMessageContentMask,
        field: DataSetFieldContentMask,
    ) -> Self {
        Self {
            network_message_content_mask: network.bits(),
            data_set_message_content_mask: data_set.bits(),
            data_set_field_content_mask: field.bits(),
        }
    }

    /// Returns the typed masks, or `None` if any carries unknown bits.
    #[must_use]
    pub const fn masks(
        &self,
    ) -> Option<(
        NetworkMessageContentMask,
        DataSetMessageContentMask,
        DataSetFieldContentMask,
    )> {
        let Some(network) = NetworkMessageContentMask::from_bits(self.network_message_content_mask)
        else {
            return None;
        };
        let Some(data_set) =
            DataSetMessageContentMask::from_bits(self.data_set_message_content_mask)
        else {
            return None;
        };
        let Some(field) = DataSetFieldContentMask::from_bits(self.data_set_field_content_mask)
        else {
            return None;
        };
        Some((network, data_set, field))
    }
}

/// Receiver-side configuration of one subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Reader name, used in logs and events.
    pub name: String,
    /// Accepted publisher.
    #[serde(default)]
    pub publisher_id: PublisherFilter,
    /// Accepted writer id; 0 accepts any.
    #[serde(default)]
    pub data_set_writer_id: u16,
    /// Expected content masks.
    #[serde(default)]
    pub message_settings: Option<ReaderMessageSettings>,
    /// Expected schema.
    pub metadata: DataSetMetaData,
}

impl ReaderConfig {
    /// Creates a reader accepting any publisher and writer, without
    /// message settings.
    #[must_use]
    pub fn new(name: impl Into<String>, metadata: DataSetMetaData) -> Self {
        Self {
            name: name.into(),
            publisher_id: PublisherFilter::Any,
            data_set_writer_id: 0,
            message_settings: None,
            metadata,
        }
    }

    /// Accepts only the given publisher id.
    #[must_use]
    pub fn publisher(mut self, publisher_id: impl Into<String>) -> Self {
        self.publisher_id = PublisherFilter::Exact(publisher_id.into());
        self
    }

    /// Accepts only the given writer id.
    #[must_use]
    pub const fn writer_id(mut self, data_set_writer_id: u16) -> Self {
        self.data_set_writer_id = data_set_writer_id;
        self
    }

    /// Sets the expected content masks.
    #[must_use]
    pub const fn message_settings(mut self, settings: ReaderMessageSettings) -> Self {
        self.message_settings = Some(settings);
        self
    }

    /// Checks the configuration for values the codec cannot use.
    pub fn validate(&self) -> Result<()> {
        if matches!(&self.publisher_id, PublisherFilter::Exact(id) if id.is_empty()) {
            return Err(Error::InvalidConfig {
                reason: format!("reader {}: empty publisher id", self.name),
            });
        }
        if let Some(settings) = &self.message_settings {
            if settings.masks().is_none() {
                return Err(Error::InvalidConfig {
                    reason: format!("reader {}: unknown content mask bits", self.name),
                });
            }
        }
        Ok(())
    }
}

/// Writer-side configuration of one data set writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSetWriterConfig {
    /// Writer name.
    pub name: String,
    /// Writer id written into DataSetMessage headers.
    pub data_set_writer_id: u16,
    /// DataSetMessage header fields to write.
    #[serde(default)]
    pub data_set_message_content_mask: u32,
    /// Field encoding.
    #[serde(default)]
    pub data_set_field_content_mask: u32,
}

impl DataSetWriterConfig {
    /// Creates a writer with empty masks.
    #[must_use]
    pub fn new(name: impl Into<String>, data_set_writer_id: u16) -> Self {
        Self {
            name: name.into(),
            data_set_writer_id,
            data_set_message_content_mask: 0,
            data_set_field_content_mask: 0,
        }
    }

    /// Sets both content masks.
    #[must_use]
    pub const fn masks(
        mut self,
        data_set: DataSetMessageContentMask,
        field: DataSetFieldContentMask,
    ) -> Self {
        self.data_set_message_content_mask = data_set.bits();
        self.data_set_field_content_mask = field.bits();
        self
    }
}

/// Writer-side configuration of a group of writers sharing one
/// NetworkMessage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriterGroupConfig {
    /// Group name.
    pub name: String,
    /// Publisher id written when the mask asks for it.
    #[serde(default)]
    pub publisher_id: Option<String>,
    /// Data set class id written when the mask asks for it.
    #[serde(default)]
    pub data_set_class_id: Option<String>,
    /// Reply address written when the mask asks for it.
    #[serde(default)]
    pub reply_to: Option<String>,
    /// Network message mask.
    #[serde(default)]
    pub network_message_content_mask: u32,
    /// Writers of this group.
    #[serde(default)]
    pub writers: Vec<DataSetWriterConfig>,
}

impl WriterGroupConfig {
    /// Creates a group with no writers and an empty mask.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            publisher_id: None,
            data_set_class_id: None,
            reply_to: None,
            network_message_content_mask: 0,
            writers: Vec::new(),
        }
    }

    /// Sets the publisher id.
    #[must_use]
    pub fn publisher(mut self, publisher_id: impl Into<String>) -> Self {
        self.publisher_id = Some(publisher_id.into());
        self
    }

    /// Sets the network message mask.
    #[must_use]
    pub const fn content_mask(mut self, mask: NetworkMessageContentMask) -> Self {
        self.network_message_content_mask = mask.bits();
        self
    }

    /// Appends a writer.
    #[must_use]
    pub fn writer(mut self, writer: DataSetWriterConfig) -> Self {
        self.writers.push(writer);
        self
    }

    /// Checks the configuration for values the codec cannot use.
    pub fn validate(&self) -> Result<()> {
        if NetworkMessageContentMask::from_bits(self.network_message_content_mask).is_none() {
            return Err(Error::InvalidConfig {
                reason: format!("writer group {}: unknown content mask bits", self.name),
            });
        }
        for writer in &self.writers {
            if DataSetMessageContentMask::from_bits(writer.data_set_message_content_mask)
                .is_none()
                || DataSetFieldContentMask::from_bits(writer.data_set_field_content_mask)
                    .is_none()
            {
                return Err(Error::InvalidConfig {
                    reason: format!("writer {}: unknown content mask bits", writer.name),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publisher_filter() {
        assert!(PublisherFilter::Any.matches(None));
        assert!(PublisherFilter::Any.matches(Some("x")));

        let filter = PublisherFilter::Exact("Plant-A".into());
        assert!(filter.matches(Some("Plant-A")));
        assert!(!filter.matches(Some("plant-a")));
        assert!(!filter.matches(None));
    }

    #[test]
    fn test_settings_masks() {
        let settings = ReaderMessageSettings::new(
            NetworkMessageContentMask::NETWORK_MESSAGE_HEADER,
            DataSetMessageContentMask::SEQUENCE_NUMBER,
            DataSetFieldContentMask::RAW_DATA,
        );
        let (network, data_set, field) = settings.masks().unwrap();
        assert!(network.has_network_message_header());
        assert!(data_set.contains(DataSetMessageContentMask::SEQUENCE_NUMBER));
        assert!(field.contains(DataSetFieldContentMask::RAW_DATA));

        let malformed = ReaderMessageSettings {
            network_message_content_mask: 0x100,
            ..settings
        };
        assert!(malformed.masks().is_none());
    }

    #[test]
    fn test_reader_validate() {
        let metadata = DataSetMetaData::new("Boiler");
        assert!(ReaderConfig::new("r", metadata.clone()).validate().is_ok());
        assert!(ReaderConfig::new("r", metadata.clone()).publisher("").validate().is_err());

        let reader = ReaderConfig::new("r", metadata).message_settings(ReaderMessageSettings {
            data_set_field_content_mask: 0x80,
            ..ReaderMessageSettings::default()
        });
        assert!(matches!(reader.validate(), Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_version_compatibility() {
        let v1 = ConfigurationVersion::new(1, 0);
        assert!(v1.is_compatible_with(ConfigurationVersion::new(1, 7)));
        assert!(!v1.is_compatible_with(ConfigurationVersion::new(2, 0)));
        assert!(v1.is_compatible_with(ConfigurationVersion::default()));
    }

    #[test]
    fn test_reader_config_from_json() {
        let reader: ReaderConfig = serde_json::from_str(
            r#"{
                "name": "boiler",
                "publisher_id": {"exact": "Plant-A"},
                "message_settings": {
                    "network_message_content_mask": 1,
                    "data_set_message_content_mask": 0,
                    "data_set_field_content_mask": 0
                },
                "metadata": {
                    "name": "Boiler",
                    "fields": [{"name": "Temperature", "built_in_type": "Double"}]
                }
            }"#,
        )
        .unwrap();

        assert_eq!(reader.publisher_id, PublisherFilter::Exact("Plant-A".into()));
        assert_eq!(reader.data_set_writer_id, 0);
        assert_eq!(reader.metadata.fields[0].built_in_type, BuiltInType::Double);
        assert!(!reader.metadata.fields[0].is_array);
    }

    #[test]
    fn test_writer_group_validate() {
        let group = WriterGroupConfig::new("g")
            .content_mask(NetworkMessageContentMask::NETWORK_MESSAGE_HEADER)
            .writer(DataSetWriterConfig::new("w", 1));
        assert!(group.validate().is_ok());

        let mut bad = group;
        bad.writers[0].data_set_message_content_mask = 0xff;
        assert!(bad.validate().is_err());
    }
}
