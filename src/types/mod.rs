//! Data types for published values and reader/writer configuration.
//!
//! - Built-in values and their JSON encodings
//! - Data values and data sets
//! - Reader and writer configuration

pub mod config;
pub mod data_value;
pub mod variant;

pub use config::{
    ConfigurationVersion, DataSetMetaData, DataSetWriterConfig, FieldMetaData, PublisherFilter,
    ReaderConfig, ReaderMessageSettings, WriterGroupConfig,
};
pub use data_value::{DataSet, DataValue};
pub use variant::{BuiltInType, StatusCode, Variant, format_date_time, parse_date_time};
