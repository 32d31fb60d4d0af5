//! # uapubsub-json
//!
//! JSON NetworkMessage codec for OPC UA style publish/subscribe.
//!
//! This library turns data sets into JSON network messages and back,
//! offering every received message to a set of configured readers.
//!
//! ## Features
//!
//! - Content-mask driven encoding of all JSON message shapes
//! - Best effort decoding that reports malformed input instead of failing
//! - Independent per-reader matching by publisher, mask and writer
//! - Async event-driven subscriber using Tokio
//!
//! ## Quick Start
//!
//! ```
//! use uapubsub_json::{
//!     BuiltInType, DataSet, DataSetFieldContentMask, DataSetMessage, DataSetMessageContentMask,
//!     DataSetMetaData, DataValue, FieldMetaData, NetworkMessage, NetworkMessageContentMask,
//!     ReaderConfig, ReaderMessageSettings,
//! };
//!
//! fn main() -> Result<(), uapubsub_json::Error> {
//!     // Publish one data set with a network message header
//!     let mut message = NetworkMessage::new();
//!     message.set_content_mask(NetworkMessageContentMask::NETWORK_MESSAGE_HEADER);
//!     message.push(DataSetMessage::new(DataSet::from_iter([(
//!         "Temperature",
//!         DataValue::new(21.5),
//!     )])));
//!     let bytes = message.encode()?;
//!
//!     // Receive it with a reader that knows the field's type
//!     let metadata = DataSetMetaData::new("Boiler")
//!         .field(FieldMetaData::new("Temperature", BuiltInType::Double));
//!     let reader = ReaderConfig::new("boiler", metadata).message_settings(
//!         ReaderMessageSettings::new(
//!             NetworkMessageContentMask::NETWORK_MESSAGE_HEADER,
//!             DataSetMessageContentMask::NONE,
//!             DataSetFieldContentMask::NONE,
//!         ),
//!     );
//!
//!     let outcome = NetworkMessage::decode(&bytes, &[reader]);
//!     assert_eq!(outcome.len(), 1);
//!     assert!(outcome.diagnostic().is_none());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`protocol`] - Wire layer (content masks, JSON encoder and decoder)
//! - [`types`] - Values, data sets and reader/writer configuration
//! - [`message`] - NetworkMessage and DataSetMessage codecs
//! - [`event`] - Async event system for decoded data sets
//! - [`subscriber`] - High-level [`Subscriber`] fed by an external transport

pub mod error;
pub mod event;
pub mod message;
pub mod protocol;
pub mod subscriber;
pub mod types;

// Re-exports for convenience
pub use error::{DecodeError, Error, Result};
pub use event::{Event, EventDispatcher, EventFilter, Subscription};
pub use message::{DataSetMessage, DecodeOutcome, NetworkMessage};
pub use protocol::{
    DataSetFieldContentMask, DataSetMessageContentMask, FieldEncoding, MessageType,
    NetworkMessageContentMask,
};
pub use subscriber::Subscriber;
pub use types::{
    BuiltInType, ConfigurationVersion, DataSet, DataSetMetaData, DataSetWriterConfig, DataValue,
    FieldMetaData, PublisherFilter, ReaderConfig, ReaderMessageSettings, StatusCode, Variant,
    WriterGroupConfig,
};
