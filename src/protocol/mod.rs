//! JSON wire layer.
//!
//! This module contains the low-level protocol pieces:
//! - Content masks
//! - Message kind literals
//! - Structured encoder and decoder

pub mod decoder;
pub mod encoder;
pub mod mask;
pub mod message_type;

pub use decoder::{BodyName, JsonDecoder, MESSAGES_FIELD, MessageBody, Scope, kind_of};
pub use encoder::JsonEncoder;
pub use mask::{
    DataSetFieldContentMask, DataSetMessageContentMask, FieldEncoding, NetworkMessageContentMask,
};
pub use message_type::{DATA_MESSAGE_TYPE, METADATA_MESSAGE_TYPE, MessageType};
