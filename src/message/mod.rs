//! Message codecs.
//!
//! - [`NetworkMessage`]: the transmission unit and its decode entry point
//! - [`DataSetMessage`]: one writer's data set inside a network message

pub mod dataset;
pub mod network;

pub use dataset::{DataSetMessage, PAYLOAD_FIELD};
pub use network::{DecodeOutcome, NetworkMessage, decode_for_reader};
