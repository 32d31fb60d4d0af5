//! Error types for the uapubsub-json library.

use thiserror::Error;

/// The main error type for codec operations.
#[derive(Debug, Error)]
pub enum Error {
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The structured encoder was driven out of order.
    #[error("encoder error: {message}")]
    Encoder { message: String },

    /// Malformed or unexpected input while decoding.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Reader or writer configuration is unusable.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

/// Decode-specific errors.
///
/// These never escape [`NetworkMessage::decode`](crate::NetworkMessage::decode);
/// they are reported as the diagnostic of a
/// [`DecodeOutcome`](crate::DecodeOutcome).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Input is not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// A value had the wrong JSON shape.
    #[error("unexpected shape for {field}: expected {expected}")]
    UnexpectedShape {
        field: String,
        expected: &'static str,
    },

    /// A value had the right shape but could not be converted.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// A reversible variant named a type id this codec does not know.
    #[error("unknown built-in type id {0}")]
    UnknownBuiltInType(u64),
}

impl DecodeError {
    pub(crate) fn shape(field: impl Into<String>, expected: &'static str) -> Self {
        Self::UnexpectedShape {
            field: field.into(),
            expected,
        }
    }

    pub(crate) fn value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, Error>;
