//! Network message kinds.
//!
//! The `MessageType` header field tells data-set messages apart from the
//! other kinds of network message sharing the same bus.

/// Literal identifying a data-set network message.
pub const DATA_MESSAGE_TYPE: &str = "ua-data";

/// Literal identifying a metadata network message.
pub const METADATA_MESSAGE_TYPE: &str = "ua-metadata";

/// Kind of a JSON network message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Data-set message (`"ua-data"`).
    Data,
    /// Data-set metadata announcement (`"ua-metadata"`).
    MetaData,
    /// Any other kind, kept verbatim.
    Other(String),
}

impl MessageType {
    /// Parses a message type from its wire literal.
    #[must_use]
    pub fn from_wire(literal: &str) -> Self {
        match literal {
            DATA_MESSAGE_TYPE => Self::Data,
            METADATA_MESSAGE_TYPE => Self::MetaData,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Returns the wire literal.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Data => DATA_MESSAGE_TYPE,
            Self::MetaData => METADATA_MESSAGE_TYPE,
            Self::Other(literal) => literal,
        }
    }

    /// Returns true if this kind carries data-set messages.
    #[must_use]
    pub const fn is_data(&self) -> bool {
        matches!(self, Self::Data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_from_wire() {
        assert_eq!(MessageType::from_wire("ua-data"), MessageType::Data);
        assert_eq!(MessageType::from_wire("ua-metadata"), MessageType::MetaData);
        assert_eq!(
            MessageType::from_wire("ua-status"),
            MessageType::Other("ua-status".into())
        );
    }

    #[test]
    fn test_is_data() {
        assert!(MessageType::Data.is_data());
        assert!(!MessageType::MetaData.is_data());
        assert!(!MessageType::Other("UA-DATA".into()).is_data());
        assert_eq!(MessageType::Other("x".into()).as_str(), "x");
    }
}
