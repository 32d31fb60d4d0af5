//! Content masks controlling the wire shape of JSON messages.
//!
//! Each mask is an immutable bit set. Shape decisions are always computed
//! from the stored bits; nothing caches a derived boolean.

use std::fmt;
use std::ops::BitOr;

macro_rules! content_mask {
    ($(#[$meta:meta])* $name:ident, $all:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
        pub struct $name(u32);

        impl $name {
            /// No flags set.
            pub const NONE: Self = Self(0);

            const ALL_BITS: u32 = $all;

            /// Creates a mask from raw bits, rejecting unknown bits.
            #[must_use]
            pub const fn from_bits(bits: u32) -> Option<Self> {
                if bits & !Self::ALL_BITS == 0 {
                    Some(Self(bits))
                } else {
                    None
                }
            }

            /// Creates a mask from raw bits, dropping unknown bits.
            #[must_use]
            pub const fn from_bits_truncate(bits: u32) -> Self {
                Self(bits & Self::ALL_BITS)
            }

            /// Returns the raw bit value.
            #[must_use]
            pub const fn bits(self) -> u32 {
                self.0
            }

            /// Returns true if every bit of `flag` is set.
            #[must_use]
            pub const fn contains(self, flag: Self) -> bool {
                (self.0 & flag.0) == flag.0
            }

            /// Returns true if this mask carries every bit `expected` asks for.
            #[must_use]
            pub const fn satisfies(self, expected: Self) -> bool {
                (self.0 & expected.0) == expected.0
            }

            /// Returns the union of both masks.
            #[must_use]
            pub const fn union(self, other: Self) -> Self {
                Self(self.0 | other.0)
            }

            /// Returns true if no flag is set.
            #[must_use]
            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }
        }

        impl BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                self.union(rhs)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:#04x})", stringify!($name), self.0)
            }
        }
    };
}

content_mask!(
    /// Flags selecting the top-level NetworkMessage shape.
    NetworkMessageContentMask,
    0x3f
);

impl NetworkMessageContentMask {
    /// `MessageId`/`MessageType` header is written.
    pub const NETWORK_MESSAGE_HEADER: Self = Self(1 << 0);
    /// Each DataSetMessage carries its own header.
    pub const DATA_SET_MESSAGE_HEADER: Self = Self(1 << 1);
    /// Exactly one DataSetMessage, written as an object rather than an array.
    pub const SINGLE_DATA_SET_MESSAGE: Self = Self(1 << 2);
    /// `PublisherId` is written (header only).
    pub const PUBLISHER_ID: Self = Self(1 << 3);
    /// `DataSetClassId` is written (header only).
    pub const DATA_SET_CLASS_ID: Self = Self(1 << 4);
    /// `ReplyTo` is written (header only).
    pub const REPLY_TO: Self = Self(1 << 5);

    /// Returns true if the network message header is present.
    #[must_use]
    pub const fn has_network_message_header(self) -> bool {
        self.contains(Self::NETWORK_MESSAGE_HEADER)
    }

    /// Returns true if DataSetMessages carry their own header.
    #[must_use]
    pub const fn has_data_set_message_header(self) -> bool {
        self.contains(Self::DATA_SET_MESSAGE_HEADER)
    }

    /// Returns true if a single DataSetMessage is sent.
    #[must_use]
    pub const fn has_single_data_set_message(self) -> bool {
        self.contains(Self::SINGLE_DATA_SET_MESSAGE)
    }

    /// Returns true if the root token is a JSON array.
    #[must_use]
    pub const fn root_is_array(self) -> bool {
        !self.has_network_message_header() && !self.has_single_data_set_message()
    }
}

content_mask!(
    /// Flags selecting which DataSetMessage header fields are written.
    DataSetMessageContentMask,
    0x1f
);

impl DataSetMessageContentMask {
    /// `DataSetWriterId` is written.
    pub const DATA_SET_WRITER_ID: Self = Self(1 << 0);
    /// `MetaDataVersion` is written.
    pub const META_DATA_VERSION: Self = Self(1 << 1);
    /// `SequenceNumber` is written.
    pub const SEQUENCE_NUMBER: Self = Self(1 << 2);
    /// `Timestamp` is written.
    pub const TIMESTAMP: Self = Self(1 << 3);
    /// `Status` is written.
    pub const STATUS: Self = Self(1 << 4);
}

content_mask!(
    /// Flags selecting how each data set field is encoded.
    DataSetFieldContentMask,
    0x3f
);

impl DataSetFieldContentMask {
    /// Field status code is written.
    pub const STATUS_CODE: Self = Self(1 << 0);
    /// Field source timestamp is written.
    pub const SOURCE_TIMESTAMP: Self = Self(1 << 1);
    /// Field server timestamp is written.
    pub const SERVER_TIMESTAMP: Self = Self(1 << 2);
    /// Field source picoseconds are written.
    pub const SOURCE_PICO_SECONDS: Self = Self(1 << 3);
    /// Field server picoseconds are written.
    pub const SERVER_PICO_SECONDS: Self = Self(1 << 4);
    /// Field bodies are written without type information.
    pub const RAW_DATA: Self = Self(1 << 5);

    /// Returns the field encoding these flags select.
    #[must_use]
    pub const fn field_encoding(self) -> FieldEncoding {
        if self.contains(Self::RAW_DATA) {
            FieldEncoding::RawData
        } else if self.is_empty() {
            FieldEncoding::Variant
        } else {
            FieldEncoding::DataValue
        }
    }
}

/// How a single data set field appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldEncoding {
    /// Reversible `{"Type", "Body"}` variant.
    Variant,
    /// Bare body; the reader's metadata supplies the type.
    RawData,
    /// `{"Value", "StatusCode", ...}` object.
    DataValue,
}
