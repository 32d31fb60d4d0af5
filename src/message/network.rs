//! NetworkMessage codec.
//!
//! The network content mask selects one of the top-level shapes:
//! ```text
//! header  single  shape
//! yes     any     { MessageId, MessageType, [PublisherId], [DataSetClassId],
//!                   Messages: <object or array>, [ReplyTo] }
//! no      yes     the one DataSetMessage's own shape
//! no      no      [ <DataSetMessage>, ... ]
//! ```
//!
//! Decoding is best effort: one incoming message is offered to every
//! configured reader independently and malformed input never escapes as an
//! error, only as the diagnostic of a [`DecodeOutcome`].

use bytes::Bytes;

use crate::error::{DecodeError, Error, Result};
use crate::message::DataSetMessage;
use crate::protocol::{
    DATA_MESSAGE_TYPE, JsonDecoder, JsonEncoder, MESSAGES_FIELD, MessageBody, MessageType,
    NetworkMessageContentMask,
};
use crate::types::{
    DataSet, DataSetWriterConfig, ReaderConfig, ReaderMessageSettings, WriterGroupConfig,
};

const MESSAGE_ID_FIELD: &str = "MessageId";
const MESSAGE_TYPE_FIELD: &str = "MessageType";
const PUBLISHER_ID_FIELD: &str = "PublisherId";
const DATA_SET_CLASS_ID_FIELD: &str = "DataSetClassId";
const REPLY_TO_FIELD: &str = "ReplyTo";

/// One JSON transmission unit.
///
/// [`Default`] yields a message with an empty id, as used when decoding;
/// [`NetworkMessage::new`] assigns a fresh id for publishing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NetworkMessage {
    message_id: String,
    publisher_id: Option<String>,
    data_set_class_id: Option<String>,
    reply_to: Option<String>,
    content_mask: NetworkMessageContentMask,
    messages: Vec<DataSetMessage>,
}

impl NetworkMessage {
    /// Creates an empty message with a fresh message id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            message_id: uuid::Uuid::new_v4().to_string(),
            ..Self::default()
        }
    }

    /// Creates a message from a writer group and one data set per writer.
    ///
    /// Data sets are paired with `config.writers` in order; each
    /// DataSetMessage takes its writer's id and masks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`](crate::Error::InvalidConfig) if the
    /// group carries unknown mask bits or the number of data sets differs
    /// from the number of writers.
    pub fn from_writer_group(config: &WriterGroupConfig, data_sets: Vec<DataSet>) -> Result<Self> {
        config.validate()?;
        if data_sets.len() != config.writers.len() {
            return Err(Error::InvalidConfig {
                reason: format!(
                    "writer group {}: {} data set(s) for {} writer(s)",
                    config.name,
                    data_sets.len(),
                    config.writers.len()
                ),
            });
        }

        let mut message = Self {
            publisher_id: config.publisher_id.clone(),
            data_set_class_id: config.data_set_class_id.clone(),
            reply_to: config.reply_to.clone(),
            ..Self::new()
        };
        message.set_content_mask(NetworkMessageContentMask::from_bits_truncate(
            config.network_message_content_mask,
        ));
        for (writer, data_set) in config.writers.iter().zip(data_sets) {
            message.push_from_writer(writer, data_set);
        }
        Ok(message)
    }

    /// Returns the message id.
    #[must_use]
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Sets the message id.
    pub fn set_message_id(&mut self, message_id: impl Into<String>) {
        self.message_id = message_id.into();
    }

    /// Returns the message kind; always data.
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        MessageType::Data
    }

    /// Returns the publisher id.
    #[must_use]
    pub fn publisher_id(&self) -> Option<&str> {
        self.publisher_id.as_deref()
    }

    /// Sets the publisher id.
    pub fn set_publisher_id(&mut self, publisher_id: Option<String>) {
        self.publisher_id = publisher_id;
    }

    /// Returns the data set class id.
    #[must_use]
    pub fn data_set_class_id(&self) -> Option<&str> {
        self.data_set_class_id.as_deref()
    }

    /// Sets the data set class id.
    pub fn set_data_set_class_id(&mut self, data_set_class_id: Option<String>) {
        self.data_set_class_id = data_set_class_id;
    }

    /// Returns the reply address.
    #[must_use]
    pub fn reply_to(&self) -> Option<&str> {
        self.reply_to.as_deref()
    }

    /// Sets the reply address.
    pub fn set_reply_to(&mut self, reply_to: Option<String>) {
        self.reply_to = reply_to;
    }

    /// Returns the content mask.
    #[must_use]
    pub const fn content_mask(&self) -> NetworkMessageContentMask {
        self.content_mask
    }

    /// Sets the content mask.
    ///
    /// The DataSetMessage header decision is pushed onto every held
    /// DataSetMessage.
    pub fn set_content_mask(&mut self, content_mask: NetworkMessageContentMask) {
        self.content_mask = content_mask;
        let has_header = content_mask.has_data_set_message_header();
        for message in &mut self.messages {
            message.set_has_header(has_header);
        }
    }

    /// Appends a DataSetMessage, applying the current header decision.
    pub fn push(&mut self, mut message: DataSetMessage) {
        message.set_has_header(self.content_mask.has_data_set_message_header());
        self.messages.push(message);
    }

    /// Appends a DataSetMessage built from a writer configuration.
    pub fn push_from_writer(&mut self, writer: &DataSetWriterConfig, data_set: DataSet) {
        self.push(DataSetMessage::from_writer(writer, data_set));
    }

    /// Returns the DataSetMessages in order.
    #[must_use]
    pub fn dataset_messages(&self) -> &[DataSetMessage] {
        &self.messages
    }

    /// Consumes the message, returning its DataSetMessages.
    #[must_use]
    pub fn into_dataset_messages(self) -> Vec<DataSetMessage> {
        self.messages
    }

    /// Encodes the message to JSON text.
    pub fn encode(&self) -> Result<Bytes> {
        let mut encoder = JsonEncoder::new();
        self.encode_with(&mut encoder)?;
        encoder.finish()
    }

    /// Drives `encoder` through this message.
    ///
    /// The encoder must be fresh; the root mode is set before any write.
    pub fn encode_with(&self, encoder: &mut JsonEncoder) -> Result<()> {
        let mask = self.content_mask;
        encoder.set_root_array(mask.root_is_array())?;

        if mask.has_network_message_header() {
            encoder.write_string(Some(MESSAGE_ID_FIELD), &self.message_id)?;
            encoder.write_string(Some(MESSAGE_TYPE_FIELD), DATA_MESSAGE_TYPE)?;
            if mask.contains(NetworkMessageContentMask::PUBLISHER_ID) {
                if let Some(publisher_id) = &self.publisher_id {
                    encoder.write_string(Some(PUBLISHER_ID_FIELD), publisher_id)?;
                }
            }
            if mask.contains(NetworkMessageContentMask::DATA_SET_CLASS_ID) {
                if let Some(class_id) = &self.data_set_class_id {
                    encoder.write_string(Some(DATA_SET_CLASS_ID_FIELD), class_id)?;
                }
            }

            if mask.has_single_data_set_message() {
                if let Some(first) = self.messages.first() {
                    first.encode(encoder, Some(MESSAGES_FIELD))?;
                }
            } else {
                encoder.push_array(Some(MESSAGES_FIELD))?;
                for message in &self.messages {
                    message.encode(encoder, None)?;
                }
                encoder.pop_array()?;
            }

            if mask.contains(NetworkMessageContentMask::REPLY_TO) {
                if let Some(reply_to) = &self.reply_to {
                    encoder.write_string(Some(REPLY_TO_FIELD), reply_to)?;
                }
            }
            return Ok(());
        }

        if mask.has_single_data_set_message() {
            if let Some(first) = self.messages.first() {
                first.encode_payload(encoder, first.has_header())?;
            }
        } else {
            for message in &self.messages {
                message.encode(encoder, None)?;
            }
        }
        Ok(())
    }

    /// Decodes `data` against every reader.
    ///
    /// Never fails: malformed input ends decoding early and is reported as
    /// the outcome's diagnostic, next to whatever was decoded before.
    #[must_use]
    pub fn decode(data: &[u8], readers: &[ReaderConfig]) -> DecodeOutcome {
        let mut outcome = DecodeOutcome::default();
        if readers.is_empty() {
            return outcome;
        }
        if let Err(e) = decode_into(data, readers, &mut outcome) {
            tracing::warn!(
                "dropping malformed network message after {} data set(s): {}",
                outcome.len(),
                e
            );
            outcome.diagnostic = Some(e);
        }
        outcome
    }
}

fn decode_into(
    data: &[u8],
    readers: &[ReaderConfig],
    outcome: &mut DecodeOutcome,
) -> std::result::Result<(), DecodeError> {
    let decoder = JsonDecoder::parse(data)?;
    let root = decoder.root();
    let message = &mut outcome.message;
    let mut observed = NetworkMessageContentMask::NONE;

    let message_type = root
        .read_string(MESSAGE_TYPE_FIELD)?
        .map(|literal| MessageType::from_wire(&literal));
    if let Some(kind) = message_type.filter(|kind| !kind.is_data()) {
        tracing::debug!("ignoring {} network message", kind.as_str());
        return Ok(());
    }

    if let Some(message_id) = root.read_string(MESSAGE_ID_FIELD)? {
        message.message_id = message_id;
        observed = observed | NetworkMessageContentMask::NETWORK_MESSAGE_HEADER;
    }
    if let Some(publisher_id) = root.read_string(PUBLISHER_ID_FIELD)? {
        message.publisher_id = Some(publisher_id);
        observed = observed | NetworkMessageContentMask::PUBLISHER_ID;
    }
    if let Some(class_id) = root.read_string(DATA_SET_CLASS_ID_FIELD)? {
        message.data_set_class_id = Some(class_id);
        observed = observed | NetworkMessageContentMask::DATA_SET_CLASS_ID;
    }
    if let Some(reply_to) = root.read_string(REPLY_TO_FIELD)? {
        message.reply_to = Some(reply_to);
        observed = observed | NetworkMessageContentMask::REPLY_TO;
    }

    let publisher_id = if observed.contains(NetworkMessageContentMask::PUBLISHER_ID) {
        message.publisher_id.as_deref()
    } else {
        None
    };
    let candidates: Vec<(usize, &ReaderConfig)> = readers
        .iter()
        .enumerate()
        .filter(|(_, reader)| reader.publisher_id.matches(publisher_id))
        .collect();
    if candidates.is_empty() {
        tracing::trace!(
            "no reader accepts publisher {}",
            publisher_id.unwrap_or("<none>")
        );
        return Ok(());
    }

    let body = decoder.locate_body();
    if body.is_single() {
        observed = observed | NetworkMessageContentMask::SINGLE_DATA_SET_MESSAGE;
    }
    if body.first_has_header() {
        observed = observed | NetworkMessageContentMask::DATA_SET_MESSAGE_HEADER;
    }
    message.set_content_mask(observed);

    for (index, reader) in candidates {
        if let Some(data_set_message) = decode_for_reader(&body, observed, reader)? {
            outcome.message.push(data_set_message);
            outcome.readers.push(index);
        }
    }
    Ok(())
}

/// Decodes the located body for one reader.
///
/// Returns `None` if the reader's settings are missing or malformed, if the
/// reader expects network mask bits the message did not carry, or if no
/// candidate matched. Pure in its inputs; readers can be evaluated in any
/// order or in parallel.
///
/// # Errors
///
/// Returns an error if the body is malformed.
pub fn decode_for_reader(
    body: &MessageBody<'_>,
    observed: NetworkMessageContentMask,
    reader: &ReaderConfig,
) -> std::result::Result<Option<DataSetMessage>, DecodeError> {
    let Some((network, data_set, field)) = reader
        .message_settings
        .as_ref()
        .and_then(ReaderMessageSettings::masks)
    else {
        tracing::trace!("reader {}: missing or malformed message settings", reader.name);
        return Ok(None);
    };
    if !observed.satisfies(network) {
        tracing::trace!(
            "reader {}: expects {:?}, message carries {:?}",
            reader.name,
            network,
            observed
        );
        return Ok(None);
    }

    let mut message = DataSetMessage::with_masks(data_set, field);
    message.set_has_header(observed.has_data_set_message_header());
    message.decode_possible(body, reader)?;
    Ok((!message.data_set().is_empty()).then_some(message))
}

/// Result of decoding one network message.
#[derive(Debug, Clone, Default)]
pub struct DecodeOutcome {
    message: NetworkMessage,
    readers: Vec<usize>,
    diagnostic: Option<DecodeError>,
}

impl DecodeOutcome {
    /// Returns the decoded header fields, observed mask and DataSetMessages.
    #[must_use]
    pub const fn network_message(&self) -> &NetworkMessage {
        &self.message
    }

    /// Returns the decoded DataSetMessages in reader evaluation order.
    #[must_use]
    pub fn messages(&self) -> &[DataSetMessage] {
        self.message.dataset_messages()
    }

    /// Consumes the outcome, returning the decoded DataSetMessages.
    #[must_use]
    pub fn into_messages(self) -> Vec<DataSetMessage> {
        self.message.into_dataset_messages()
    }

    /// Iterates `(reader index, message)` pairs.
    ///
    /// The index refers to the reader slice passed to
    /// [`NetworkMessage::decode`].
    pub fn matches(&self) -> impl Iterator<Item = (usize, &DataSetMessage)> {
        self.readers.iter().copied().zip(self.messages())
    }

    /// Returns why decoding stopped early, if it did.
    #[must_use]
    pub const fn diagnostic(&self) -> Option<&DecodeError> {
        self.diagnostic.as_ref()
    }

    /// Number of decoded DataSetMessages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.readers.len()
    }

    /// Returns true if nothing was decoded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }
}
