//! Structured JSON decoder.
//!
//! A received message is parsed once into a [`serde_json::Value`] tree. All
//! reads go through borrowed [`Scope`]s over that tree, so any number of
//! reader attempts can inspect the same body without shared cursor state.
//!
//! The message body is located in this order:
//! ```text
//! { .., "Messages": [ {..}, {..} ] }   -> Array  (BodyName::Messages)
//! { .., "Messages": {..} }             -> Single
//! [ {..}, {..} ]                       -> Array  (BodyName::BareRootArray)
//! { <anything else> }                  -> Raw    (the root is one data set)
//! ```

use serde_json::Value;

use crate::error::DecodeError;
use crate::types::variant::{BODY_FIELD, TYPE_FIELD};

/// Field holding the DataSetMessages of a network message.
pub const MESSAGES_FIELD: &str = "Messages";

/// Returns the JSON kind of a value for diagnostics.
#[must_use]
pub const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Parsed JSON message.
#[derive(Debug, Clone)]
pub struct JsonDecoder {
    root: Value,
}

impl JsonDecoder {
    /// Parses a message from its text.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::InvalidJson`] if the bytes are not JSON.
    pub fn parse(data: &[u8]) -> Result<Self, DecodeError> {
        let root = serde_json::from_slice(data)
            .map_err(|e| DecodeError::InvalidJson(e.to_string()))?;
        Ok(Self { root })
    }

    /// Returns the root scope.
    #[must_use]
    pub const fn root(&self) -> Scope<'_> {
        Scope { value: &self.root }
    }

    /// Locates the DataSetMessage body of the message.
    #[must_use]
    pub fn locate_body(&self) -> MessageBody<'_> {
        let root = self.root();
        match root.read_field(MESSAGES_FIELD) {
            Some(Value::Array(items)) => {
                return MessageBody::Array {
                    name: BodyName::Messages,
                    items,
                };
            }
            Some(value @ Value::Object(_)) => return MessageBody::Single(Scope { value }),
            Some(
                Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_),
            )
            | None => {}
        }
        match &self.root {
            Value::Array(items) => MessageBody::Array {
                name: BodyName::BareRootArray,
                items,
            },
            Value::Null
            | Value::Bool(_)
            | Value::Number(_)
            | Value::String(_)
            | Value::Object(_) => MessageBody::Raw(root),
        }
    }
}

/// Borrowed view of one JSON value.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    value: &'a Value,
}

impl<'a> Scope<'a> {
    /// Wraps a value.
    #[must_use]
    pub const fn new(value: &'a Value) -> Self {
        Self { value }
    }

    /// Returns the underlying value.
    #[must_use]
    pub const fn value(&self) -> &'a Value {
        self.value
    }

    /// Returns true if this scope is a JSON object.
    #[must_use]
    pub const fn is_structure(&self) -> bool {
        matches!(self.value, Value::Object(_))
    }

    /// Returns true if this scope is a reversible `{"Type", "Body"}` variant.
    #[must_use]
    pub fn is_variant(&self) -> bool {
        match self.value {
            Value::Object(fields) => {
                fields.get(TYPE_FIELD).is_some_and(Value::is_u64)
                    && fields.keys().all(|key| key == TYPE_FIELD || key == BODY_FIELD)
            }
            _ => false,
        }
    }

    /// Reads a named field; `None` if absent or this is not an object.
    #[must_use]
    pub fn read_field(&self, name: &str) -> Option<&'a Value> {
        match self.value {
            Value::Object(fields) => fields.get(name),
            _ => None,
        }
    }

    /// Reads a named field as a string.
    ///
    /// Numbers are accepted and rendered in decimal, since identifiers such
    /// as publisher ids may be sent as either.
    pub fn read_string(&self, name: &str) -> Result<Option<String>, DecodeError> {
        match self.read_field(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_)) => {
                Err(DecodeError::shape(name, "string"))
            }
        }
    }

    /// Reads a named unsigned integer.
    pub fn read_u64(&self, name: &str) -> Result<Option<u64>, DecodeError> {
        match self.read_field(name) {
            None => Ok(None),
            Some(value) => value
                .as_u64()
                .map(Some)
                .ok_or_else(|| DecodeError::shape(name, "unsigned integer")),
        }
    }

    /// Re-scopes into a named nested structure.
    #[must_use]
    pub fn structure(&self, name: &str) -> Option<Self> {
        match self.read_field(name) {
            Some(value @ Value::Object(_)) => Some(Self { value }),
            _ => None,
        }
    }

    /// Reads a named array.
    #[must_use]
    pub fn array(&self, name: &str) -> Option<&'a [Value]> {
        match self.read_field(name) {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        }
    }
}

/// Where the candidate DataSetMessages of a body live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyName {
    /// The `"Messages"` field.
    Messages,
    /// The root itself is the array; no wrapping field exists.
    BareRootArray,
}

impl BodyName {
    /// Returns the wire field name, if any.
    #[must_use]
    pub const fn field_name(self) -> Option<&'static str> {
        match self {
            Self::Messages => Some(MESSAGES_FIELD),
            Self::BareRootArray => None,
        }
    }
}

/// Located DataSetMessage body of a parsed network message.
#[derive(Debug, Clone, Copy)]
pub enum MessageBody<'a> {
    /// Several candidate messages.
    Array {
        /// Where the array was found.
        name: BodyName,
        /// Candidate messages in wire order.
        items: &'a [Value],
    },
    /// `"Messages"` holds one structure.
    Single(Scope<'a>),
    /// The whole payload is one data set's content.
    Raw(Scope<'a>),
}

impl<'a> MessageBody<'a> {
    /// Number of candidate messages.
    #[must_use]
    pub const fn count(&self) -> usize {
        match self {
            Self::Array { items, .. } => items.len(),
            Self::Single(_) | Self::Raw(_) => 1,
        }
    }

    /// Field the body was read from; `None` for the raw root.
    #[must_use]
    pub const fn name(&self) -> Option<BodyName> {
        match self {
            Self::Array { name, .. } => Some(*name),
            Self::Single(_) => Some(BodyName::Messages),
            Self::Raw(_) => None,
        }
    }

    /// Returns true if the body holds exactly one message by shape.
    #[must_use]
    pub const fn is_single(&self) -> bool {
        matches!(self, Self::Single(_) | Self::Raw(_))
    }

    /// Returns the candidate at `index`.
    #[must_use]
    pub fn element(&self, index: usize) -> Option<Scope<'a>> {
        match self {
            Self::Array { items, .. } => items.get(index).map(Scope::new),
            Self::Single(scope) | Self::Raw(scope) => (index == 0).then_some(*scope),
        }
    }

    /// Returns true if the first candidate carries a DataSetMessage header.
    ///
    /// A header is recognized by a `"Payload"` structure. A headerless data
    /// set with a field named `Payload` in the reversible `{"Type", "Body"}`
    /// encoding is not mistaken for one; under the raw or data value field
    /// encodings such a field remains ambiguous and is read as a header.
    #[must_use]
    pub fn first_has_header(&self) -> bool {
        self.element(0)
            .and_then(|scope| scope.structure(crate::message::PAYLOAD_FIELD))
            .is_some_and(|payload| !payload.is_variant())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> JsonDecoder {
        JsonDecoder::parse(text.as_bytes()).unwrap()
    }

    #[test]
    fn test_parse_invalid() {
        let err = JsonDecoder::parse(b"{\"MessageId\":").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidJson(_)));
    }

    #[test]
    fn test_locate_messages_array() {
        let decoder = parse(r#"{"MessageId":"1","Messages":[{"a":1},{"a":2}]}"#);
        let body = decoder.locate_body();
        assert_eq!(body.count(), 2);
        assert_eq!(body.name(), Some(BodyName::Messages));
        assert!(!body.is_single());
        assert_eq!(body.element(1).unwrap().read_u64("a").unwrap(), Some(2));
        assert!(body.element(2).is_none());
    }

    #[test]
    fn test_locate_messages_object() {
        let decoder = parse(r#"{"MessageId":"1","Messages":{"a":1}}"#);
        let body = decoder.locate_body();
        assert!(matches!(body, MessageBody::Single(_)));
        assert_eq!(body.count(), 1);
    }

    #[test]
    fn test_locate_bare_array() {
        let decoder = parse(r#"[{"a":1}]"#);
        let body = decoder.locate_body();
        assert_eq!(body.name(), Some(BodyName::BareRootArray));
        assert_eq!(BodyName::BareRootArray.field_name(), None);
    }

    #[test]
    fn test_locate_raw() {
        let decoder = parse(r#"{"Temperature":{"Type":11,"Body":20.5}}"#);
        let body = decoder.locate_body();
        assert!(matches!(body, MessageBody::Raw(_)));
        assert_eq!(body.name(), None);
        assert!(body.element(1).is_none());

        // A non-container "Messages" value falls through to raw.
        let decoder = parse(r#"{"Messages":"nope"}"#);
        assert!(matches!(decoder.locate_body(), MessageBody::Raw(_)));
    }

    #[test]
    fn test_read_string() {
        let decoder = parse(r#"{"a":"x","b":42,"c":true}"#);
        let root = decoder.root();
        assert_eq!(root.read_string("a").unwrap(), Some("x".into()));
        assert_eq!(root.read_string("b").unwrap(), Some("42".into()));
        assert_eq!(root.read_string("missing").unwrap(), None);
        assert!(root.read_string("c").is_err());
    }

    #[test]
    fn test_first_has_header() {
        let decoder = parse(r#"[{"DataSetWriterId":1,"Payload":{}}]"#);
        assert!(decoder.locate_body().first_has_header());

        let decoder = parse(r#"[{"Payload":1}]"#);
        assert!(!decoder.locate_body().first_has_header());

        // A headerless field named "Payload" holding a variant.
        let decoder = parse(r#"{"Payload":{"Type":11,"Body":3.0}}"#);
        assert!(!decoder.locate_body().first_has_header());

        let decoder = parse(r#"[{"Payload":{"Type":{"Type":11,"Body":1.0}}}]"#);
        assert!(decoder.locate_body().first_has_header());
    }
}
