//! Structured JSON encoder.
//!
//! The encoder builds the message tree scope by scope and serializes it once
//! in [`JsonEncoder::finish`]. Field order on the wire is write order.
//!
//! ```text
//! set_root_array(false)
//! write_string("MessageId", ..)         { "MessageId": ..,
//! push_array("Messages")                  "Messages": [
//!   push_structure(None) .. pop             { .. },
//! pop_array()                             ]
//! finish()                              }
//! ```

use bytes::Bytes;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

#[derive(Debug)]
enum Scope {
    Object {
        name: Option<String>,
        fields: Map<String, Value>,
    },
    Array {
        name: Option<String>,
        items: Vec<Value>,
    },
}

/// Scoped, single-use JSON writer.
#[derive(Debug, Default)]
pub struct JsonEncoder {
    root_is_array: bool,
    stack: Vec<Scope>,
}

fn misuse(message: impl Into<String>) -> Error {
    Error::Encoder {
        message: message.into(),
    }
}

impl JsonEncoder {
    /// Creates an encoder whose root is a JSON object.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects whether the root token is an array.
    ///
    /// # Errors
    ///
    /// Returns an error once anything has been written.
    pub fn set_root_array(&mut self, root_is_array: bool) -> Result<()> {
        if !self.stack.is_empty() {
            return Err(misuse("root mode must be set before the first write"));
        }
        self.root_is_array = root_is_array;
        Ok(())
    }

    /// Returns true if the root token is an array.
    #[must_use]
    pub const fn root_is_array(&self) -> bool {
        self.root_is_array
    }

    fn open_root(&mut self) {
        if self.stack.is_empty() {
            let root = if self.root_is_array {
                Scope::Array {
                    name: None,
                    items: Vec::new(),
                }
            } else {
                Scope::Object {
                    name: None,
                    fields: Map::new(),
                }
            };
            self.stack.push(root);
        }
    }

    /// Writes a value into the current scope.
    ///
    /// Object scopes require a field name, array scopes forbid one.
    pub fn write_value(&mut self, name: Option<&str>, value: Value) -> Result<()> {
        self.open_root();
        match (self.stack.last_mut(), name) {
            (Some(Scope::Object { fields, .. }), Some(name)) => {
                if fields.contains_key(name) {
                    return Err(misuse(format!("field {name} written twice")));
                }
                fields.insert(name.to_owned(), value);
                Ok(())
            }
            (Some(Scope::Array { items, .. }), None) => {
                items.push(value);
                Ok(())
            }
            (Some(Scope::Object { .. }), None) => {
                Err(misuse("unnamed value written into a structure"))
            }
            (Some(Scope::Array { .. }), Some(name)) => {
                Err(misuse(format!("named value {name} written into an array")))
            }
            (None, _) => Err(misuse("no open scope")),
        }
    }

    /// Writes a string into the current scope.
    pub fn write_string(&mut self, name: Option<&str>, value: &str) -> Result<()> {
        self.write_value(name, Value::String(value.to_owned()))
    }

    /// Opens a nested structure.
    pub fn push_structure(&mut self, name: Option<&str>) -> Result<()> {
        self.open_root();
        self.stack.push(Scope::Object {
            name: name.map(str::to_owned),
            fields: Map::new(),
        });
        Ok(())
    }

    /// Closes the structure opened by [`Self::push_structure`].
    pub fn pop_structure(&mut self) -> Result<()> {
        if self.stack.len() < 2 {
            return Err(misuse("pop_structure without matching push"));
        }
        match self.stack.pop() {
            Some(Scope::Object { name, fields }) => {
                self.write_value(name.as_deref(), Value::Object(fields))
            }
            Some(scope) => {
                self.stack.push(scope);
                Err(misuse("pop_structure while an array is open"))
            }
            None => Err(misuse("no open scope")),
        }
    }

    /// Opens a nested array.
    pub fn push_array(&mut self, name: Option<&str>) -> Result<()> {
        self.open_root();
        self.stack.push(Scope::Array {
            name: name.map(str::to_owned),
            items: Vec::new(),
        });
        Ok(())
    }

    /// Closes the array opened by [`Self::push_array`].
    pub fn pop_array(&mut self) -> Result<()> {
        if self.stack.len() < 2 {
            return Err(misuse("pop_array without matching push"));
        }
        match self.stack.pop() {
            Some(Scope::Array { name, items }) => {
                self.write_value(name.as_deref(), Value::Array(items))
            }
            Some(scope) => {
                self.stack.push(scope);
                Err(misuse("pop_array while a structure is open"))
            }
            None => Err(misuse("no open scope")),
        }
    }

    /// Finalizes the document and returns its text.
    ///
    /// # Errors
    ///
    /// Returns an error if a nested scope is still open.
    pub fn finish(mut self) -> Result<Bytes> {
        self.open_root();
        if self.stack.len() != 1 {
            return Err(misuse(format!(
                "{} nested scope(s) left open",
                self.stack.len() - 1
            )));
        }
        let root = match self.stack.pop() {
            Some(Scope::Object { fields, .. }) => Value::Object(fields),
            Some(Scope::Array { items, .. }) => Value::Array(items),
            None => return Err(misuse("no open scope")),
        };
        Ok(Bytes::from(serde_json::to_vec(&root)?))
    }
}
