use serde_json::{Map, Number, Value};

use crate::error::FieldError;

/// Read-only view over one JSON object of the native video document.
///
/// Every accessor is fallible: a key that is absent or `null` yields
/// `FieldError::MissingField`, a value of the wrong JSON type yields
/// `FieldError::TypeMismatch`. Optional fields are read by discarding the
/// error.
#[derive(Debug, Clone, Copy)]
pub struct Document<'a> {
    fields: &'a Map<String, Value>,
}

impl<'a> Document<'a> {
    pub fn new(fields: &'a Map<String, Value>) -> Self {
        Document { fields }
    }

    /// Views a list element as a document, if it is a JSON object.
    pub fn from_value(value: &'a Value) -> Option<Self> {
        value.as_object().map(Document::new)
    }

    fn get(&self, key: &str) -> Result<&'a Value, FieldError> {
        match self.fields.get(key) {
            None | Some(Value::Null) => Err(FieldError::MissingField(key.to_owned())),
            Some(value) => Ok(value),
        }
    }

    fn mismatch(key: &str, expected: &'static str) -> FieldError {
        FieldError::TypeMismatch {
            key: key.to_owned(),
            expected,
        }
    }

    pub fn get_string(&self, key: &str) -> Result<&'a str, FieldError> {
        self.get(key)?
            .as_str()
            .ok_or_else(|| Self::mismatch(key, "string"))
    }

    /// The number as written in the document, integer or float.
    pub fn get_number(&self, key: &str) -> Result<&'a Number, FieldError> {
        match self.get(key)? {
            Value::Number(number) => Ok(number),
            _ => Err(Self::mismatch(key, "number")),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, FieldError> {
        self.get(key)?
            .as_bool()
            .ok_or_else(|| Self::mismatch(key, "boolean"))
    }

    pub fn get_document(&self, key: &str) -> Result<Document<'a>, FieldError> {
        Document::from_value(self.get(key)?).ok_or_else(|| Self::mismatch(key, "document"))
    }

    pub fn get_list(&self, key: &str) -> Result<&'a [Value], FieldError> {
        self.get(key)?
            .as_array()
            .map(Vec::as_slice)
            .ok_or_else(|| Self::mismatch(key, "list"))
    }

    /// Reads the first key of `keys` holding a non-empty string, in priority
    /// order.
    pub fn first_string(&self, keys: &[&str]) -> Result<&'a str, FieldError> {
        keys.iter()
            .find_map(|key| self.get_string(key).ok().filter(|value| !value.is_empty()))
            .ok_or_else(|| FieldError::NoCandidate(keys.iter().map(|k| k.to_string()).collect()))
    }
}
