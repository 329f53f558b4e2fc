use serde_json::{Map, Value};

use crate::clock::Timestamp;
use crate::error::{CodecError, CodecResult};
use crate::version::{read_timestamp, Record};

/// Wire keys of the envelope mapping.
pub mod keys {
    /// Write timestamp of the payload.
    pub const WRITTEN: &str = "@";
    /// Transmit timestamp, stamped at the first hop.
    pub const TRANSMITTED: &str = "?";
    /// Subject path.
    pub const SUBJECT: &str = "#";
    /// Reference target path.
    pub const REFERENCE: &str = ">";
    /// Request for the current data at a path.
    pub const REQUEST: &str = "<";
    /// Scalar value, or serialized record in storage replies.
    pub const VALUE: &str = "=";
    /// Storage adapter response correlation key.
    pub const STORAGE: &str = "_";
    /// Object-shaped response: field to version list.
    pub const OBJECTS: &str = "><";
    /// Redirect hint: also subscribe to this path.
    pub const REDIRECT: &str = "<>";
}

/// What an envelope carries.
#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    /// `{@, #, =}`: a scalar written at (or reported for) `path`.
    Scalar {
        path: String,
        timestamp: Timestamp,
        value: Value,
    },
    /// `{@, #, >}`: `path` is an edge pointing at `target`.
    Reference {
        path: String,
        timestamp: Timestamp,
        target: String,
    },
    /// `{#, ><}`: current versions of every field of the object at `path`.
    ObjectResponse { path: String, fields: Record },
    /// `{#, <>}`: listeners on `path` should also listen on `target`.
    Redirect { path: String, target: String },
    /// `{<}`: request for the current data at `path`.
    RequestOnly { path: String },
    /// `{_, =}`: local storage answered for `key`; `record` is the stored text.
    StorageReply { key: String, record: Option<String> },
}

/// The uniform message flowing through the `in` and `out` stages.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    /// Transmit timestamp (`?`), set at the first hop if absent.
    pub transmitted: Option<Timestamp>,
    pub body: Body,
}

impl Envelope {
    pub fn new(body: Body) -> Self {
        Self {
            transmitted: None,
            body,
        }
    }

    pub fn scalar(path: impl Into<String>, timestamp: Timestamp, value: Value) -> Self {
        Self::new(Body::Scalar {
            path: path.into(),
            timestamp,
            value,
        })
    }

    pub fn reference(
        path: impl Into<String>,
        timestamp: Timestamp,
        target: impl Into<String>,
    ) -> Self {
        Self::new(Body::Reference {
            path: path.into(),
            timestamp,
            target: target.into(),
        })
    }

    pub fn request(path: impl Into<String>) -> Self {
        Self::new(Body::RequestOnly { path: path.into() })
    }

    pub fn storage_reply(key: impl Into<String>, record: Option<String>) -> Self {
        Self::new(Body::StorageReply {
            key: key.into(),
            record,
        })
    }

    /// The subject path (`#`) for envelopes addressed to a location.
    pub fn subject(&self) -> Option<&str> {
        match &self.body {
            Body::Scalar { path, .. }
            | Body::Reference { path, .. }
            | Body::ObjectResponse { path, .. }
            | Body::Redirect { path, .. } => Some(path),
            Body::RequestOnly { .. } | Body::StorageReply { .. } => None,
        }
    }

    /// Returns `true` for local storage adapter responses (`_` present).
    pub fn is_storage_reply(&self) -> bool {
        matches!(self.body, Body::StorageReply { .. })
    }

    /// Encode to the wire mapping.
    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        if let Some(ts) = self.transmitted {
            obj.insert(keys::TRANSMITTED.into(), Value::from(ts));
        }
        match &self.body {
            Body::Scalar {
                path,
                timestamp,
                value,
            } => {
                obj.insert(keys::WRITTEN.into(), Value::from(*timestamp));
                obj.insert(keys::SUBJECT.into(), Value::from(path.as_str()));
                obj.insert(keys::VALUE.into(), value.clone());
            }
            Body::Reference {
                path,
                timestamp,
                target,
            } => {
                obj.insert(keys::WRITTEN.into(), Value::from(*timestamp));
                obj.insert(keys::SUBJECT.into(), Value::from(path.as_str()));
                obj.insert(keys::REFERENCE.into(), Value::from(target.as_str()));
            }
            Body::ObjectResponse { path, fields } => {
                obj.insert(keys::SUBJECT.into(), Value::from(path.as_str()));
                // Version lists always serialize; a failure here is unreachable.
                obj.insert(
                    keys::OBJECTS.into(),
                    serde_json::to_value(fields).unwrap_or(Value::Null),
                );
            }
            Body::Redirect { path, target } => {
                obj.insert(keys::SUBJECT.into(), Value::from(path.as_str()));
                obj.insert(keys::REDIRECT.into(), Value::from(target.as_str()));
            }
            Body::RequestOnly { path } => {
                obj.insert(keys::REQUEST.into(), Value::from(path.as_str()));
            }
            Body::StorageReply { key, record } => {
                obj.insert(keys::STORAGE.into(), Value::from(key.as_str()));
                if let Some(record) = record {
                    obj.insert(keys::VALUE.into(), Value::from(record.as_str()));
                }
            }
        }
        Value::Object(obj)
    }

    /// Encode to JSON text.
    pub fn to_text(&self) -> String {
        self.to_value().to_string()
    }

    /// Decode JSON text. Array-valued paths are joined with `separator`.
    pub fn from_text(text: &str, separator: &str) -> CodecResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(&value, separator)
    }

    /// Decode UTF-8 JSON bytes.
    pub fn from_bytes(bytes: &[u8], separator: &str) -> CodecResult<Self> {
        Self::from_text(std::str::from_utf8(bytes)?, separator)
    }

    /// Decode a parsed wire mapping.
    pub fn from_value(value: &Value, separator: &str) -> CodecResult<Self> {
        let obj = match value {
            Value::Object(obj) => obj,
            Value::Array(_) => return Err(CodecError::NotAnObject("array")),
            Value::String(_) => return Err(CodecError::NotAnObject("string")),
            Value::Null => return Err(CodecError::NotAnObject("null")),
            _ => return Err(CodecError::NotAnObject("scalar")),
        };
        let transmitted = obj.get(keys::TRANSMITTED).and_then(read_timestamp);
        let path_at = |key: &str| obj.get(key).map(|v| read_path(v, separator)).transpose();

        let body = if let Some(key) = path_at(keys::STORAGE)? {
            let record = match obj.get(keys::VALUE) {
                None | Some(Value::Null) => None,
                Some(Value::String(text)) => Some(text.clone()),
                Some(other) => Some(other.to_string()),
            };
            Body::StorageReply { key, record }
        } else if let Some(path) = path_at(keys::REQUEST)? {
            Body::RequestOnly { path }
        } else if let Some(path) = path_at(keys::SUBJECT)? {
            if let Some(target) = path_at(keys::REDIRECT)? {
                Body::Redirect { path, target }
            } else if let Some(fields) = obj.get(keys::OBJECTS) {
                Body::ObjectResponse {
                    path,
                    fields: serde_json::from_value(fields.clone())?,
                }
            } else if let Some(value) = obj.get(keys::VALUE) {
                Body::Scalar {
                    path,
                    timestamp: written(obj)?,
                    value: value.clone(),
                }
            } else if let Some(target) = path_at(keys::REFERENCE)? {
                Body::Reference {
                    path,
                    timestamp: written(obj)?,
                    target,
                }
            } else {
                return Err(unknown_shape(obj));
            }
        } else {
            return Err(unknown_shape(obj));
        };
        Ok(Self { transmitted, body })
    }
}

fn written(obj: &Map<String, Value>) -> CodecResult<Timestamp> {
    obj.get(keys::WRITTEN)
        .and_then(read_timestamp)
        .ok_or(CodecError::MissingTimestamp)
}

fn unknown_shape(obj: &Map<String, Value>) -> CodecError {
    CodecError::UnknownShape(obj.keys().cloned().collect())
}

/// Paths travel either joined or as a segment list.
fn read_path(value: &Value, separator: &str) -> CodecResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                Value::Number(n) => Ok(n.to_string()),
                other => Err(CodecError::InvalidPath(other.to_string())),
            })
            .collect::<CodecResult<Vec<_>>>()
            .map(|segments| segments.join(separator)),
        other => Err(CodecError::InvalidPath(other.to_string())),
    }
}
