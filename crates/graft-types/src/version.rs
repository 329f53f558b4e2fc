use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::clock::Timestamp;
use crate::envelope::keys;
use crate::error::{CodecError, CodecResult};

/// What a version holds: a scalar value or a reference to another path.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// A scalar (string, number, boolean) or `null`.
    Value(Value),
    /// A separator-joined path this field points at.
    Ref(String),
}

/// One entry in a field's history.
///
/// Wire form is `{"@": timestamp, "=": value}` or `{"@": timestamp, ">": path}`;
/// exactly one of `=`/`>` is present.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Version {
    pub timestamp: Timestamp,
    pub payload: Payload,
}

impl Version {
    pub fn value(timestamp: Timestamp, value: Value) -> Self {
        Self {
            timestamp,
            payload: Payload::Value(value),
        }
    }

    pub fn reference(timestamp: Timestamp, target: impl Into<String>) -> Self {
        Self {
            timestamp,
            payload: Payload::Ref(target.into()),
        }
    }

    /// Returns `true` if this version is not yet current at `now`.
    pub fn is_pending(&self, now: Timestamp) -> bool {
        self.timestamp > now
    }

    /// The reference target, if this version is a reference.
    pub fn target(&self) -> Option<&str> {
        match &self.payload {
            Payload::Ref(target) => Some(target),
            Payload::Value(_) => None,
        }
    }

    pub fn is_ref(&self) -> bool {
        matches!(self.payload, Payload::Ref(_))
    }
}

/// Read a wire timestamp: a non-negative integer, or a string holding one.
pub(crate) fn read_timestamp(value: &Value) -> Option<Timestamp> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl TryFrom<Value> for Version {
    type Error = CodecError;

    fn try_from(value: Value) -> CodecResult<Self> {
        let Value::Object(mut obj) = value else {
            return Err(CodecError::InvalidVersion("not an object".into()));
        };
        let timestamp = obj
            .get(keys::WRITTEN)
            .and_then(read_timestamp)
            .ok_or(CodecError::MissingTimestamp)?;
        if let Some(target) = obj.remove(keys::REFERENCE) {
            return match target {
                Value::String(target) => Ok(Self::reference(timestamp, target)),
                other => Err(CodecError::InvalidVersion(format!(
                    "reference must be a string, got {other}"
                ))),
            };
        }
        match obj.remove(keys::VALUE) {
            Some(value) => Ok(Self::value(timestamp, value)),
            None => Err(CodecError::InvalidVersion(
                "neither '=' nor '>' present".into(),
            )),
        }
    }
}

impl From<Version> for Value {
    fn from(version: Version) -> Self {
        let mut obj = Map::new();
        obj.insert(keys::WRITTEN.into(), Value::from(version.timestamp));
        match version.payload {
            Payload::Value(value) => obj.insert(keys::VALUE.into(), value),
            Payload::Ref(target) => obj.insert(keys::REFERENCE.into(), Value::String(target)),
        };
        Value::Object(obj)
    }
}

/// The stored unit: each field maps to its ordered version history.
///
/// Records are keyed in storage by the serialized path of the node they
/// describe. History is append-only; the visible value of a field is chosen
/// by current-version selection, not by position.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, Vec<Version>>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// A record holding exactly one version for one field.
    pub fn single(field: impl Into<String>, version: Version) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(field.into(), vec![version]);
        Self { fields }
    }

    /// Versions recorded for `field`, oldest append first.
    pub fn versions(&self, field: &str) -> &[Version] {
        self.fields.get(field).map_or(&[], Vec::as_slice)
    }

    /// Mutable history for `field`, created empty if missing.
    pub fn history_mut(&mut self, field: &str) -> &mut Vec<Version> {
        self.fields.entry(field.to_owned()).or_default()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &[Version])> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Decode from the stored JSON text.
    pub fn from_json(text: &str) -> CodecResult<Self> {
        match serde_json::from_str::<Value>(text)? {
            // Deleted-then-recreated records may have been stored as `null`.
            Value::Null => Ok(Self::new()),
            other => Ok(serde_json::from_value(other)?),
        }
    }

    /// Encode to the stored JSON text.
    pub fn to_json(&self) -> CodecResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl FromIterator<(String, Vec<Version>)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Vec<Version>)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Record {
    type Item = (String, Vec<Version>);
    type IntoIter = std::collections::btree_map::IntoIter<String, Vec<Version>>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}
