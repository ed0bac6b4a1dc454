//! Match identifiers and state snapshots
//!
//! A [`StateSnapshot`] is always the complete state of one match, never a
//! delta. Its content is opaque beyond being a JSON object; the only thing
//! this crate cares about is whether two snapshots carry the same content,
//! which is decided by a canonical-serialization [`Fingerprint`].

mod resolve;

pub use resolve::{match_id_from_query, resolve_match_id, DEFAULT_MATCH_ID};

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::SnapshotError;

/// Identifier of a match, and therefore of a relay room
///
/// Equality is exact string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(String);

impl MatchId {
    /// Create a match identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MatchId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for MatchId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Content fingerprint of a snapshot
///
/// The canonical JSON serialization of the payload. Object keys are written
/// in sorted order at every depth, whatever order the map keeps them in, so
/// payloads built independently with the same content produce the same
/// fingerprint regardless of insertion order.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(Bytes);

impl Fingerprint {
    /// Canonical bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({} bytes)", self.0.len())
    }
}

/// Full point-in-time state of a match
///
/// Cheap to clone: the payload and its fingerprint are reference counted.
#[derive(Clone)]
pub struct StateSnapshot {
    value: Arc<Value>,
    fingerprint: Fingerprint,
}

impl StateSnapshot {
    /// Build a snapshot from a JSON value
    ///
    /// Anything other than a JSON object is rejected.
    pub fn from_value(value: Value) -> Result<Self, SnapshotError> {
        if !value.is_object() {
            return Err(SnapshotError::NotAnObject(json_kind(&value)));
        }

        let mut canonical = Vec::new();
        write_canonical(&value, &mut canonical)?;

        Ok(Self {
            value: Arc::new(value),
            fingerprint: Fingerprint(Bytes::from(canonical)),
        })
    }

    /// Parse a snapshot from raw JSON bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    /// The payload
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Look up a top-level field of the payload
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.value.get(key)
    }

    /// Content fingerprint used for duplicate suppression
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Whether two snapshots carry the same content
    pub fn same_content(&self, other: &StateSnapshot) -> bool {
        self.fingerprint == other.fingerprint
    }
}

impl PartialEq for StateSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.same_content(other)
    }
}

impl Eq for StateSnapshot {}

impl fmt::Debug for StateSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StateSnapshot").field(&self.value).finish()
    }
}

impl TryFrom<Value> for StateSnapshot {
    type Error = SnapshotError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

impl Serialize for StateSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StateSnapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}

/// Serialize `value` with object keys sorted at every level
fn write_canonical(value: &Value, out: &mut Vec<u8>) -> Result<(), serde_json::Error> {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));

            out.push(b'{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                serde_json::to_writer(&mut *out, key)?;
                out.push(b':');
                write_canonical(item, out)?;
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out)?;
            }
            out.push(b']');
        }
        scalar => serde_json::to_writer(&mut *out, scalar)?,
    }
    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
