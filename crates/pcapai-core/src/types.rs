use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::raw::{parse_int, RawLayer};

// =============================================================================
// Field values
// =============================================================================

/// A promoted field value.
///
/// Serialized untagged so records render as plain JSON when handed to the
/// model and round-trip unchanged through the session snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            FieldValue::Str(s) => parse_int(s),
            _ => None,
        }
    }

    /// Typed equality against a textual parameter.
    ///
    /// Integers compare numerically (decimal or hex input), strings compare
    /// ASCII case-insensitively, booleans accept `true/false/1/0`, and lists
    /// match when any element matches.
    pub fn matches_text(&self, text: &str) -> bool {
        let text = text.trim();
        match self {
            FieldValue::Int(v) => parse_int(text) == Some(*v),
            FieldValue::Str(s) => s.trim().eq_ignore_ascii_case(text),
            FieldValue::Bool(b) => match text.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "set" => *b,
                "false" | "0" | "no" | "unset" => !*b,
                _ => false,
            },
            FieldValue::List(items) => items.iter().any(|v| v.matches_text(text)),
            FieldValue::Map(_) => false,
        }
    }

    /// Case-insensitive substring test against the rendered value.
    pub fn contains_text(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.to_string().to_lowercase().contains(&needle)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Str(s) => f.write_str(s),
            FieldValue::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            FieldValue::Map(map) => {
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", k, v)?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Str(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

/// Fields promoted for a single protocol, keyed by field name.
pub type FieldMap = BTreeMap<String, FieldValue>;

// =============================================================================
// Fields
// =============================================================================

/// Promoted fields of a record, keyed by `(protocol, field_name)`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fields(BTreeMap<String, FieldMap>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value unless the key is already set.
    ///
    /// Returns `true` when the value was written. The first writer for a key
    /// wins; later writers are ignored.
    pub fn insert_if_absent(
        &mut self,
        protocol: &str,
        field: &str,
        value: FieldValue,
    ) -> bool {
        let per_protocol = self.0.entry(protocol.to_ascii_lowercase()).or_default();
        if per_protocol.contains_key(field) {
            return false;
        }
        per_protocol.insert(field.to_string(), value);
        true
    }

    pub fn get(&self, protocol: &str, field: &str) -> Option<&FieldValue> {
        self.0.get(protocol).and_then(|m| m.get(field))
    }

    /// All fields promoted for one protocol.
    pub fn protocol(&self, protocol: &str) -> Option<&FieldMap> {
        self.0.get(protocol)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldMap)> {
        self.0.iter()
    }

    /// Total number of promoted `(protocol, field)` entries.
    pub fn len(&self) -> usize {
        self.0.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// PacketRecord
// =============================================================================

/// Canonical typed representation of one packet.
///
/// Immutable once constructed: every member is private and exposed through
/// accessors only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PacketRecord {
    index: u64,
    timestamp: DateTime<Utc>,
    protocols: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    frame_length: Option<u64>,
    fields: Fields,
    raw_layers: Vec<RawLayer>,
}

impl PacketRecord {
    pub fn new(
        index: u64,
        timestamp: DateTime<Utc>,
        protocols: Vec<String>,
        frame_length: Option<u64>,
        fields: Fields,
        raw_layers: Vec<RawLayer>,
    ) -> Self {
        Self {
            index,
            timestamp,
            protocols,
            frame_length,
            fields,
            raw_layers,
        }
    }

    /// 1-based frame number, matching capture-tool numbering.
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Protocol layer names, outermost first.
    pub fn protocols(&self) -> &[String] {
        &self.protocols
    }

    /// Length of the frame on the wire, in bytes.
    pub fn frame_length(&self) -> Option<u64> {
        self.frame_length
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn raw_layers(&self) -> &[RawLayer] {
        &self.raw_layers
    }

    /// The innermost protocol layer.
    pub fn highest_protocol(&self) -> Option<&str> {
        self.protocols.last().map(String::as_str)
    }

    pub fn has_protocol(&self, name: &str) -> bool {
        self.protocols.iter().any(|p| p.eq_ignore_ascii_case(name))
    }

    pub fn field(&self, protocol: &str, field: &str) -> Option<&FieldValue> {
        self.fields.get(protocol, field)
    }
}

// =============================================================================
// Capture identity
// =============================================================================

/// Identity of a capture file: where it lives and what it contains.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureIdentity {
    pub path: PathBuf,
    /// Hex-encoded SHA-256 of the file contents.
    pub fingerprint: String,
    pub size_bytes: u64,
}
