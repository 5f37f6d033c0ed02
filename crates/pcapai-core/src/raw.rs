//! Raw parser output.
//!
//! The external capture parser yields one [`RawEvent`] per wire packet. Each
//! event is an ordered list of [`RawLayer`]s, outermost first, and each layer
//! is a flat dictionary from the dissector's field name (e.g. `tcp.srcport`)
//! to a JSON scalar or a list of scalars for repeated fields.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name of the pseudo-layer carrying per-frame metadata.
pub const FRAME_LAYER: &str = "frame";

/// One protocol layer of a raw event.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawLayer {
    /// Lower-case layer name as reported by the parser (e.g. `ip`, `nfs`).
    pub name: String,
    /// Flattened field dictionary.
    pub fields: BTreeMap<String, Value>,
}

impl RawLayer {
    /// Create an empty layer.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field insertion.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Look up a field by its full key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Look up a field and render the first scalar as a string.
    ///
    /// Repeated fields (JSON arrays) yield their first element.
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.fields.get(key).and_then(first_scalar_string)
    }

    /// Look up a field and parse it as an integer.
    ///
    /// Accepts decimal and `0x`-prefixed hexadecimal strings.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get_str(key).and_then(|s| parse_int(&s))
    }
}

/// One packet as produced by the external parser.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub layers: Vec<RawLayer>,
}

impl RawEvent {
    pub fn new(layers: Vec<RawLayer>) -> Self {
        Self { layers }
    }

    /// Find a layer by name.
    pub fn layer(&self, name: &str) -> Option<&RawLayer> {
        self.layers.iter().find(|l| l.name == name)
    }

    /// The frame metadata layer, if the parser emitted one.
    pub fn frame(&self) -> Option<&RawLayer> {
        self.layer(FRAME_LAYER)
    }

    /// Protocol layers in wire order, excluding the frame metadata layer.
    pub fn protocol_layers(&self) -> impl Iterator<Item = &RawLayer> {
        self.layers.iter().filter(|l| l.name != FRAME_LAYER)
    }
}

/// Render the first scalar of a JSON value as a string.
pub fn first_scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => items.iter().find_map(first_scalar_string),
        Value::Null | Value::Object(_) => None,
    }
}

/// Parse a decimal or `0x` hexadecimal integer.
pub fn parse_int(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        return i64::from_str_radix(hex, 16).ok();
    }
    trimmed.parse::<i64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_layer_name_lowercased() {
        assert_eq!(RawLayer::new("NFS").name, "nfs");
    }

    #[test]
    fn test_get_str_scalar_and_list() {
        let layer = RawLayer::new("tcp")
            .with_field("tcp.srcport", "443")
            .with_field("tcp.options", json!(["mss", "sack"]))
            .with_field("tcp.len", 12);
        assert_eq!(layer.get_str("tcp.srcport").as_deref(), Some("443"));
        assert_eq!(layer.get_str("tcp.options").as_deref(), Some("mss"));
        assert_eq!(layer.get_str("tcp.len").as_deref(), Some("12"));
        assert!(layer.get_str("tcp.missing").is_none());
    }

    #[test]
    fn test_get_i64_hex_and_decimal() {
        let layer = RawLayer::new("tcp")
            .with_field("tcp.flags", "0x0012")
            .with_field("tcp.seq", "1001")
            .with_field("tcp.bad", "abc");
        assert_eq!(layer.get_i64("tcp.flags"), Some(0x12));
        assert_eq!(layer.get_i64("tcp.seq"), Some(1001));
        assert_eq!(layer.get_i64("tcp.bad"), None);
    }

    #[test]
    fn test_protocol_layers_skip_frame() {
        let event = RawEvent::new(vec![
            RawLayer::new("frame").with_field("frame.number", "1"),
            RawLayer::new("eth"),
            RawLayer::new("ip"),
        ]);
        let names: Vec<_> = event.protocol_layers().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["eth", "ip"]);
        assert!(event.frame().is_some());
        assert!(event.layer("tcp").is_none());
    }

    #[test]
    fn test_first_scalar_string_ignores_objects() {
        assert_eq!(first_scalar_string(&json!({"a": 1})), None);
        assert_eq!(first_scalar_string(&json!(null)), None);
        assert_eq!(first_scalar_string(&json!(true)).as_deref(), Some("true"));
    }
}
