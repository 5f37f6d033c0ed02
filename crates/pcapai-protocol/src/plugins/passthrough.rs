//! Fallback for layers no built-in plugin claims.

use pcapai_core::{FieldMap, FieldValue, RawLayer};
use serde_json::Value;

/// Copies every scalar raw field verbatim.
///
/// Keys are prefixed with the layer name unless the dissector already did so,
/// so nothing is lost for protocols without a dedicated plugin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassThroughPlugin;

impl PassThroughPlugin {
    fn convert(value: &Value) -> Option<FieldValue> {
        match value {
            Value::String(s) => Some(FieldValue::Str(s.clone())),
            Value::Bool(b) => Some(FieldValue::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(v) => Some(FieldValue::Int(v)),
                None => Some(FieldValue::Str(n.to_string())),
            },
            Value::Array(items) => {
                let items: Vec<FieldValue> = items.iter().filter_map(Self::convert).collect();
                (!items.is_empty()).then_some(FieldValue::List(items))
            }
            Value::Null | Value::Object(_) => None,
        }
    }
}

impl crate::plugin::ProtocolPlugin for PassThroughPlugin {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn layer_names(&self) -> &'static [&'static str] {
        &[]
    }

    fn extract(&self, layer: &RawLayer) -> FieldMap {
        let prefix = format!("{}.", layer.name);
        layer
            .fields
            .iter()
            .filter_map(|(key, value)| {
                let value = Self::convert(value)?;
                let key = if key.starts_with(&prefix) {
                    key.clone()
                } else {
                    format!("{}{}", prefix, key)
                };
                Some((key, value))
            })
            .collect()
    }
}
