//! The plugin capability and its closed set of built-in variants.

use std::collections::BTreeMap;

use pcapai_core::raw::{first_scalar_string, parse_int};
use pcapai_core::{FieldMap, FieldValue, RawLayer};
use serde_json::Value;

use crate::plugins::{
    ArpPlugin, DnsPlugin, EthernetPlugin, HttpPlugin, IcmpPlugin, Ipv4Plugin, Ipv6Plugin,
    NfsPlugin, PassThroughPlugin, Smb2Plugin, TcpPlugin, TlsPlugin, UdpPlugin,
};

/// Core trait every protocol plugin implements.
///
/// Plugins are stateless: they own no packet data and are invoked once per
/// record for each layer they claim.
pub trait ProtocolPlugin: Send + Sync {
    /// Namespace the promoted fields are stored under (e.g. `"ip"`, `"smb2"`).
    fn name(&self) -> &'static str;

    /// Raw layer names this plugin handles.
    fn layer_names(&self) -> &'static [&'static str];

    /// Promote fields from one raw layer.
    fn extract(&self, layer: &RawLayer) -> FieldMap;
}

/// Enum of all built-in plugins.
///
/// Static dispatch over a closed set: adding a protocol means adding a
/// variant here, the registry and ingestion stay unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinPlugin {
    Ethernet(EthernetPlugin),
    Arp(ArpPlugin),
    Ipv4(Ipv4Plugin),
    Ipv6(Ipv6Plugin),
    Icmp(IcmpPlugin),
    Tcp(TcpPlugin),
    Udp(UdpPlugin),
    Dns(DnsPlugin),
    Http(HttpPlugin),
    Tls(TlsPlugin),
    Nfs(NfsPlugin),
    Smb2(Smb2Plugin),
    PassThrough(PassThroughPlugin),
}

macro_rules! delegate_plugin {
    ($self:expr, $method:ident $(, $arg:expr)*) => {
        match $self {
            BuiltinPlugin::Ethernet(p) => p.$method($($arg),*),
            BuiltinPlugin::Arp(p) => p.$method($($arg),*),
            BuiltinPlugin::Ipv4(p) => p.$method($($arg),*),
            BuiltinPlugin::Ipv6(p) => p.$method($($arg),*),
            BuiltinPlugin::Icmp(p) => p.$method($($arg),*),
            BuiltinPlugin::Tcp(p) => p.$method($($arg),*),
            BuiltinPlugin::Udp(p) => p.$method($($arg),*),
            BuiltinPlugin::Dns(p) => p.$method($($arg),*),
            BuiltinPlugin::Http(p) => p.$method($($arg),*),
            BuiltinPlugin::Tls(p) => p.$method($($arg),*),
            BuiltinPlugin::Nfs(p) => p.$method($($arg),*),
            BuiltinPlugin::Smb2(p) => p.$method($($arg),*),
            BuiltinPlugin::PassThrough(p) => p.$method($($arg),*),
        }
    };
}

impl ProtocolPlugin for BuiltinPlugin {
    #[inline]
    fn name(&self) -> &'static str {
        delegate_plugin!(self, name)
    }

    #[inline]
    fn layer_names(&self) -> &'static [&'static str] {
        delegate_plugin!(self, layer_names)
    }

    #[inline]
    fn extract(&self, layer: &RawLayer) -> FieldMap {
        delegate_plugin!(self, extract, layer)
    }
}

impl BuiltinPlugin {
    /// Every registrable built-in plugin, link layer first.
    ///
    /// The pass-through plugin is not listed: it is the registry's fallback.
    pub fn all() -> Vec<BuiltinPlugin> {
        vec![
            BuiltinPlugin::Ethernet(EthernetPlugin),
            BuiltinPlugin::Arp(ArpPlugin),
            BuiltinPlugin::Ipv4(Ipv4Plugin),
            BuiltinPlugin::Ipv6(Ipv6Plugin),
            BuiltinPlugin::Icmp(IcmpPlugin),
            BuiltinPlugin::Tcp(TcpPlugin),
            BuiltinPlugin::Udp(UdpPlugin),
            BuiltinPlugin::Dns(DnsPlugin),
            BuiltinPlugin::Http(HttpPlugin),
            BuiltinPlugin::Tls(TlsPlugin),
            BuiltinPlugin::Nfs(NfsPlugin),
            BuiltinPlugin::Smb2(Smb2Plugin),
        ]
    }
}

// =============================================================================
// Field promotion helper
// =============================================================================

/// Builder used by plugins to copy raw fields into a [`FieldMap`].
///
/// Missing raw keys are silently skipped, so a plugin can list every field
/// its protocol may carry without checking presence first.
pub(crate) struct Promoter<'a> {
    layer: &'a RawLayer,
    out: FieldMap,
}

impl<'a> Promoter<'a> {
    pub(crate) fn new(layer: &'a RawLayer) -> Self {
        Self {
            layer,
            out: BTreeMap::new(),
        }
    }

    /// Copy a field as text.
    pub(crate) fn text(mut self, field: &str, raw_key: &str) -> Self {
        if let Some(value) = self.layer.get_str(raw_key) {
            self.out.insert(field.to_string(), FieldValue::Str(value));
        }
        self
    }

    /// Copy a field as an integer, keeping the text when it does not parse.
    pub(crate) fn int(mut self, field: &str, raw_key: &str) -> Self {
        if let Some(text) = self.layer.get_str(raw_key) {
            let value = match parse_int(&text) {
                Some(v) => FieldValue::Int(v),
                None => FieldValue::Str(text),
            };
            self.out.insert(field.to_string(), value);
        }
        self
    }

    /// Copy a field as a boolean flag.
    pub(crate) fn flag(mut self, field: &str, raw_key: &str) -> Self {
        if let Some(text) = self.layer.get_str(raw_key) {
            self.out.insert(field.to_string(), FieldValue::Bool(is_set(&text)));
        }
        self
    }

    /// Copy every occurrence of a repeated field as a list of text values.
    pub(crate) fn list(mut self, field: &str, raw_key: &str) -> Self {
        if let Some(value) = self.layer.get(raw_key) {
            let items: Vec<FieldValue> = match value {
                Value::Array(items) => items
                    .iter()
                    .filter_map(first_scalar_string)
                    .map(FieldValue::Str)
                    .collect(),
                other => first_scalar_string(other)
                    .map(|s| vec![FieldValue::Str(s)])
                    .unwrap_or_default(),
            };
            if !items.is_empty() {
                self.out.insert(field.to_string(), FieldValue::List(items));
            }
        }
        self
    }

    /// Insert a computed value.
    pub(crate) fn value(mut self, field: &str, value: Option<FieldValue>) -> Self {
        if let Some(value) = value {
            self.out.insert(field.to_string(), value);
        }
        self
    }

    pub(crate) fn finish(self) -> FieldMap {
        self.out
    }
}

/// Interpret a dissector flag value (`"1"`, `"True"`, `"true"`).
pub(crate) fn is_set(text: &str) -> bool {
    matches!(text.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

/// Look up a numeric code in a `(code, name)` table.
pub(crate) fn code_name(table: &[(i64, &'static str)], code: i64) -> Option<&'static str> {
    table.iter().find(|(c, _)| *c == code).map(|(_, name)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtin_names_unique() {
        let all = BuiltinPlugin::all();
        let mut names: Vec<_> = all.iter().map(|p| p.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), all.len());
    }

    #[test]
    fn test_delegate_extract() {
        let plugin = BuiltinPlugin::Udp(UdpPlugin);
        let layer = RawLayer::new("udp")
            .with_field("udp.srcport", "53")
            .with_field("udp.dstport", "40000");
        let fields = plugin.extract(&layer);
        assert_eq!(fields.get("src_port"), Some(&FieldValue::Int(53)));
        assert_eq!(plugin.layer_names(), &["udp"]);
    }

    #[test]
    fn test_promoter_kinds() {
        let layer = RawLayer::new("x")
            .with_field("x.a", "hello")
            .with_field("x.b", "0x10")
            .with_field("x.c", "notanumber")
            .with_field("x.d", "1")
            .with_field("x.e", json!(["p", "q"]));
        let out = Promoter::new(&layer)
            .text("a", "x.a")
            .int("b", "x.b")
            .int("c", "x.c")
            .flag("d", "x.d")
            .list("e", "x.e")
            .text("missing", "x.zzz")
            .finish();
        assert_eq!(out.get("a"), Some(&FieldValue::from("hello")));
        assert_eq!(out.get("b"), Some(&FieldValue::Int(16)));
        assert_eq!(out.get("c"), Some(&FieldValue::from("notanumber")));
        assert_eq!(out.get("d"), Some(&FieldValue::Bool(true)));
        assert_eq!(
            out.get("e"),
            Some(&FieldValue::List(vec!["p".into(), "q".into()]))
        );
        assert!(!out.contains_key("missing"));
    }

    #[test]
    fn test_code_name() {
        let table = [(1, "one"), (2, "two")];
        assert_eq!(code_name(&table, 2), Some("two"));
        assert_eq!(code_name(&table, 3), None);
    }
}
