//! Transport-layer plugins.

use std::collections::BTreeMap;

use pcapai_core::{FieldMap, FieldValue, RawLayer};

use crate::plugin::{is_set, Promoter, ProtocolPlugin};

const TCP_FLAG_BITS: &[(&str, &str)] = &[
    ("syn", "tcp.flags.syn"),
    ("ack", "tcp.flags.ack"),
    ("fin", "tcp.flags.fin"),
    ("rst", "tcp.flags.reset"),
    ("psh", "tcp.flags.push"),
    ("urg", "tcp.flags.urg"),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TcpPlugin;

impl ProtocolPlugin for TcpPlugin {
    fn name(&self) -> &'static str {
        "tcp"
    }

    fn layer_names(&self) -> &'static [&'static str] {
        &["tcp"]
    }

    fn extract(&self, layer: &RawLayer) -> FieldMap {
        let mut detailed = BTreeMap::new();
        for (name, key) in TCP_FLAG_BITS {
            if let Some(text) = layer.get_str(key) {
                detailed.insert((*name).to_string(), FieldValue::Bool(is_set(&text)));
            }
        }
        let detailed = (!detailed.is_empty()).then_some(FieldValue::Map(detailed));

        Promoter::new(layer)
            .int("src_port", "tcp.srcport")
            .int("dst_port", "tcp.dstport")
            .int("seq", "tcp.seq")
            .int("ack", "tcp.ack")
            .int("window_size", "tcp.window_size_value")
            .text("flags", "tcp.flags")
            .int("header_length", "tcp.hdr_len")
            .int("payload_length", "tcp.len")
            .int("stream", "tcp.stream")
            .value("flags_detailed", detailed)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UdpPlugin;

impl ProtocolPlugin for UdpPlugin {
    fn name(&self) -> &'static str {
        "udp"
    }

    fn layer_names(&self) -> &'static [&'static str] {
        &["udp"]
    }

    fn extract(&self, layer: &RawLayer) -> FieldMap {
        Promoter::new(layer)
            .int("src_port", "udp.srcport")
            .int("dst_port", "udp.dstport")
            .int("length", "udp.length")
            .text("checksum", "udp.checksum")
            .int("stream", "udp.stream")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tcp_extract_with_flags() {
        let layer = RawLayer::new("tcp")
            .with_field("tcp.srcport", "51000")
            .with_field("tcp.dstport", "443")
            .with_field("tcp.flags", "0x0012")
            .with_field("tcp.flags.syn", "1")
            .with_field("tcp.flags.ack", "1")
            .with_field("tcp.flags.fin", "0");
        let fields = TcpPlugin.extract(&layer);
        assert_eq!(fields.get("dst_port"), Some(&FieldValue::Int(443)));
        let Some(FieldValue::Map(flags)) = fields.get("flags_detailed") else {
            panic!("expected flag map");
        };
        assert_eq!(flags.get("syn"), Some(&FieldValue::Bool(true)));
        assert_eq!(flags.get("fin"), Some(&FieldValue::Bool(false)));
        assert!(!flags.contains_key("rst"));
    }

    #[test]
    fn test_tcp_without_flag_bits_has_no_map() {
        let layer = RawLayer::new("tcp").with_field("tcp.srcport", "1");
        assert!(!TcpPlugin.extract(&layer).contains_key("flags_detailed"));
    }

    #[test]
    fn test_udp_extract() {
        let layer = RawLayer::new("udp")
            .with_field("udp.srcport", "5353")
            .with_field("udp.length", "120");
        let fields = UdpPlugin.extract(&layer);
        assert_eq!(fields.get("src_port"), Some(&FieldValue::Int(5353)));
        assert_eq!(fields.get("length"), Some(&FieldValue::Int(120)));
    }
}
