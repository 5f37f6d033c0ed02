//! Link-layer plugins.

use pcapai_core::{FieldMap, FieldValue, RawLayer};

use super::OPERATION_FIELD;
use crate::plugin::{code_name, Promoter, ProtocolPlugin};

/// Ethernet II.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EthernetPlugin;

impl ProtocolPlugin for EthernetPlugin {
    fn name(&self) -> &'static str {
        "eth"
    }

    fn layer_names(&self) -> &'static [&'static str] {
        &["eth"]
    }

    fn extract(&self, layer: &RawLayer) -> FieldMap {
        Promoter::new(layer)
            .text("src_mac", "eth.src")
            .text("dst_mac", "eth.dst")
            .text("type", "eth.type")
            .text("src_vendor", "eth.src.oui_resolved")
            .text("dst_vendor", "eth.dst.oui_resolved")
            .finish()
    }
}

const ARP_OPCODES: &[(i64, &str)] = &[
    (1, "request"),
    (2, "reply"),
    (3, "rarp_request"),
    (4, "rarp_reply"),
];

/// Address Resolution Protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArpPlugin;

impl ProtocolPlugin for ArpPlugin {
    fn name(&self) -> &'static str {
        "arp"
    }

    fn layer_names(&self) -> &'static [&'static str] {
        &["arp"]
    }

    fn extract(&self, layer: &RawLayer) -> FieldMap {
        let operation = layer
            .get_i64("arp.opcode")
            .and_then(|code| code_name(ARP_OPCODES, code))
            .map(FieldValue::from);
        Promoter::new(layer)
            .int("hardware_type", "arp.hw.type")
            .text("protocol_type", "arp.proto.type")
            .int("opcode", "arp.opcode")
            .text("src_hw", "arp.src.hw_mac")
            .text("src_proto", "arp.src.proto_ipv4")
            .text("dst_hw", "arp.dst.hw_mac")
            .text("dst_proto", "arp.dst.proto_ipv4")
            .value(OPERATION_FIELD, operation)
            .finish()
    }
}
