//! Network-layer plugins.

use pcapai_core::{FieldMap, FieldValue, RawLayer};

use super::OPERATION_FIELD;
use crate::plugin::{code_name, Promoter, ProtocolPlugin};

/// IPv4. Stored under the `ip` namespace, matching the dissector layer name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ipv4Plugin;

impl ProtocolPlugin for Ipv4Plugin {
    fn name(&self) -> &'static str {
        "ip"
    }

    fn layer_names(&self) -> &'static [&'static str] {
        &["ip"]
    }

    fn extract(&self, layer: &RawLayer) -> FieldMap {
        Promoter::new(layer)
            .int("version", "ip.version")
            .text("src", "ip.src")
            .text("dst", "ip.dst")
            .int("protocol", "ip.proto")
            .int("ttl", "ip.ttl")
            .int("length", "ip.len")
            .text("id", "ip.id")
            .text("flags", "ip.flags")
            .int("fragment_offset", "ip.frag_offset")
            .int("header_length", "ip.hdr_len")
            .text("dsfield", "ip.dsfield")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ipv6Plugin;

impl ProtocolPlugin for Ipv6Plugin {
    fn name(&self) -> &'static str {
        "ipv6"
    }

    fn layer_names(&self) -> &'static [&'static str] {
        &["ipv6"]
    }

    fn extract(&self, layer: &RawLayer) -> FieldMap {
        Promoter::new(layer)
            .int("version", "ipv6.version")
            .text("src", "ipv6.src")
            .text("dst", "ipv6.dst")
            .int("next_header", "ipv6.nxt")
            .int("hop_limit", "ipv6.hlim")
            .int("payload_length", "ipv6.plen")
            .text("traffic_class", "ipv6.tclass")
            .text("flow_label", "ipv6.flow")
            .finish()
    }
}

const ICMP_TYPES: &[(i64, &str)] = &[
    (0, "echo_reply"),
    (3, "destination_unreachable"),
    (4, "source_quench"),
    (5, "redirect"),
    (8, "echo_request"),
    (9, "router_advertisement"),
    (10, "router_solicitation"),
    (11, "time_exceeded"),
    (12, "parameter_problem"),
    (13, "timestamp_request"),
    (14, "timestamp_reply"),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IcmpPlugin;

impl ProtocolPlugin for IcmpPlugin {
    fn name(&self) -> &'static str {
        "icmp"
    }

    fn layer_names(&self) -> &'static [&'static str] {
        &["icmp"]
    }

    fn extract(&self, layer: &RawLayer) -> FieldMap {
        let operation = layer
            .get_i64("icmp.type")
            .and_then(|t| code_name(ICMP_TYPES, t))
            .map(FieldValue::from);
        Promoter::new(layer)
            .int("type", "icmp.type")
            .int("code", "icmp.code")
            .text("checksum", "icmp.checksum")
            .int("id", "icmp.ident")
            .int("seq", "icmp.seq")
            .value(OPERATION_FIELD, operation)
            .finish()
    }
}
