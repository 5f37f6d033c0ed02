//! Application-layer plugins for DNS, HTTP and TLS.

use pcapai_core::{FieldMap, FieldValue, RawLayer};

use super::OPERATION_FIELD;
use crate::plugin::{code_name, Promoter, ProtocolPlugin};

const DNS_OPCODES: &[(i64, &str)] = &[
    (0, "QUERY"),
    (1, "IQUERY"),
    (2, "STATUS"),
    (4, "NOTIFY"),
    (5, "UPDATE"),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DnsPlugin;

impl ProtocolPlugin for DnsPlugin {
    fn name(&self) -> &'static str {
        "dns"
    }

    fn layer_names(&self) -> &'static [&'static str] {
        &["dns", "mdns"]
    }

    fn extract(&self, layer: &RawLayer) -> FieldMap {
        let operation = layer
            .get_i64("dns.flags.opcode")
            .and_then(|code| code_name(DNS_OPCODES, code))
            .map(FieldValue::from);
        Promoter::new(layer)
            .text("id", "dns.id")
            .text("flags", "dns.flags")
            .flag("response", "dns.flags.response")
            .int("opcode", "dns.flags.opcode")
            .int("rcode", "dns.flags.rcode")
            .int("qd_count", "dns.count.queries")
            .int("an_count", "dns.count.answers")
            .int("ns_count", "dns.count.auth_rr")
            .int("ar_count", "dns.count.add_rr")
            .text("query_name", "dns.qry.name")
            .int("query_type", "dns.qry.type")
            .int("query_class", "dns.qry.class")
            .list("answers_a", "dns.a")
            .list("answers_aaaa", "dns.aaaa")
            .value(OPERATION_FIELD, operation)
            .finish()
    }
}

/// HTTP/1.x. The canonical operation is the request method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HttpPlugin;

impl ProtocolPlugin for HttpPlugin {
    fn name(&self) -> &'static str {
        "http"
    }

    fn layer_names(&self) -> &'static [&'static str] {
        &["http"]
    }

    fn extract(&self, layer: &RawLayer) -> FieldMap {
        let operation = layer
            .get_str("http.request.method")
            .map(|m| FieldValue::Str(m.to_ascii_uppercase()));
        Promoter::new(layer)
            .text("method", "http.request.method")
            .text("uri", "http.request.uri")
            .text("version", "http.request.version")
            .text("host", "http.host")
            .text("user_agent", "http.user_agent")
            .int("response_code", "http.response.code")
            .text("response_phrase", "http.response.phrase")
            .text("content_type", "http.content_type")
            .int("content_length", "http.content_length")
            .value(OPERATION_FIELD, operation)
            .finish()
    }
}

/// TLS, including captures dissected under the legacy `ssl` layer name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TlsPlugin;

impl ProtocolPlugin for TlsPlugin {
    fn name(&self) -> &'static str {
        "tls"
    }

    fn layer_names(&self) -> &'static [&'static str] {
        &["tls", "ssl"]
    }

    fn extract(&self, layer: &RawLayer) -> FieldMap {
        // Field keys carry the layer name as their prefix.
        let prefix = layer.name.as_str();
        let key = |suffix: &str| format!("{}.{}", prefix, suffix);
        Promoter::new(layer)
            .text("version", &key("record.version"))
            .int("content_type", &key("record.content_type"))
            .int("length", &key("record.length"))
            .int("handshake_type", &key("handshake.type"))
            .text("server_name", &key("handshake.extensions_server_name"))
            .finish()
    }
}
