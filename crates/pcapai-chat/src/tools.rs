//! Declared tool schema.
//!
//! Each tool exposes one filter-engine predicate constructor (or the capture
//! summary) to the model as a named operation with typed parameters.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Tool as declared to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// The closed set of tools the orchestrator can execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    ByProtocol,
    ByIp,
    ByOperation,
    ByTimeRange,
    ByIndex,
    ByField,
    Conjunction,
    Summary,
}

impl ToolKind {
    pub const ALL: [ToolKind; 8] = [
        ToolKind::ByProtocol,
        ToolKind::ByIp,
        ToolKind::ByOperation,
        ToolKind::ByTimeRange,
        ToolKind::ByIndex,
        ToolKind::ByField,
        ToolKind::Conjunction,
        ToolKind::Summary,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::ByProtocol => "filter_packets_by_protocol",
            ToolKind::ByIp => "filter_packets_by_ip",
            ToolKind::ByOperation => "filter_packets_by_operation",
            ToolKind::ByTimeRange => "filter_packets_by_time_range",
            ToolKind::ByIndex => "filter_packets_by_index",
            ToolKind::ByField => "filter_packets_by_field",
            ToolKind::Conjunction => "filter_packets",
            ToolKind::Summary => "capture_summary",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Short selector used inside a `filter_packets` conjunction.
    pub fn filter_type(self) -> Option<&'static str> {
        match self {
            ToolKind::ByProtocol => Some("protocol"),
            ToolKind::ByIp => Some("ip"),
            ToolKind::ByOperation => Some("operation"),
            ToolKind::ByTimeRange => Some("time_range"),
            ToolKind::ByIndex => Some("index"),
            ToolKind::ByField => Some("field"),
            ToolKind::Conjunction | ToolKind::Summary => None,
        }
    }

    pub fn from_filter_type(selector: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.filter_type() == Some(selector))
    }

    /// Parameter names accepted by this tool.
    pub fn parameters(self) -> &'static [&'static str] {
        match self {
            ToolKind::ByProtocol => &["protocol"],
            ToolKind::ByIp => &["ip", "direction", "protocol"],
            ToolKind::ByOperation => &["operation", "protocol"],
            ToolKind::ByTimeRange => &["start", "end"],
            ToolKind::ByIndex => &["start", "end"],
            ToolKind::ByField => &["protocol", "field", "value", "match"],
            ToolKind::Conjunction => &["filters"],
            ToolKind::Summary => &["protocol"],
        }
    }

    fn description(self) -> &'static str {
        match self {
            ToolKind::ByProtocol => {
                "Filter packets by protocol layer (e.g. nfs, smb2, http, dns, tcp, udp). Returns matching packets in capture order."
            }
            ToolKind::ByIp => {
                "Filter packets by IPv4 or IPv6 address, as source, destination or either. Optionally restrict to one protocol."
            }
            ToolKind::ByOperation => {
                "Filter packets by protocol operation or procedure (e.g. read, write, lookup, create for NFS/SMB2; GET, POST for HTTP; QUERY for DNS)."
            }
            ToolKind::ByTimeRange => {
                "Filter packets captured between two instants (inclusive). Accepts RFC 3339 timestamps or epoch seconds."
            }
            ToolKind::ByIndex => {
                "Select packets by capture frame number, either one packet or an inclusive range."
            }
            ToolKind::ByField => {
                "Filter packets whose promoted protocol field equals or contains a value (e.g. protocol=http field=host value=example.com)."
            }
            ToolKind::Conjunction => {
                "Apply several filters at once; a packet must satisfy all of them. Each filter names its type and that filter's parameters."
            }
            ToolKind::Summary => {
                "Summarize the capture (or one protocol's packets): totals, time span, top protocols, hosts and ports, frame lengths."
            }
        }
    }

    fn schema(self, max_filters: usize) -> Value {
        let protocol = json!({
            "type": "string",
            "description": "Protocol name (e.g. 'nfs', 'smb2', 'http', 'tcp', 'udp')"
        });
        let instant = json!({
            "type": ["string", "number"],
            "description": "RFC 3339 timestamp or epoch seconds"
        });
        match self {
            ToolKind::ByProtocol => json!({
                "type": "object",
                "properties": { "protocol": protocol },
                "required": ["protocol"]
            }),
            ToolKind::ByIp => json!({
                "type": "object",
                "properties": {
                    "ip": {
                        "type": "string",
                        "description": "IP address (e.g. '192.168.1.100')"
                    },
                    "direction": {
                        "type": "string",
                        "enum": ["src", "dst", "any"],
                        "description": "Which address to match; defaults to 'any'"
                    },
                    "protocol": protocol
                },
                "required": ["ip"]
            }),
            ToolKind::ByOperation => json!({
                "type": "object",
                "properties": {
                    "operation": {
                        "type": "string",
                        "description": "Operation name (e.g. 'read', 'write', 'create', 'lookup', 'open', 'close')"
                    },
                    "protocol": protocol
                },
                "required": ["operation"]
            }),
            ToolKind::ByTimeRange => json!({
                "type": "object",
                "properties": { "start": instant, "end": instant },
                "required": ["start", "end"]
            }),
            ToolKind::ByIndex => json!({
                "type": "object",
                "properties": {
                    "start": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "First frame number"
                    },
                    "end": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Last frame number; defaults to start"
                    }
                },
                "required": ["start"]
            }),
            ToolKind::ByField => json!({
                "type": "object",
                "properties": {
                    "protocol": protocol,
                    "field": {
                        "type": "string",
                        "description": "Promoted field name (e.g. 'host', 'uri', 'query_name', 'filename')"
                    },
                    "value": { "type": ["string", "number", "boolean"] },
                    "match": {
                        "type": "string",
                        "enum": ["equals", "contains"],
                        "description": "Comparison; defaults to 'equals'"
                    }
                },
                "required": ["protocol", "field", "value"]
            }),
            ToolKind::Conjunction => {
                let selectors: Vec<&str> = Self::ALL.iter().filter_map(|k| k.filter_type()).collect();
                json!({
                    "type": "object",
                    "properties": {
                        "filters": {
                            "type": "array",
                            "minItems": 1,
                            "maxItems": max_filters,
                            "items": {
                                "type": "object",
                                "properties": {
                                    "type": { "type": "string", "enum": selectors }
                                },
                                "required": ["type"]
                            }
                        }
                    },
                    "required": ["filters"]
                })
            }
            ToolKind::Summary => json!({
                "type": "object",
                "properties": { "protocol": protocol }
            }),
        }
    }

    pub fn definition(self, max_filters: usize) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.schema(max_filters),
        }
    }
}

/// All tool definitions, in declaration order.
pub fn tool_definitions(max_filters: usize) -> Vec<ToolDefinition> {
    ToolKind::ALL
        .into_iter()
        .map(|k| k.definition(max_filters))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for kind in ToolKind::ALL {
            assert_eq!(ToolKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ToolKind::from_name("delete_capture"), None);
    }

    #[test]
    fn test_filter_types() {
        assert_eq!(ToolKind::from_filter_type("ip"), Some(ToolKind::ByIp));
        assert_eq!(ToolKind::from_filter_type("summary"), None);
        assert_eq!(ToolKind::Conjunction.filter_type(), None);
    }

    #[test]
    fn test_schema_required_parameters_are_declared() {
        for def in tool_definitions(8) {
            let kind = ToolKind::from_name(&def.name).unwrap();
            let declared = def.parameters["properties"].as_object().unwrap();
            for name in declared.keys() {
                assert!(kind.parameters().contains(&name.as_str()), "{}", name);
            }
            if let Some(required) = def.parameters["required"].as_array() {
                for r in required {
                    assert!(declared.contains_key(r.as_str().unwrap()));
                }
            }
        }
    }

    #[test]
    fn test_conjunction_limit_in_schema() {
        let def = ToolKind::Conjunction.definition(3);
        assert_eq!(def.parameters["properties"]["filters"]["maxItems"], 3);
    }
}
