//! The closed set of record predicates.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use pcapai_core::{FieldValue, PacketRecord};
use pcapai_protocol::protocol_aliases;
use serde::{Deserialize, Serialize};

/// Name of the per-protocol field carrying the canonical operation.
pub const OPERATION_FIELD: &str = "operation";

/// Which address of a packet a host predicate inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostDirection {
    Src,
    Dst,
    Any,
}

impl fmt::Display for HostDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostDirection::Src => write!(f, "src"),
            HostDirection::Dst => write!(f, "dst"),
            HostDirection::Any => write!(f, "any"),
        }
    }
}

impl FromStr for HostDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "src" | "source" => Ok(HostDirection::Src),
            "dst" | "destination" => Ok(HostDirection::Dst),
            "any" | "either" => Ok(HostDirection::Any),
            other => Err(format!("unknown direction: {}", other)),
        }
    }
}

/// One typed record predicate.
///
/// Protocol names match case-insensitively and honour aliases
/// (`smb2`/`smb`, `http`/`https`, `tls`/`ssl`, `ip`/`ipv4`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    /// Inclusive capture-time bounds. `start > end` matches nothing.
    TimeRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// Inclusive index bounds, clamped to the records present.
    IndexRange { lo: u64, hi: u64 },
    /// A protocol layer is present.
    Protocol { name: String },
    /// The canonical operation field equals `operation`. With no protocol,
    /// any protocol's operation field may match.
    Operation {
        protocol: Option<String>,
        operation: String,
    },
    /// A promoted field equals `value` (typed comparison).
    FieldEquals {
        protocol: String,
        field: String,
        value: String,
    },
    /// A promoted field contains `value` (case-insensitive).
    FieldContains {
        protocol: String,
        field: String,
        value: String,
    },
    /// The IPv4/IPv6 source and/or destination is `address`.
    Host {
        address: IpAddr,
        direction: HostDirection,
    },
}

impl Predicate {
    pub fn matches(&self, record: &PacketRecord) -> bool {
        match self {
            Predicate::TimeRange { start, end } => {
                start <= end && record.timestamp() >= *start && record.timestamp() <= *end
            }
            Predicate::IndexRange { lo, hi } => record.index() >= *lo && record.index() <= *hi,
            Predicate::Protocol { name } => has_protocol(record, name),
            Predicate::Operation {
                protocol: Some(protocol),
                operation,
            } => aliased_field(record, protocol, OPERATION_FIELD)
                .is_some_and(|v| v.matches_text(operation)),
            Predicate::Operation {
                protocol: None,
                operation,
            } => record.fields().iter().any(|(_, fields)| {
                fields
                    .get(OPERATION_FIELD)
                    .is_some_and(|v| v.matches_text(operation))
            }),
            Predicate::FieldEquals {
                protocol,
                field,
                value,
            } => aliased_field(record, protocol, field).is_some_and(|v| v.matches_text(value)),
            Predicate::FieldContains {
                protocol,
                field,
                value,
            } => aliased_field(record, protocol, field).is_some_and(|v| v.contains_text(value)),
            Predicate::Host { address, direction } => host_matches(record, address, *direction),
        }
    }

    /// Whether this predicate constrains the protocol explicitly.
    ///
    /// Queries carrying one are exempt from the session's protocol focus.
    pub fn names_protocol(&self) -> bool {
        matches!(
            self,
            Predicate::Protocol { .. }
                | Predicate::Operation {
                    protocol: Some(_),
                    ..
                }
                | Predicate::FieldEquals { .. }
                | Predicate::FieldContains { .. }
        )
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::TimeRange { start, end } => {
                write!(f, "time in [{}, {}]", start.to_rfc3339(), end.to_rfc3339())
            }
            Predicate::IndexRange { lo, hi } => write!(f, "index in [{}, {}]", lo, hi),
            Predicate::Protocol { name } => write!(f, "protocol = {}", name),
            Predicate::Operation {
                protocol: Some(p),
                operation,
            } => write!(f, "{}.operation = {}", p, operation),
            Predicate::Operation {
                protocol: None,
                operation,
            } => write!(f, "operation = {}", operation),
            Predicate::FieldEquals {
                protocol,
                field,
                value,
            } => write!(f, "{}.{} = {}", protocol, field, value),
            Predicate::FieldContains {
                protocol,
                field,
                value,
            } => write!(f, "{}.{} contains {}", protocol, field, value),
            Predicate::Host { address, direction } => write!(f, "host {} {}", direction, address),
        }
    }
}

fn has_protocol(record: &PacketRecord, name: &str) -> bool {
    protocol_aliases(name)
        .iter()
        .any(|alias| record.has_protocol(alias))
}

/// Look up a field under the protocol's namespace or any of its aliases.
fn aliased_field<'r>(record: &'r PacketRecord, protocol: &str, field: &str) -> Option<&'r FieldValue> {
    protocol_aliases(protocol)
        .iter()
        .find_map(|ns| record.field(ns, field))
}

fn host_matches(record: &PacketRecord, address: &IpAddr, direction: HostDirection) -> bool {
    let namespace = match address {
        IpAddr::V4(_) => "ip",
        IpAddr::V6(_) => "ipv6",
    };
    let check = |field: &str| {
        record
            .field(namespace, field)
            .and_then(FieldValue::as_str)
            .and_then(|s| s.parse::<IpAddr>().ok())
            .is_some_and(|ip| ip == *address)
    };
    match direction {
        HostDirection::Src => check("src"),
        HostDirection::Dst => check("dst"),
        HostDirection::Any => check("src") || check("dst"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pcapai_core::Fields;

    fn record(index: u64, protocols: &[&str], fields: &[(&str, &str, FieldValue)]) -> PacketRecord {
        let mut f = Fields::new();
        for (p, k, v) in fields {
            f.insert_if_absent(p, k, v.clone());
        }
        PacketRecord::new(
            index,
            Utc.timestamp_opt(1_700_000_000 + index as i64, 0).unwrap(),
            protocols.iter().map(|s| s.to_string()).collect(),
            None,
            f,
            Vec::new(),
        )
    }

    // ---- protocol ----

    #[test]
    fn test_protocol_alias_matching() {
        let smb = record(1, &["eth", "ip", "tcp", "smb"], &[]);
        let p = Predicate::Protocol {
            name: "SMB2".to_string(),
        };
        assert!(p.matches(&smb));

        let ipv4 = record(2, &["eth", "ip"], &[]);
        assert!(Predicate::Protocol {
            name: "ipv4".to_string()
        }
        .matches(&ipv4));
        assert!(!Predicate::Protocol {
            name: "nfs".to_string()
        }
        .matches(&ipv4));
    }

    // ---- operation ----

    #[test]
    fn test_operation_requires_field() {
        let nfs = record(3, &["nfs"], &[("nfs", "operation", "READ".into())]);
        let bare = record(4, &["nfs"], &[]);
        let p = Predicate::Operation {
            protocol: Some("nfs".to_string()),
            operation: "read".to_string(),
        };
        assert!(p.matches(&nfs));
        assert!(!p.matches(&bare));
    }

    #[test]
    fn test_operation_any_protocol() {
        let smb = record(1, &["smb2"], &[("smb2", "operation", "WRITE".into())]);
        let p = Predicate::Operation {
            protocol: None,
            operation: "write".to_string(),
        };
        assert!(p.matches(&smb));
        let wrong = Predicate::Operation {
            protocol: Some("nfs".to_string()),
            operation: "write".to_string(),
        };
        assert!(!wrong.matches(&smb));
    }

    // ---- fields ----

    #[test]
    fn test_field_equals_and_contains() {
        let http = record(
            1,
            &["http"],
            &[
                ("http", "uri", "/api/v1/users".into()),
                ("http", "response_code", FieldValue::Int(200)),
            ],
        );
        assert!(Predicate::FieldEquals {
            protocol: "http".into(),
            field: "response_code".into(),
            value: "200".into(),
        }
        .matches(&http));
        assert!(Predicate::FieldContains {
            protocol: "https".into(),
            field: "uri".into(),
            value: "USERS".into(),
        }
        .matches(&http));
        assert!(!Predicate::FieldEquals {
            protocol: "http".into(),
            field: "missing".into(),
            value: "x".into(),
        }
        .matches(&http));
    }

    // ---- host ----

    #[test]
    fn test_host_direction() {
        let r = record(
            1,
            &["ip"],
            &[
                ("ip", "src", "10.0.0.1".into()),
                ("ip", "dst", "10.0.0.2".into()),
            ],
        );
        let addr: IpAddr = "10.0.0.2".parse().unwrap();
        let host = |direction| Predicate::Host {
            address: addr,
            direction,
        };
        assert!(host(HostDirection::Dst).matches(&r));
        assert!(host(HostDirection::Any).matches(&r));
        assert!(!host(HostDirection::Src).matches(&r));
    }

    #[test]
    fn test_host_ipv6_normalized() {
        let r = record(1, &["ipv6"], &[("ipv6", "src", "2001:db8:0:0::1".into())]);
        let p = Predicate::Host {
            address: "2001:db8::1".parse().unwrap(),
            direction: HostDirection::Src,
        };
        assert!(p.matches(&r));
    }

    #[test]
    fn test_direction_from_str() {
        assert_eq!("SRC".parse::<HostDirection>(), Ok(HostDirection::Src));
        assert_eq!("destination".parse::<HostDirection>(), Ok(HostDirection::Dst));
        assert!("up".parse::<HostDirection>().is_err());
    }

    #[test]
    fn test_names_protocol() {
        assert!(Predicate::Protocol { name: "x".into() }.names_protocol());
        assert!(!Predicate::IndexRange { lo: 1, hi: 2 }.names_protocol());
        assert!(!Predicate::Operation {
            protocol: None,
            operation: "READ".into()
        }
        .names_protocol());
    }

    #[test]
    fn test_display() {
        let p = Predicate::FieldContains {
            protocol: "dns".into(),
            field: "query_name".into(),
            value: "example".into(),
        };
        assert_eq!(p.to_string(), "dns.query_name contains example");
    }
}
