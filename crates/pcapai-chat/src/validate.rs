//! Tool-call validation.
//!
//! Turns a model-issued [`ToolCall`] into a typed filter [`Query`], or a
//! [`ValidationError`] describing exactly what was wrong. Nothing reaches the
//! filter engine without passing through here.

use std::net::IpAddr;
use std::sync::LazyLock;

use chrono::{DateTime, TimeZone, Utc};
use pcapai_filter::{HostDirection, Predicate, Query};
use pcapai_protocol::parse_epoch;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::tools::ToolKind;
use crate::types::ToolCall;

const MAX_VALUE_CHARS: usize = 256;

static PROTOCOL_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9_.\-]{0,31}$").expect("Invalid protocol regex"));
static FIELD_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_][a-z0-9_.\-]{0,63}$").expect("Invalid field regex"));
static OPERATION_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_ ./\-]{0,63}$").expect("Invalid operation regex")
});

/// What a validated call does.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolAction {
    /// Return the records matching the query.
    Filter(Query),
    /// Summarize the records matching the query.
    Summary(Query),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedCall {
    pub kind: ToolKind,
    pub action: ToolAction,
}

impl ValidatedCall {
    pub fn query(&self) -> &Query {
        match &self.action {
            ToolAction::Filter(q) | ToolAction::Summary(q) => q,
        }
    }
}

/// Validate one tool call against the declared schema.
pub fn validate_call(call: &ToolCall, max_filters: usize) -> Result<ValidatedCall, ValidationError> {
    let kind = ToolKind::from_name(&call.name)
        .ok_or_else(|| ValidationError::UnknownTool(call.name.clone()))?;
    let map = arguments_object(kind.name(), &call.arguments)?;
    let args = Args {
        tool: kind.name(),
        map: &map,
    };

    let action = match kind {
        ToolKind::Conjunction => ToolAction::Filter(conjunction(&args, max_filters)?),
        ToolKind::Summary => {
            args.check_known(kind.parameters())?;
            let query = match args.optional_str("protocol")? {
                Some(p) => Query::from(Predicate::Protocol {
                    name: protocol_name(&args, "protocol", p)?,
                }),
                None => Query::new(),
            };
            ToolAction::Summary(query)
        }
        _ => ToolAction::Filter(predicates_for(kind, &args)?.into_iter().collect()),
    };
    Ok(ValidatedCall { kind, action })
}

/// Accept an object, a JSON-encoded object string, or nothing.
fn arguments_object(tool: &str, arguments: &Value) -> Result<Map<String, Value>, ValidationError> {
    let malformed = |reason: String| ValidationError::MalformedArguments {
        tool: tool.to_string(),
        reason,
    };
    match arguments {
        Value::Null => Ok(Map::new()),
        Value::Object(map) => Ok(map.clone()),
        Value::String(text) if text.trim().is_empty() => Ok(Map::new()),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(malformed("arguments must be a JSON object".to_string())),
            Err(e) => Err(malformed(e.to_string())),
        },
        _ => Err(malformed("arguments must be a JSON object".to_string())),
    }
}

fn conjunction(args: &Args<'_>, max_filters: usize) -> Result<Query, ValidationError> {
    args.check_known(ToolKind::Conjunction.parameters())?;
    let filters = match args.map.get("filters") {
        None | Some(Value::Null) => return Err(args.missing("filters")),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(args.wrong_type("filters", "an array of filter objects")),
    };
    if filters.is_empty() {
        return Err(args.invalid("filters", "at least one filter is required"));
    }
    if filters.len() > max_filters {
        return Err(ValidationError::TooManyFilters {
            count: filters.len(),
            limit: max_filters,
        });
    }

    let mut query = Query::new();
    for (i, item) in filters.iter().enumerate() {
        let Value::Object(item) = item else {
            return Err(args.wrong_type("filters", "an array of filter objects"));
        };
        let context = format!("{}.filters[{}]", args.tool, i);
        let mut nested = item.clone();
        let selector = match nested.remove("type") {
            Some(Value::String(s)) => s,
            Some(_) => {
                return Err(ValidationError::WrongType {
                    tool: context,
                    parameter: "type".to_string(),
                    expected: "a string",
                })
            }
            None => {
                return Err(ValidationError::MissingParameter {
                    tool: context,
                    parameter: "type".to_string(),
                })
            }
        };
        let kind = ToolKind::from_filter_type(selector.trim()).ok_or_else(|| {
            ValidationError::InvalidValue {
                tool: context.clone(),
                parameter: "type".to_string(),
                reason: format!("unknown filter type '{}'", selector),
            }
        })?;
        let nested_args = Args {
            tool: &context,
            map: &nested,
        };
        for predicate in predicates_for(kind, &nested_args)? {
            query.push(predicate);
        }
    }
    Ok(query)
}

fn predicates_for(kind: ToolKind, args: &Args<'_>) -> Result<Vec<Predicate>, ValidationError> {
    args.check_known(kind.parameters())?;
    let predicates = match kind {
        ToolKind::ByProtocol => {
            let name = args.required_str("protocol")?;
            vec![Predicate::Protocol {
                name: protocol_name(args, "protocol", name)?,
            }]
        }
        ToolKind::ByIp => {
            let raw = args.required_str("ip")?;
            let address: IpAddr = raw
                .parse()
                .map_err(|_| args.invalid("ip", &format!("'{}' is not an IP address", raw)))?;
            let direction = match args.optional_str("direction")? {
                Some(d) => d
                    .parse::<HostDirection>()
                    .map_err(|e| args.invalid("direction", &e))?,
                None => HostDirection::Any,
            };
            let mut predicates = vec![Predicate::Host { address, direction }];
            if let Some(p) = args.optional_str("protocol")? {
                predicates.push(Predicate::Protocol {
                    name: protocol_name(args, "protocol", p)?,
                });
            }
            predicates
        }
        ToolKind::ByOperation => {
            let operation = args.required_str("operation")?;
            if !OPERATION_NAME.is_match(operation) {
                return Err(args.invalid("operation", "not a valid operation name"));
            }
            let protocol = args
                .optional_str("protocol")?
                .map(|p| protocol_name(args, "protocol", p))
                .transpose()?;
            vec![Predicate::Operation {
                protocol,
                operation: operation.to_string(),
            }]
        }
        ToolKind::ByTimeRange => vec![Predicate::TimeRange {
            start: args.required_instant("start")?,
            end: args.required_instant("end")?,
        }],
        ToolKind::ByIndex => {
            let lo = args
                .optional_index("start")?
                .ok_or_else(|| args.missing("start"))?;
            let hi = args.optional_index("end")?.unwrap_or(lo);
            vec![Predicate::IndexRange { lo, hi }]
        }
        ToolKind::ByField => {
            let protocol = protocol_name(args, "protocol", args.required_str("protocol")?)?;
            let field = args.required_str("field")?.to_ascii_lowercase();
            if !FIELD_NAME.is_match(&field) {
                return Err(args.invalid("field", "not a valid field name"));
            }
            let value = args.required_scalar("value")?;
            match args.optional_str("match")?.map(str::to_ascii_lowercase).as_deref() {
                None | Some("equals") => vec![Predicate::FieldEquals {
                    protocol,
                    field,
                    value,
                }],
                Some("contains") => vec![Predicate::FieldContains {
                    protocol,
                    field,
                    value,
                }],
                Some(other) => {
                    return Err(args.invalid(
                        "match",
                        &format!("expected 'equals' or 'contains', got '{}'", other),
                    ))
                }
            }
        }
        ToolKind::Conjunction | ToolKind::Summary => Vec::new(),
    };
    Ok(predicates)
}

fn protocol_name(args: &Args<'_>, key: &str, raw: &str) -> Result<String, ValidationError> {
    let name = raw.to_ascii_lowercase();
    if PROTOCOL_NAME.is_match(&name) {
        Ok(name)
    } else {
        Err(args.invalid(key, &format!("'{}' is not a protocol name", raw)))
    }
}

/// Typed accessors over one call's argument object.
struct Args<'a> {
    tool: &'a str,
    map: &'a Map<String, Value>,
}

impl<'a> Args<'a> {
    fn check_known(&self, allowed: &[&str]) -> Result<(), ValidationError> {
        match self.map.keys().find(|k| !allowed.contains(&k.as_str())) {
            Some(key) => Err(ValidationError::UnexpectedParameter {
                tool: self.tool.to_string(),
                parameter: key.clone(),
            }),
            None => Ok(()),
        }
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|v| !v.is_null())
    }

    fn optional_str(&self, key: &str) -> Result<Option<&'a str>, ValidationError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => {
                let s = s.trim();
                if s.is_empty() {
                    Err(self.invalid(key, "must not be empty"))
                } else if s.chars().count() > MAX_VALUE_CHARS {
                    Err(self.invalid(key, "value is too long"))
                } else {
                    Ok(Some(s))
                }
            }
            Some(_) => Err(self.wrong_type(key, "a string")),
        }
    }

    fn required_str(&self, key: &str) -> Result<&'a str, ValidationError> {
        self.optional_str(key)?.ok_or_else(|| self.missing(key))
    }

    /// A string, number or boolean, as text.
    fn required_scalar(&self, key: &str) -> Result<String, ValidationError> {
        match self.get(key) {
            None => Err(self.missing(key)),
            Some(Value::String(_)) => Ok(self.required_str(key)?.to_string()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(Value::Bool(b)) => Ok(b.to_string()),
            Some(_) => Err(self.wrong_type(key, "a string, number or boolean")),
        }
    }

    /// A 1-based frame number.
    fn optional_index(&self, key: &str) -> Result<Option<u64>, ValidationError> {
        let n = match self.get(key) {
            None => return Ok(None),
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
            Some(_) => None,
        };
        match n {
            Some(0) => Err(self.invalid(key, "frame numbers start at 1")),
            Some(n) => Ok(Some(n)),
            None => Err(self.wrong_type(key, "a positive integer")),
        }
    }

    fn required_instant(&self, key: &str) -> Result<DateTime<Utc>, ValidationError> {
        let parsed = match self.get(key) {
            None => return Err(self.missing(key)),
            Some(Value::String(s)) => parse_epoch(s),
            Some(Value::Number(n)) => n.as_f64().and_then(epoch_from_f64),
            Some(_) => return Err(self.wrong_type(key, "a timestamp string or epoch seconds")),
        };
        parsed.ok_or_else(|| self.invalid(key, "not an RFC 3339 timestamp or epoch seconds"))
    }

    fn missing(&self, key: &str) -> ValidationError {
        ValidationError::MissingParameter {
            tool: self.tool.to_string(),
            parameter: key.to_string(),
        }
    }

    fn wrong_type(&self, key: &str, expected: &'static str) -> ValidationError {
        ValidationError::WrongType {
            tool: self.tool.to_string(),
            parameter: key.to_string(),
            expected,
        }
    }

    fn invalid(&self, key: &str, reason: &str) -> ValidationError {
        ValidationError::InvalidValue {
            tool: self.tool.to_string(),
            parameter: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

fn epoch_from_f64(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
    Utc.timestamp_opt(whole as i64, nanos).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, args: Value) -> ToolCall {
        ToolCall::new("call_1", name, args)
    }

    fn filter_query(result: ValidatedCall) -> Query {
        match result.action {
            ToolAction::Filter(q) => q,
            ToolAction::Summary(_) => panic!("expected a filter"),
        }
    }

    // ---- tool names and argument shape ----

    #[test]
    fn test_unknown_tool() {
        let err = validate_call(&call("drop_table", json!({})), 8).unwrap_err();
        assert_eq!(err, ValidationError::UnknownTool("drop_table".to_string()));
    }

    #[test]
    fn test_string_encoded_arguments() {
        let c = call("filter_packets_by_protocol", json!("{\"protocol\": \"NFS\"}"));
        let q = filter_query(validate_call(&c, 8).unwrap());
        assert_eq!(
            q.predicates(),
            &[Predicate::Protocol {
                name: "nfs".to_string()
            }]
        );
    }

    #[test]
    fn test_malformed_arguments() {
        let c = call("filter_packets_by_protocol", json!("{protocol: nfs"));
        assert!(matches!(
            validate_call(&c, 8),
            Err(ValidationError::MalformedArguments { .. })
        ));
        let c = call("filter_packets_by_protocol", json!([1, 2]));
        assert!(matches!(
            validate_call(&c, 8),
            Err(ValidationError::MalformedArguments { .. })
        ));
    }

    #[test]
    fn test_unexpected_parameter() {
        let c = call(
            "filter_packets_by_protocol",
            json!({"protocol": "nfs", "limit": 5}),
        );
        assert_eq!(
            validate_call(&c, 8).unwrap_err(),
            ValidationError::UnexpectedParameter {
                tool: "filter_packets_by_protocol".to_string(),
                parameter: "limit".to_string(),
            }
        );
    }

    // ---- per-tool parameters ----

    #[test]
    fn test_missing_and_wrong_type() {
        let c = call("filter_packets_by_protocol", json!({}));
        assert!(matches!(
            validate_call(&c, 8),
            Err(ValidationError::MissingParameter { .. })
        ));
        let c = call("filter_packets_by_protocol", json!({"protocol": 7}));
        assert!(matches!(
            validate_call(&c, 8),
            Err(ValidationError::WrongType { .. })
        ));
        let c = call("filter_packets_by_protocol", json!({"protocol": "  "}));
        assert!(matches!(
            validate_call(&c, 8),
            Err(ValidationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_protocol_name_rejects_injection() {
        let c = call(
            "filter_packets_by_protocol",
            json!({"protocol": "nfs; rm -rf /"}),
        );
        assert!(matches!(
            validate_call(&c, 8),
            Err(ValidationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_ip_filter() {
        let c = call(
            "filter_packets_by_ip",
            json!({"ip": "10.0.0.1", "direction": "src", "protocol": "nfs"}),
        );
        let q = filter_query(validate_call(&c, 8).unwrap());
        assert_eq!(q.len(), 2);
        assert_eq!(
            q.predicates()[0],
            Predicate::Host {
                address: "10.0.0.1".parse().unwrap(),
                direction: HostDirection::Src,
            }
        );

        let c = call("filter_packets_by_ip", json!({"ip": "10.0.0.300"}));
        assert!(matches!(
            validate_call(&c, 8),
            Err(ValidationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_operation_filter() {
        let c = call(
            "filter_packets_by_operation",
            json!({"operation": "READ", "protocol": "NFS"}),
        );
        let q = filter_query(validate_call(&c, 8).unwrap());
        assert_eq!(
            q.predicates(),
            &[Predicate::Operation {
                protocol: Some("nfs".to_string()),
                operation: "READ".to_string(),
            }]
        );
    }

    #[test]
    fn test_time_range_accepts_both_forms() {
        let c = call(
            "filter_packets_by_time_range",
            json!({"start": 1700000000.5, "end": "2023-11-14T22:13:30Z"}),
        );
        let q = filter_query(validate_call(&c, 8).unwrap());
        match &q.predicates()[0] {
            Predicate::TimeRange { start, end } => {
                assert_eq!(start.timestamp(), 1_700_000_000);
                assert_eq!(start.timestamp_subsec_millis(), 500);
                assert_eq!(end.timestamp(), 1_700_000_010);
            }
            other => panic!("unexpected predicate {:?}", other),
        }

        let c = call(
            "filter_packets_by_time_range",
            json!({"start": "yesterday", "end": 1}),
        );
        assert!(matches!(
            validate_call(&c, 8),
            Err(ValidationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_index_filter() {
        let c = call("filter_packets_by_index", json!({"start": 5}));
        let q = filter_query(validate_call(&c, 8).unwrap());
        assert_eq!(q.predicates(), &[Predicate::IndexRange { lo: 5, hi: 5 }]);

        let c = call("filter_packets_by_index", json!({"start": 0}));
        assert!(matches!(
            validate_call(&c, 8),
            Err(ValidationError::InvalidValue { .. })
        ));
        let c = call("filter_packets_by_index", json!({"start": -3}));
        assert!(matches!(
            validate_call(&c, 8),
            Err(ValidationError::WrongType { .. })
        ));
    }

    #[test]
    fn test_field_filter() {
        let c = call(
            "filter_packets_by_field",
            json!({"protocol": "http", "field": "Host", "value": "example", "match": "contains"}),
        );
        let q = filter_query(validate_call(&c, 8).unwrap());
        assert_eq!(
            q.predicates(),
            &[Predicate::FieldContains {
                protocol: "http".to_string(),
                field: "host".to_string(),
                value: "example".to_string(),
            }]
        );

        let c = call(
            "filter_packets_by_field",
            json!({"protocol": "tcp", "field": "dst_port", "value": 2049}),
        );
        let q = filter_query(validate_call(&c, 8).unwrap());
        assert!(matches!(&q.predicates()[0], Predicate::FieldEquals { value, .. } if value == "2049"));
    }

    // ---- conjunction ----

    #[test]
    fn test_conjunction() {
        let c = call(
            "filter_packets",
            json!({"filters": [
                {"type": "protocol", "protocol": "nfs"},
                {"type": "operation", "operation": "write"},
                {"type": "index", "start": 10, "end": 20}
            ]}),
        );
        let q = filter_query(validate_call(&c, 8).unwrap());
        assert_eq!(q.len(), 3);
    }

    #[test]
    fn test_conjunction_limits() {
        let filters: Vec<Value> = (0..3)
            .map(|_| json!({"type": "protocol", "protocol": "tcp"}))
            .collect();
        let c = call("filter_packets", json!({ "filters": filters }));
        assert_eq!(
            validate_call(&c, 2).unwrap_err(),
            ValidationError::TooManyFilters { count: 3, limit: 2 }
        );

        let c = call("filter_packets", json!({"filters": []}));
        assert!(matches!(
            validate_call(&c, 2),
            Err(ValidationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_conjunction_nested_errors_name_position() {
        let c = call(
            "filter_packets",
            json!({"filters": [{"type": "protocol", "protocol": "nfs"}, {"type": "teleport"}]}),
        );
        match validate_call(&c, 8).unwrap_err() {
            ValidationError::InvalidValue { tool, parameter, .. } => {
                assert_eq!(tool, "filter_packets.filters[1]");
                assert_eq!(parameter, "type");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    // ---- summary ----

    #[test]
    fn test_summary_call() {
        let c = call("capture_summary", Value::Null);
        let v = validate_call(&c, 8).unwrap();
        assert_eq!(v.action, ToolAction::Summary(Query::new()));

        let c = call("capture_summary", json!({"protocol": "DNS"}));
        let v = validate_call(&c, 8).unwrap();
        assert_eq!(v.query().len(), 1);
    }
}
