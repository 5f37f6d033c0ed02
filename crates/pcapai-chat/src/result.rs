//! Tool results as fed back to the model.
//!
//! Results are JSON documents. Record lists are capped; when a filter matches
//! more records than the cap, the document says so explicitly.

use chrono::{DateTime, Utc};
use pcapai_core::{Fields, PacketRecord};
use pcapai_filter::{CaptureSummary, Query};
use serde::Serialize;
use serde_json::json;

use crate::error::ValidationError;

/// Compact view of a record: promoted fields only, no raw layers.
#[derive(Debug, Serialize)]
struct RecordView<'a> {
    index: u64,
    timestamp: DateTime<Utc>,
    protocols: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    length: Option<u64>,
    fields: &'a Fields,
}

impl<'a> From<&'a PacketRecord> for RecordView<'a> {
    fn from(record: &'a PacketRecord) -> Self {
        Self {
            index: record.index(),
            timestamp: record.timestamp(),
            protocols: record.protocols(),
            length: record.frame_length(),
            fields: record.fields(),
        }
    }
}

/// Rendered tool output plus what the log line needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub content: String,
    pub matched: usize,
    pub truncated: bool,
}

/// Render a filter result, keeping at most `cap` records.
pub fn filter_result(tool: &str, query: &Query, matched: &[&PacketRecord], cap: usize) -> ToolOutput {
    let shown: Vec<RecordView<'_>> = matched.iter().take(cap).map(|r| RecordView::from(*r)).collect();
    let truncated = matched.len() > shown.len();
    let mut doc = json!({
        "tool": tool,
        "query": query.to_string(),
        "total_matches": matched.len(),
        "returned": shown.len(),
        "truncated": truncated,
        "records": shown,
    });
    if truncated {
        doc["truncation"] = json!(format!(
            "[TRUNCATED: showing first {} of {} matching records; narrow the filter to see the rest]",
            shown.len(),
            matched.len()
        ));
    }
    ToolOutput {
        content: doc.to_string(),
        matched: matched.len(),
        truncated,
    }
}

pub fn summary_result(tool: &str, query: &Query, summary: &CaptureSummary) -> ToolOutput {
    let doc = json!({
        "tool": tool,
        "query": query.to_string(),
        "summary": summary,
    });
    ToolOutput {
        content: doc.to_string(),
        matched: summary.total_packets,
        truncated: false,
    }
}

pub fn validation_result(tool: &str, error: &ValidationError) -> String {
    json!({
        "tool": tool,
        "error": "validation_error",
        "message": error.to_string(),
        "hint": "correct the tool name or parameters and try again",
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pcapai_filter::Predicate;
    use serde_json::Value;

    fn records(n: u64) -> Vec<PacketRecord> {
        (1..=n)
            .map(|i| {
                PacketRecord::new(
                    i,
                    Utc.timestamp_opt(1_700_000_000 + i as i64, 0).unwrap(),
                    vec!["ip".into(), "udp".into()],
                    Some(60),
                    Fields::new(),
                    Vec::new(),
                )
            })
            .collect()
    }

    #[test]
    fn test_filter_result_within_cap() {
        let all = records(3);
        let refs: Vec<&PacketRecord> = all.iter().collect();
        let out = filter_result("filter_packets_by_protocol", &Query::new(), &refs, 10);
        let doc: Value = serde_json::from_str(&out.content).unwrap();
        assert_eq!(doc["total_matches"], 3);
        assert_eq!(doc["records"].as_array().unwrap().len(), 3);
        assert_eq!(doc["truncated"], false);
        assert!(doc.get("truncation").is_none());
        assert!(!out.truncated);
    }

    #[test]
    fn test_filter_result_truncates_with_marker() {
        let all = records(25);
        let refs: Vec<&PacketRecord> = all.iter().collect();
        let query = Query::from(Predicate::Protocol { name: "udp".into() });
        let out = filter_result("filter_packets_by_protocol", &query, &refs, 10);
        let doc: Value = serde_json::from_str(&out.content).unwrap();
        assert_eq!(doc["returned"], 10);
        assert_eq!(doc["total_matches"], 25);
        assert_eq!(doc["records"][9]["index"], 10);
        assert!(doc["truncation"]
            .as_str()
            .unwrap()
            .contains("showing first 10 of 25"));
        assert!(out.truncated);
        assert_eq!(out.matched, 25);
    }

    #[test]
    fn test_validation_result_is_json() {
        let err = ValidationError::UnknownTool("nope".into());
        let doc: Value = serde_json::from_str(&validation_result("nope", &err)).unwrap();
        assert_eq!(doc["error"], "validation_error");
        assert_eq!(doc["message"], "unknown tool: nope");
    }
}
