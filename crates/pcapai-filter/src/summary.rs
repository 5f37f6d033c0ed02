//! Aggregate statistics over a record set.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use pcapai_core::{FieldValue, PacketRecord};
use serde::{Deserialize, Serialize};

/// Entries kept in each top-N table.
pub const TOP_N: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LengthStats {
    pub min: u64,
    pub avg: f64,
    pub max: u64,
}

/// Overview of a capture: counts, time span, busiest protocols, hosts, ports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureSummary {
    pub total_packets: usize,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
    pub duration_secs: f64,
    pub protocols: Vec<(String, usize)>,
    pub top_source_ips: Vec<(String, usize)>,
    pub top_destination_ips: Vec<(String, usize)>,
    pub top_source_ports: Vec<(i64, usize)>,
    pub top_destination_ports: Vec<(i64, usize)>,
    pub frame_length: Option<LengthStats>,
}

impl CaptureSummary {
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a PacketRecord>,
    {
        let mut summary = CaptureSummary::default();
        let mut protocols: HashMap<String, usize> = HashMap::new();
        let mut src_ips: HashMap<String, usize> = HashMap::new();
        let mut dst_ips: HashMap<String, usize> = HashMap::new();
        let mut src_ports: HashMap<i64, usize> = HashMap::new();
        let mut dst_ports: HashMap<i64, usize> = HashMap::new();
        let mut lengths: Option<(u64, u64, u128)> = None;
        let mut length_count = 0u64;

        for record in records {
            summary.total_packets += 1;
            let ts = record.timestamp();
            summary.first_timestamp = Some(summary.first_timestamp.map_or(ts, |f| f.min(ts)));
            summary.last_timestamp = Some(summary.last_timestamp.map_or(ts, |l| l.max(ts)));

            for protocol in record.protocols() {
                *protocols.entry(protocol.clone()).or_default() += 1;
            }

            for ns in ["ip", "ipv6"] {
                if let Some(src) = record.field(ns, "src").and_then(FieldValue::as_str) {
                    *src_ips.entry(src.to_string()).or_default() += 1;
                }
                if let Some(dst) = record.field(ns, "dst").and_then(FieldValue::as_str) {
                    *dst_ips.entry(dst.to_string()).or_default() += 1;
                }
            }

            for ns in ["tcp", "udp"] {
                if let Some(port) = record.field(ns, "src_port").and_then(FieldValue::as_i64) {
                    *src_ports.entry(port).or_default() += 1;
                }
                if let Some(port) = record.field(ns, "dst_port").and_then(FieldValue::as_i64) {
                    *dst_ports.entry(port).or_default() += 1;
                }
            }

            if let Some(len) = record.frame_length() {
                length_count += 1;
                lengths = Some(match lengths {
                    None => (len, len, len as u128),
                    Some((min, max, sum)) => (min.min(len), max.max(len), sum + len as u128),
                });
            }
        }

        if let (Some(first), Some(last)) = (summary.first_timestamp, summary.last_timestamp) {
            summary.duration_secs = (last - first).num_milliseconds() as f64 / 1000.0;
        }
        summary.protocols = top_n(protocols);
        summary.top_source_ips = top_n(src_ips);
        summary.top_destination_ips = top_n(dst_ips);
        summary.top_source_ports = top_n(src_ports);
        summary.top_destination_ports = top_n(dst_ports);
        summary.frame_length = lengths.map(|(min, max, sum)| LengthStats {
            min,
            avg: sum as f64 / length_count as f64,
            max,
        });
        summary
    }
}

/// Highest counts first; ties broken by key so output is deterministic.
fn top_n<K: Ord + Clone>(counts: HashMap<K, usize>) -> Vec<(K, usize)> {
    let mut entries: Vec<(K, usize)> = counts.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(TOP_N);
    entries
}

fn join_counts<K: fmt::Display>(entries: &[(K, usize)]) -> String {
    if entries.is_empty() {
        return "none".to_string();
    }
    entries
        .iter()
        .map(|(k, n)| format!("{} ({})", k, n))
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for CaptureSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total packets: {}", self.total_packets)?;
        if let (Some(first), Some(last)) = (self.first_timestamp, self.last_timestamp) {
            writeln!(
                f,
                "Time span: {} to {} ({:.3}s)",
                first.to_rfc3339(),
                last.to_rfc3339(),
                self.duration_secs
            )?;
        }
        writeln!(f, "Top protocols: {}", join_counts(&self.protocols))?;
        writeln!(f, "Top source IPs: {}", join_counts(&self.top_source_ips))?;
        writeln!(
            f,
            "Top destination IPs: {}",
            join_counts(&self.top_destination_ips)
        )?;
        writeln!(f, "Top source ports: {}", join_counts(&self.top_source_ports))?;
        writeln!(
            f,
            "Top destination ports: {}",
            join_counts(&self.top_destination_ports)
        )?;
        if let Some(len) = &self.frame_length {
            write!(
                f,
                "Frame length: min {} / avg {:.1} / max {} bytes",
                len.min, len.avg, len.max
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pcapai_core::Fields;

    fn record(index: u64, src: &str, dst_port: i64, len: u64) -> PacketRecord {
        let mut fields = Fields::new();
        fields.insert_if_absent("ip", "src", src.into());
        fields.insert_if_absent("ip", "dst", "10.0.0.254".into());
        fields.insert_if_absent("tcp", "dst_port", dst_port.into());
        PacketRecord::new(
            index,
            Utc.timestamp_opt(1_700_000_000 + index as i64 * 2, 0).unwrap(),
            vec!["eth".into(), "ip".into(), "tcp".into()],
            Some(len),
            fields,
            Vec::new(),
        )
    }

    #[test]
    fn test_summary_counts() {
        let records = vec![
            record(1, "10.0.0.1", 443, 60),
            record(2, "10.0.0.1", 443, 1500),
            record(3, "10.0.0.2", 80, 90),
        ];
        let summary = CaptureSummary::from_records(&records);
        assert_eq!(summary.total_packets, 3);
        assert_eq!(summary.duration_secs, 4.0);
        assert_eq!(summary.top_source_ips[0], ("10.0.0.1".to_string(), 2));
        assert_eq!(summary.top_destination_ports[0], (443, 2));
        assert_eq!(summary.protocols.len(), 3);
        let len = summary.frame_length.unwrap();
        assert_eq!(len.min, 60);
        assert_eq!(len.max, 1500);
        assert_eq!(len.avg, 550.0);
    }

    #[test]
    fn test_summary_empty() {
        let summary = CaptureSummary::from_records(std::iter::empty());
        assert_eq!(summary.total_packets, 0);
        assert!(summary.frame_length.is_none());
        assert!(summary.to_string().contains("Top protocols: none"));
    }

    #[test]
    fn test_top_n_truncates_and_orders() {
        let mut counts = HashMap::new();
        for i in 0..15 {
            counts.insert(i, 1usize);
        }
        counts.insert(99, 5);
        let top = top_n(counts);
        assert_eq!(top.len(), TOP_N);
        assert_eq!(top[0], (99, 5));
        assert_eq!(top[1], (0, 1));
    }

    #[test]
    fn test_display_lists_protocols() {
        let records = vec![record(1, "10.0.0.1", 22, 70)];
        let text = CaptureSummary::from_records(&records).to_string();
        assert!(text.contains("Total packets: 1"));
        assert!(text.contains("tcp (1)"));
        assert!(text.contains("Frame length: min 70 / avg 70.0 / max 70 bytes"));
    }
}
