//! Raw events to packet records.
//!
//! Pure transform: no I/O. A structurally malformed event is skipped and
//! counted; one bad event never aborts the capture.

use chrono::{DateTime, TimeZone, Utc};
use pcapai_core::raw::FRAME_LAYER;
use pcapai_core::{Fields, PacketRecord, RawEvent, RawLayer};
use tracing::{debug, info};

use crate::error::IngestError;
use crate::plugin::ProtocolPlugin;
use crate::registry::PluginRegistry;

/// Outcome of ingesting one capture.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    /// Accepted records in capture order.
    pub records: Vec<PacketRecord>,
    /// Events rejected as structurally malformed.
    pub skipped: usize,
    /// Records whose timestamp was raised to keep the sequence non-decreasing.
    pub timestamp_adjustments: usize,
}

/// Convert raw events into records, running every applicable plugin.
///
/// Plugins run over a record's layers from the innermost (most specific) to
/// the outermost; the first value written for a `(protocol, field)` key wins.
/// Layers without a registered plugin are copied by the pass-through plugin
/// after all registered plugins have run.
pub fn ingest<I>(events: I, registry: &PluginRegistry) -> IngestReport
where
    I: IntoIterator<Item = RawEvent>,
{
    let mut report = IngestReport::default();
    let mut last: Option<(u64, DateTime<Utc>)> = None;

    for event in events {
        let (index, mut timestamp) = match frame_metadata(&event) {
            Ok(meta) => meta,
            Err(e) => {
                debug!(reason = %e, "Skipping raw event");
                report.skipped += 1;
                continue;
            }
        };

        if let Some((previous, previous_ts)) = last {
            if index <= previous {
                let e = IngestError::NonIncreasingIndex { index, previous };
                debug!(reason = %e, "Skipping raw event");
                report.skipped += 1;
                continue;
            }
            if timestamp < previous_ts {
                debug!(index, "Clamping out-of-order timestamp to predecessor");
                timestamp = previous_ts;
                report.timestamp_adjustments += 1;
            }
        }
        last = Some((index, timestamp));

        report.records.push(build_record(index, timestamp, event, registry));
    }

    info!(
        records = report.records.len(),
        skipped = report.skipped,
        timestamp_adjustments = report.timestamp_adjustments,
        "Ingestion complete"
    );
    report
}

fn build_record(
    index: u64,
    timestamp: DateTime<Utc>,
    event: RawEvent,
    registry: &PluginRegistry,
) -> PacketRecord {
    let frame_length = event
        .frame()
        .and_then(|f| f.get_i64("frame.len"))
        .and_then(|len| u64::try_from(len).ok());

    let mut protocols: Vec<String> = Vec::new();
    for layer in event.protocol_layers() {
        if !protocols.contains(&layer.name) {
            protocols.push(layer.name.clone());
        }
    }

    let mut fields = Fields::new();
    let mut unclaimed: Vec<&RawLayer> = Vec::new();
    for layer in event.protocol_layers().collect::<Vec<_>>().into_iter().rev() {
        match registry.get(&layer.name) {
            Some(plugin) => merge(&mut fields, plugin.name(), plugin.extract(layer)),
            None => unclaimed.push(layer),
        }
    }
    let fallback = registry.fallback();
    for layer in unclaimed {
        merge(&mut fields, &layer.name, fallback.extract(layer));
    }

    let raw_layers: Vec<RawLayer> = event
        .layers
        .into_iter()
        .filter(|l| l.name != FRAME_LAYER)
        .collect();

    PacketRecord::new(index, timestamp, protocols, frame_length, fields, raw_layers)
}

fn merge(fields: &mut Fields, namespace: &str, extracted: pcapai_core::FieldMap) {
    for (key, value) in extracted {
        fields.insert_if_absent(namespace, &key, value);
    }
}

fn frame_metadata(event: &RawEvent) -> Result<(u64, DateTime<Utc>), IngestError> {
    let frame = event.frame().ok_or(IngestError::MissingIndex)?;
    let index = frame
        .get_i64("frame.number")
        .and_then(|n| u64::try_from(n).ok())
        .filter(|n| *n > 0)
        .ok_or(IngestError::MissingIndex)?;
    let raw_ts = frame
        .get_str("frame.time_epoch")
        .ok_or(IngestError::MissingTimestamp(index))?;
    let timestamp = parse_epoch(&raw_ts).ok_or_else(|| IngestError::InvalidTimestamp {
        index,
        value: raw_ts.clone(),
    })?;
    Ok((index, timestamp))
}

/// Parse a capture timestamp.
///
/// Accepts `seconds[.fraction]` since the Unix epoch (nanosecond precision,
/// no float rounding) and RFC 3339.
pub fn parse_epoch(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    let (secs, fraction) = match text.split_once('.') {
        Some((s, f)) => (s, f),
        None => (text, ""),
    };
    let secs: i64 = secs.parse().ok()?;
    if !fraction.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let digits: String = fraction.chars().chain(std::iter::repeat('0')).take(9).collect();
    let nanos: u32 = digits.parse().ok()?;
    Utc.timestamp_opt(secs, nanos).single()
}
