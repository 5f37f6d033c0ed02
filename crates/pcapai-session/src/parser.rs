//! Capture parser boundary.
//!
//! The external dissector is authoritative: the core never interprets wire
//! bytes itself. [`TsharkParser`] runs `tshark -T json` on a capture and
//! [`JsonExportParser`] reads a file already exported in that format; both
//! decode through [`decode_tshark_json`].

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::process::Command;

use pcapai_core::raw::FRAME_LAYER;
use pcapai_core::{RawEvent, RawLayer};
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::ParseError;

/// Turns a capture file into raw per-packet events, in capture order.
pub trait CaptureParser: Send + Sync {
    fn parse(&self, path: &Path) -> Result<Vec<RawEvent>, ParseError>;
}

// =============================================================================
// tshark
// =============================================================================

/// Runs the Wireshark command-line dissector.
#[derive(Debug, Clone)]
pub struct TsharkParser {
    program: String,
}

impl TsharkParser {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for TsharkParser {
    fn default() -> Self {
        Self::new("tshark")
    }
}

impl CaptureParser for TsharkParser {
    fn parse(&self, path: &Path) -> Result<Vec<RawEvent>, ParseError> {
        let format = sniff_format(path)?;
        debug!(path = %path.display(), format, "Running {}", self.program);

        let output = Command::new(&self.program)
            .arg("-r")
            .arg(path)
            .args(["-T", "json", "--no-duplicate-keys"])
            .output()
            .map_err(|e| {
                ParseError::ParserFailed(format!("failed to run {}: {}", self.program, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ParseError::ParserFailed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let events = decode_tshark_json(&output.stdout)?;
        info!(path = %path.display(), events = events.len(), "Capture dissected");
        Ok(events)
    }
}

/// Identify a capture container from its magic number.
fn sniff_format(path: &Path) -> Result<&'static str, ParseError> {
    let mut magic = [0u8; 4];
    let mut file = File::open(path).map_err(|e| ParseError::Unreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    file.read_exact(&mut magic).map_err(|_| {
        ParseError::UnsupportedFormat(format!("{} is too short to be a capture", path.display()))
    })?;
    match magic {
        [0xd4, 0xc3, 0xb2, 0xa1] | [0xa1, 0xb2, 0xc3, 0xd4] => Ok("pcap"),
        [0x4d, 0x3c, 0xb2, 0xa1] | [0xa1, 0xb2, 0x3c, 0x4d] => Ok("pcap-ns"),
        [0x0a, 0x0d, 0x0d, 0x0a] => Ok("pcapng"),
        other => Err(ParseError::UnsupportedFormat(format!(
            "{}: unrecognized magic {:02x}{:02x}{:02x}{:02x}",
            path.display(),
            other[0],
            other[1],
            other[2],
            other[3]
        ))),
    }
}

// =============================================================================
// Pre-exported JSON
// =============================================================================

/// Reads a capture previously exported with `tshark -T json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonExportParser;

impl CaptureParser for JsonExportParser {
    fn parse(&self, path: &Path) -> Result<Vec<RawEvent>, ParseError> {
        let bytes = std::fs::read(path).map_err(|e| ParseError::Unreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        decode_tshark_json(&bytes)
    }
}

/// Picks [`JsonExportParser`] for `.json` exports and tshark for everything else.
#[derive(Debug, Clone, Default)]
pub struct AutoParser {
    tshark: TsharkParser,
}

impl AutoParser {
    pub fn new(tshark_program: impl Into<String>) -> Self {
        Self {
            tshark: TsharkParser::new(tshark_program),
        }
    }
}

impl CaptureParser for AutoParser {
    fn parse(&self, path: &Path) -> Result<Vec<RawEvent>, ParseError> {
        if is_json_export(path) {
            debug!(path = %path.display(), "Reading pre-exported JSON");
            JsonExportParser.parse(path)
        } else {
            self.tshark.parse(path)
        }
    }
}

fn is_json_export(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode `tshark -T json` output into raw events.
///
/// Each layer's nested subtrees are flattened into one dictionary; a key
/// seen more than once (e.g. one `nfs.opcode` per compound operation)
/// becomes a list. Repeated keys are kept whether tshark wrote them as
/// duplicate object keys or, with `--no-duplicate-keys`, as arrays. Layers
/// are ordered by the frame's `frame.protocols` chain. A packet entry
/// without layers becomes an empty event, which ingestion then counts as
/// skipped.
pub fn decode_tshark_json(bytes: &[u8]) -> Result<Vec<RawEvent>, ParseError> {
    let root: Node =
        serde_json::from_slice(bytes).map_err(|e| ParseError::Malformed(e.to_string()))?;
    let packets = match root {
        Node::Array(items) => items,
        _ => {
            return Err(ParseError::Malformed(
                "expected a JSON array of packets".to_string(),
            ))
        }
    };
    Ok(packets.iter().map(decode_packet).collect())
}

type Entries = [(String, Node)];

/// JSON tree that keeps every occurrence of a repeated object key, in
/// document order.
#[derive(Debug, Clone, PartialEq)]
enum Node {
    Scalar(Value),
    Array(Vec<Node>),
    Object(Vec<(String, Node)>),
}

impl Node {
    fn as_object(&self) -> Option<&Entries> {
        match self {
            Node::Object(entries) => Some(entries.as_slice()),
            _ => None,
        }
    }

    /// First occurrence of `key`.
    fn get(&self, key: &str) -> Option<&Node> {
        self.as_object()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    fn as_str(&self) -> Option<&str> {
        match self {
            Node::Scalar(Value::String(s)) => Some(s),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(NodeVisitor)
    }
}

struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = Node;

    fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Node, E> {
        Ok(Node::Scalar(Value::Bool(v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Node, E> {
        Ok(Node::Scalar(Value::from(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Node, E> {
        Ok(Node::Scalar(Value::from(v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Node, E> {
        Ok(Node::Scalar(Value::from(v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Node, E> {
        Ok(Node::Scalar(Value::String(v.to_string())))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Node, E> {
        Ok(Node::Scalar(Value::String(v)))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Node, E> {
        Ok(Node::Scalar(Value::Null))
    }

    fn visit_none<E: de::Error>(self) -> Result<Node, E> {
        Ok(Node::Scalar(Value::Null))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Node, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Node::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Node, A::Error> {
        let mut entries = Vec::new();
        while let Some((key, value)) = map.next_entry::<String, Node>()? {
            entries.push((key, value));
        }
        Ok(Node::Object(entries))
    }
}

fn decode_packet(packet: &Node) -> RawEvent {
    let Some(layers) = packet
        .get("_source")
        .and_then(|source| source.get("layers"))
        .and_then(Node::as_object)
    else {
        return RawEvent::default();
    };

    // Each layer name maps to its occurrences, outermost first (tunnels
    // repeat layers).
    let mut pending: BTreeMap<&str, Vec<&Entries>> = BTreeMap::new();
    for (name, value) in layers {
        let entry = pending.entry(name.as_str()).or_default();
        match value {
            Node::Object(map) => entry.push(map.as_slice()),
            Node::Array(items) => entry.extend(items.iter().filter_map(Node::as_object)),
            Node::Scalar(_) => {}
        }
    }

    let chain: Vec<String> = pending
        .get(FRAME_LAYER)
        .and_then(|frames| frames.first())
        .and_then(|frame| frame.iter().find(|(k, _)| k == "frame.protocols"))
        .and_then(|(_, v)| v.as_str())
        .map(|s| s.split(':').map(str::to_string).collect())
        .unwrap_or_default();

    let mut ordered = Vec::new();
    if let Some(frame) = pending.get_mut(FRAME_LAYER).and_then(|v| pop_front(v)) {
        ordered.push(flatten_layer(FRAME_LAYER, frame));
    }
    for name in &chain {
        if let Some(map) = pending.get_mut(name.as_str()).and_then(|v| pop_front(v)) {
            ordered.push(flatten_layer(name, map));
        }
    }
    // Anything the chain did not mention keeps its position at the end.
    for (name, maps) in pending {
        for map in maps {
            ordered.push(flatten_layer(name, map));
        }
    }
    RawEvent::new(ordered)
}

fn pop_front<T>(items: &mut Vec<T>) -> Option<T> {
    if items.is_empty() {
        None
    } else {
        Some(items.remove(0))
    }
}

fn flatten_layer(name: &str, map: &Entries) -> RawLayer {
    let mut layer = RawLayer::new(name);
    flatten_into(&mut layer.fields, map);
    layer
}

fn flatten_into(out: &mut BTreeMap<String, Value>, map: &Entries) {
    for (key, value) in map {
        flatten_value(out, key, value);
    }
}

fn flatten_value(out: &mut BTreeMap<String, Value>, key: &str, value: &Node) {
    match value {
        Node::Object(sub) => flatten_into(out, sub),
        Node::Array(items) => {
            for item in items {
                flatten_value(out, key, item);
            }
        }
        Node::Scalar(scalar) => append(out, key, scalar.clone()),
    }
}

/// Insert a value, turning repeated keys into lists.
fn append(out: &mut BTreeMap<String, Value>, key: &str, value: Value) {
    match out.get_mut(key) {
        None => {
            out.insert(key.to_string(), value);
        }
        Some(Value::Array(existing)) => match value {
            Value::Array(more) => existing.extend(more),
            single => existing.push(single),
        },
        Some(existing) => {
            let first = existing.take();
            let mut list = vec![first];
            match value {
                Value::Array(more) => list.extend(more),
                single => list.push(single),
            }
            *existing = Value::Array(list);
        }
    }
}
