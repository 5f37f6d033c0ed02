//! Protocol plugins and ingestion.
//!
//! Turns raw parser events into [`PacketRecord`](pcapai_core::PacketRecord)s.
//! Each built-in plugin promotes the fields of one protocol layer; layers no
//! plugin claims are copied verbatim by the pass-through plugin.

pub mod error;
pub mod ingest;
pub mod plugin;
pub mod plugins;
pub mod registry;

pub use error::IngestError;
pub use ingest::{ingest, parse_epoch, IngestReport};
pub use plugin::{BuiltinPlugin, ProtocolPlugin};
pub use registry::{protocol_aliases, PluginRegistry};
