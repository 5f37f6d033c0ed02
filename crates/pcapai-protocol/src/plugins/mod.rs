//! Built-in protocol plugins.

mod application;
mod file_sharing;
mod link;
mod network;
mod passthrough;
mod transport;

pub use application::{DnsPlugin, HttpPlugin, TlsPlugin};
pub use file_sharing::{NfsPlugin, Smb2Plugin};
pub use link::{ArpPlugin, EthernetPlugin};
pub use network::{IcmpPlugin, Ipv4Plugin, Ipv6Plugin};
pub use passthrough::PassThroughPlugin;
pub use transport::{TcpPlugin, UdpPlugin};

/// Name of the canonical per-protocol operation field.
pub const OPERATION_FIELD: &str = "operation";
