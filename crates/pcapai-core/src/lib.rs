//! Shared model for pcapai.
//!
//! Holds the packet record model, the raw parser event shape, the
//! top-level error type and the TOML configuration.

pub mod config;
pub mod error;
pub mod raw;
pub mod types;

pub use config::PcapAiConfig;
pub use error::{PcapAiError, Result};
pub use raw::{RawEvent, RawLayer};
pub use types::*;
