use thiserror::Error;

/// Top-level error type for pcapai.
///
/// Each variant wraps a subsystem failure. Subsystem crates define their own
/// error types and implement `From<SubsystemError> for PcapAiError` so that
/// the `?` operator works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PcapAiError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capture parse error: {0}")]
    Parse(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Chat error: {0}")]
    Chat(String),

    #[error("No capture loaded")]
    NoCapture,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for PcapAiError {
    fn from(err: toml::de::Error) -> Self {
        PcapAiError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for PcapAiError {
    fn from(err: toml::ser::Error) -> Self {
        PcapAiError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for PcapAiError {
    fn from(err: serde_json::Error) -> Self {
        PcapAiError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for pcapai operations.
pub type Result<T> = std::result::Result<T, PcapAiError>;
