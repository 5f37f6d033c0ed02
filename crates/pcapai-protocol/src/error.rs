//! Error types for ingestion.

/// Why a single raw event was rejected during ingestion.
///
/// Never escapes [`ingest`](crate::ingest); rejected events are counted in
/// the [`IngestReport`](crate::IngestReport).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestError {
    #[error("event has no frame number")]
    MissingIndex,
    #[error("frame {0} has no capture timestamp")]
    MissingTimestamp(u64),
    #[error("frame {index} has an unparseable timestamp: {value}")]
    InvalidTimestamp { index: u64, value: String },
    #[error("frame {index} does not follow frame {previous}")]
    NonIncreasingIndex { index: u64, previous: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_error_display() {
        assert_eq!(IngestError::MissingIndex.to_string(), "event has no frame number");
        assert_eq!(
            IngestError::MissingTimestamp(4).to_string(),
            "frame 4 has no capture timestamp"
        );
        let err = IngestError::NonIncreasingIndex {
            index: 3,
            previous: 5,
        };
        assert_eq!(err.to_string(), "frame 3 does not follow frame 5");
    }
}
