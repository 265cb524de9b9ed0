//! Error taxonomy of the engine.
//!
//! Only [`CheckpointError`] is fatal for a run. Decode and late-event errors
//! are counted per batch; sink errors are retried and then isolated to the
//! sink that produced them.

use crate::types::EventTime;

/// A payload that could not be turned into a [`TransactionEvent`](crate::types::TransactionEvent).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("malformed payload ({} bytes): {reason}", .payload.len())]
pub struct DecodeError {
    pub reason: String,
    /// Raw payload, kept for diagnostics.
    pub payload: Vec<u8>,
}

impl DecodeError {
    pub fn new(reason: impl Into<String>, payload: &[u8]) -> Self {
        Self {
            reason: reason.into(),
            payload: payload.to_vec(),
        }
    }

    /// Payload as lossy UTF-8, truncated for log lines.
    pub fn payload_preview(&self, max_len: usize) -> String {
        let text = String::from_utf8_lossy(&self.payload);
        if text.chars().count() <= max_len {
            text.into_owned()
        } else {
            let cut: String = text.chars().take(max_len).collect();
            format!("{cut}...")
        }
    }
}

/// An event that arrived after its window could no longer accept it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("late event at {timestamp}ms (watermark {watermark}ms, allowed lateness {allowed_lateness_ms}ms)")]
pub struct LateEventError {
    pub timestamp: EventTime,
    pub watermark: EventTime,
    pub allowed_lateness_ms: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("sink I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("record serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("sink rejected write: {0}")]
    Rejected(String),

    #[error("sink {0} is no longer accepting records")]
    Closed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O failed at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint encoding failed: {0}")]
    Encode(#[source] bincode::Error),

    #[error("checkpoint decoding failed: {0}")]
    Decode(#[source] bincode::Error),

    #[error("unsupported checkpoint format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("checkpoint store unavailable: {0}")]
    Unavailable(String),
}

impl CheckpointError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
