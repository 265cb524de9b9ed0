use super::*;

/// Consistent snapshot of the pipeline at a micro-batch boundary: every
/// message before `source_offset` has been folded into `window_state`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Checkpoint {
    pub batch_id: u64,
    /// Next offset to read from the source.
    pub source_offset: Offset,
    pub watermark: Option<EventTime>,
    /// Serialized aggregator state, keyed by aggregator name.
    pub window_state: BTreeMap<String, Vec<u8>>,
    pub created_at_ms: i64,
}

impl Checkpoint {
    pub fn state_for(&self, aggregator: &str) -> Option<&[u8]> {
        self.window_state.get(aggregator).map(Vec::as_slice)
    }
}
