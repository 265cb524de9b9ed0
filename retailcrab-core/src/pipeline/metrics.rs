use super::*;

/// Counters for one micro-batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub batch_id: u64,
    pub received: u64,
    pub decoded: u64,
    pub decode_failures: u64,
    pub late_dropped: u64,
    pub raw_emitted: u64,
    pub global_windows_emitted: u64,
    pub country_windows_emitted: u64,
    /// Open `(window, key)` pairs across both aggregators after the batch.
    pub open_windows: u64,
    /// Records failed sinks discarded since the previous batch was reported.
    /// Sink workers run behind the loop, so a discard is counted in the
    /// batch during which it was observed.
    pub sink_records_discarded: u64,
    /// Sinks in the failed state at the end of the batch.
    pub failed_sinks: u64,
}

/// Totals over a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineMetrics {
    pub batches: u64,
    pub received: u64,
    pub decoded: u64,
    pub decode_failures: u64,
    pub late_dropped: u64,
    pub raw_emitted: u64,
    pub global_windows_emitted: u64,
    pub country_windows_emitted: u64,
    /// Sinks that exhausted their retries.
    pub sink_failures: u64,
    /// Records discarded by failed sinks.
    pub sink_records_discarded: u64,
    pub checkpoints_written: u64,
}

impl PipelineMetrics {
    pub fn record_batch(&mut self, stats: &BatchStats) {
        self.batches += 1;
        self.received += stats.received;
        self.decoded += stats.decoded;
        self.decode_failures += stats.decode_failures;
        self.late_dropped += stats.late_dropped;
        self.raw_emitted += stats.raw_emitted;
        self.global_windows_emitted += stats.global_windows_emitted;
        self.country_windows_emitted += stats.country_windows_emitted;
    }

    pub fn record_sinks(&mut self, statuses: &[SinkStatus]) {
        self.sink_failures = statuses.iter().filter(|s| s.is_failed()).count() as u64;
        self.sink_records_discarded = statuses.iter().map(|s| s.discarded).sum();
    }
}
