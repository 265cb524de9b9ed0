use super::*;

/// Fixed-size, non-overlapping event-time windows aligned to multiples of the
/// size, starting at the epoch.
#[derive(Debug, Clone, Copy)]
pub struct TumblingEventTimeWindows {
    size_ms: i64,
}

impl TumblingEventTimeWindows {
    /// Windows of `size`, clamped to at least 1ms and at most
    /// `EventTime::MAX` milliseconds. [`PipelineConfig::validate`] rejects
    /// sizes outside that range up front.
    ///
    /// [`PipelineConfig::validate`]: crate::config::PipelineConfig::validate
    pub fn of(size: Duration) -> Self {
        Self {
            size_ms: duration_millis(size).unwrap_or(EventTime::MAX).max(1),
        }
    }

    /// The single window containing `timestamp`. Euclidean remainder keeps
    /// pre-epoch timestamps aligned too.
    pub fn assign_window(&self, timestamp: EventTime) -> TimeWindow {
        let start = timestamp - timestamp.rem_euclid(self.size_ms);
        TimeWindow::new(start, start.saturating_add(self.size_ms))
    }
}
