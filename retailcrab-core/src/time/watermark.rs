use super::*;

/// Minimum possible event time. Used as the initial "nothing observed" sentinel.
pub const EVENT_TIME_MIN: EventTime = i64::MIN;

/// Whole milliseconds in `duration`, or `None` when they do not fit in an
/// [`EventTime`].
pub fn duration_millis(duration: Duration) -> Option<EventTime> {
    EventTime::try_from(duration.as_millis()).ok()
}

/// Tracks event-time progress for streams where events can arrive out of
/// order by at most `delay`.
///
/// The watermark is `max_observed - delay`: the tracker waits `delay` before
/// declaring a point in time complete. It never moves backwards, whatever the
/// arrival order, and never exceeds the maximum observed timestamp.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use retailcrab_core::time::WatermarkTracker;
///
/// let mut tracker = WatermarkTracker::new(Duration::from_secs(60));
/// tracker.observe(120_000);
/// assert_eq!(tracker.current_watermark().map(|wm| wm.timestamp), Some(60_000));
/// ```
#[derive(Debug, Clone)]
pub struct WatermarkTracker {
    delay_ms: i64,
    max_observed: EventTime,
    /// Floor restored from a checkpoint; the watermark never reports below it.
    restored: EventTime,
}

impl WatermarkTracker {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay_ms: duration_millis(delay).unwrap_or(EventTime::MAX),
            max_observed: EVENT_TIME_MIN,
            restored: EVENT_TIME_MIN,
        }
    }

    /// Notify the tracker that an event with `timestamp` was seen.
    pub fn observe(&mut self, timestamp: EventTime) {
        if timestamp > self.max_observed {
            self.max_observed = timestamp;
        }
    }

    /// Return the current watermark, or `None` before anything was observed
    /// or restored.
    pub fn current_watermark(&self) -> Option<Watermark> {
        let derived = if self.max_observed == EVENT_TIME_MIN {
            EVENT_TIME_MIN
        } else {
            self.max_observed.saturating_sub(self.delay_ms)
        };
        let ts = derived.max(self.restored);
        (ts != EVENT_TIME_MIN).then(|| Watermark::new(ts))
    }

    /// Highest event timestamp observed so far.
    pub fn max_observed(&self) -> Option<EventTime> {
        (self.max_observed != EVENT_TIME_MIN).then_some(self.max_observed)
    }

    /// Re-seed from a checkpointed watermark.
    ///
    /// The maximum observed timestamp is re-derived as `watermark + delay`,
    /// which keeps `watermark <= max_observed` after recovery.
    pub fn restore(&mut self, watermark: Watermark) {
        self.restored = self.restored.max(watermark.timestamp);
        self.observe(watermark.timestamp.saturating_add(self.delay_ms));
    }
}
