use super::*;

/// Event-time interval `[start, end)` in epoch milliseconds.
///
/// Windows order by `start`, then `end`; for tumbling windows that is also
/// ascending `end`, which is the order in which they are finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: EventTime,
    pub end: EventTime,
}

impl TimeWindow {
    pub fn new(start: EventTime, end: EventTime) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, timestamp: EventTime) -> bool {
        (self.start..self.end).contains(&timestamp)
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {})",
            format_event_time(self.start),
            format_event_time(self.end)
        )
    }
}

/// One finalized `(window, key)` aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowResult<K, OUT> {
    pub window: TimeWindow,
    pub key: K,
    pub value: OUT,
}
