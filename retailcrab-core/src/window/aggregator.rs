use super::*;

/// Keyed tumbling-window aggregation driven by the watermark.
///
/// Each `(window, key)` pair moves through
/// `OPEN -> ELIGIBLE -> EMITTED -> EVICTED`:
///
/// - **OPEN**: [`add`](Self::add) folds events into the pair's accumulator.
/// - **ELIGIBLE**: the watermark passed `window.end + allowed_lateness`.
///   Only [`advance`](Self::advance) checks this, once per micro-batch.
/// - **EMITTED/EVICTED**: `advance` returns the result and drops the
///   accumulator in the same step. Events for that window are late from then on.
///
/// State lives in a `BTreeMap` keyed by `(window, key)`, so finalized results
/// come out in ascending window order.
pub struct WindowAggregator<K, IN, ACC, OUT, KF, AF> {
    key_fn: KF,
    assigner: TumblingEventTimeWindows,
    aggregate: AF,
    allowed_lateness_ms: i64,
    windows: BTreeMap<(TimeWindow, K), ACC>,
    current_watermark: EventTime,
    _phantom: PhantomData<fn(&IN) -> OUT>,
}

#[derive(Serialize, Deserialize)]
struct WindowAggregatorSnapshot<K, ACC> {
    entries: Vec<(TimeWindow, K, ACC)>,
    current_watermark: EventTime,
}

impl<K, IN, ACC, OUT, KF, AF> WindowAggregator<K, IN, ACC, OUT, KF, AF>
where
    K: Ord + Clone + Serialize + DeserializeOwned,
    ACC: Clone + Serialize + DeserializeOwned,
    KF: Fn(&IN) -> K,
    AF: AggregateFunction<IN, ACC, OUT>,
{
    /// Create a new aggregator.
    ///
    /// - `key_fn`: extracts the grouping key from each element
    /// - `assigner`: maps timestamps to tumbling windows
    /// - `aggregate`: incremental aggregation evaluated per `(window, key)`
    /// - `allowed_lateness`: grace period past `window.end` before finalizing
    pub fn new(
        key_fn: KF,
        assigner: TumblingEventTimeWindows,
        aggregate: AF,
        allowed_lateness: Duration,
    ) -> Self {
        Self {
            key_fn,
            assigner,
            aggregate,
            allowed_lateness_ms: duration_millis(allowed_lateness).unwrap_or(EventTime::MAX),
            windows: BTreeMap::new(),
            current_watermark: EVENT_TIME_MIN,
            _phantom: PhantomData,
        }
    }

    /// Whether an event at `timestamp` is too late to be accepted:
    /// `timestamp < watermark - allowed_lateness`.
    ///
    /// The cutoff is on the event's own timestamp, not on its window. A window
    /// stays open until `end + allowed_lateness`, but once the watermark has
    /// moved past `timestamp + allowed_lateness` that event is dropped even
    /// if its window has not been finalized yet. With a `[0s, 60s)` window,
    /// 10s of lateness and a watermark of 65s, an event at 50s is late while
    /// one at 55s still lands in the open window.
    pub fn is_late(&self, timestamp: EventTime) -> bool {
        self.current_watermark != EVENT_TIME_MIN
            && timestamp < self.current_watermark.saturating_sub(self.allowed_lateness_ms)
    }

    /// Fold `element` into the window containing `timestamp`.
    ///
    /// Late elements are rejected and leave state untouched.
    pub fn add(&mut self, element: &IN, timestamp: EventTime) -> Result<(), LateEventError> {
        if self.is_late(timestamp) {
            return Err(LateEventError {
                timestamp,
                watermark: self.current_watermark,
                allowed_lateness_ms: self.allowed_lateness_ms,
            });
        }

        let window = self.assigner.assign_window(timestamp);
        let key = (self.key_fn)(element);
        let acc = self
            .windows
            .entry((window, key))
            .or_insert_with(|| self.aggregate.create_accumulator());
        self.aggregate.add(acc, element);
        Ok(())
    }

    /// Advance event time to `watermark` and finalize every window whose
    /// `end + allowed_lateness <= watermark`.
    ///
    /// Finalized windows are evicted before returning. A watermark below the
    /// current one does not move time back.
    pub fn advance(&mut self, watermark: Watermark) -> Vec<WindowResult<K, OUT>> {
        self.current_watermark = self.current_watermark.max(watermark.timestamp);
        let watermark = self.current_watermark;
        let lateness = self.allowed_lateness_ms;

        let mut fired = Vec::new();
        while let Some(entry) = self.windows.first_entry() {
            if entry.key().0.end.saturating_add(lateness) > watermark {
                break;
            }
            let ((window, key), acc) = entry.remove_entry();
            fired.push(WindowResult {
                window,
                key,
                value: self.aggregate.get_result(acc),
            });
        }
        fired
    }

    /// Current event-time watermark, `None` until the first advance.
    pub fn current_watermark(&self) -> Option<Watermark> {
        (self.current_watermark != EVENT_TIME_MIN).then(|| Watermark::new(self.current_watermark))
    }

    /// Number of `(window, key)` pairs still open.
    pub fn open_window_count(&self) -> usize {
        self.windows.len()
    }

    /// Serialize a consistent copy of all open accumulators.
    pub fn snapshot_state(&self) -> Result<Vec<u8>> {
        let snapshot = WindowAggregatorSnapshot {
            entries: self
                .windows
                .iter()
                .map(|((window, key), acc)| (*window, key.clone(), acc.clone()))
                .collect(),
            current_watermark: self.current_watermark,
        };
        bincode::serialize(&snapshot).context("serialize window state failed")
    }

    /// Replace all state with a snapshot taken by [`snapshot_state`](Self::snapshot_state).
    pub fn restore_state(&mut self, data: &[u8]) -> Result<()> {
        self.windows.clear();
        if data.is_empty() {
            self.current_watermark = EVENT_TIME_MIN;
            return Ok(());
        }

        let snapshot: WindowAggregatorSnapshot<K, ACC> =
            bincode::deserialize(data).context("deserialize window state failed")?;
        for (window, key, acc) in snapshot.entries {
            self.windows.insert((window, key), acc);
        }
        self.current_watermark = snapshot.current_watermark;
        Ok(())
    }
}
