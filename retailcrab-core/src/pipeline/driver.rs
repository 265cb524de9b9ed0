use super::*;

/// Name under which the global aggregator's state is checkpointed.
pub const GLOBAL_STATE: &str = "global";
/// Name under which the per-country aggregator's state is checkpointed.
pub const COUNTRY_STATE: &str = "country";

/// Upper bound on one blocking poll, so cancellation is noticed promptly.
const CANCEL_CHECK_INTERVAL: Duration = Duration::from_millis(500);

const PAYLOAD_PREVIEW_LEN: usize = 256;

/// The streaming job: one ingestion loop that owns the watermark tracker,
/// both KPI aggregators and the sink dispatcher.
pub struct Pipeline<C> {
    config: PipelineConfig,
    store: C,
    dispatcher: SinkDispatcher,
    watermark: WatermarkTracker,
    global: GlobalKpiAggregator,
    country: CountryKpiAggregator,
    batch_id: u64,
    next_offset: Offset,
    uncommitted_batches: u32,
    metrics: PipelineMetrics,
}

impl<C: CheckpointStore> Pipeline<C> {
    pub fn new(config: PipelineConfig, store: C, dispatcher: SinkDispatcher) -> Result<Self> {
        config.validate().context("invalid pipeline configuration")?;
        Ok(Self {
            watermark: WatermarkTracker::new(config.watermark_delay),
            global: global_kpi_aggregator(config.window_size, config.allowed_lateness),
            country: country_kpi_aggregator(config.window_size, config.allowed_lateness),
            config,
            store,
            dispatcher,
            batch_id: 0,
            next_offset: 0,
            uncommitted_batches: 0,
            metrics: PipelineMetrics::default(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn current_watermark(&self) -> Option<Watermark> {
        self.watermark.current_watermark()
    }

    /// Offset of the first message not yet folded into state.
    pub fn next_offset(&self) -> Offset {
        self.next_offset
    }

    pub fn batch_id(&self) -> u64 {
        self.batch_id
    }

    pub fn open_windows(&self) -> usize {
        self.global.open_window_count() + self.country.open_window_count()
    }

    /// Wait for every sink to flush what was dispatched so far.
    pub fn sink_barrier(&mut self) -> Vec<SinkStatus> {
        self.dispatcher.barrier(self.config.sink_barrier_timeout)
    }

    /// Restore state from the latest checkpoint, if any, and return the
    /// offset the source should resume from.
    pub fn recover(&mut self) -> Result<Offset> {
        let Some(checkpoint) = self.store.load().context("failed to load checkpoint")? else {
            tracing::info!("no checkpoint found, starting from offset 0");
            return Ok(0);
        };

        let global = checkpoint
            .state_for(GLOBAL_STATE)
            .with_context(|| format!("checkpoint has no `{GLOBAL_STATE}` state"))?;
        let country = checkpoint
            .state_for(COUNTRY_STATE)
            .with_context(|| format!("checkpoint has no `{COUNTRY_STATE}` state"))?;
        self.global
            .restore_state(global)
            .context("failed to restore global window state")?;
        self.country
            .restore_state(country)
            .context("failed to restore country window state")?;
        if let Some(ts) = checkpoint.watermark {
            self.watermark.restore(Watermark::new(ts));
        }
        self.batch_id = checkpoint.batch_id;
        self.next_offset = checkpoint.source_offset;
        self.uncommitted_batches = 0;

        tracing::info!(
            batch_id = checkpoint.batch_id,
            offset = checkpoint.source_offset,
            watermark = ?checkpoint.watermark,
            open_windows = self.open_windows(),
            "recovered from checkpoint"
        );
        Ok(checkpoint.source_offset)
    }

    /// Run one micro-batch through decode, enrichment and both aggregators,
    /// then dispatch the raw events and every window the new watermark
    /// finalized.
    ///
    /// Lateness is judged against the watermark as it stood when the batch
    /// started; the watermark only moves once the whole batch is folded in.
    pub fn process_batch(&mut self, messages: Vec<SourceMessage>) -> Result<BatchStats> {
        self.batch_id += 1;
        let frozen = self.global.current_watermark();
        let mut stats = BatchStats {
            batch_id: self.batch_id,
            ..BatchStats::default()
        };
        let mut output = BatchOutput::default();

        for message in messages {
            stats.received += 1;
            self.next_offset = self.next_offset.max(message.offset.saturating_add(1));

            let event = match decode(&message.payload) {
                Ok(event) => event,
                Err(err) => {
                    stats.decode_failures += 1;
                    tracing::warn!(
                        offset = message.offset,
                        payload = %err.payload_preview(PAYLOAD_PREVIEW_LEN),
                        "skipping malformed payload: {}",
                        err.reason
                    );
                    continue;
                }
            };
            stats.decoded += 1;

            let enriched = enrich(event);
            let timestamp = enriched.timestamp();
            self.watermark.observe(timestamp);
            output.raw_events.push(raw_event_record(&enriched));

            let accepted = self
                .global
                .add(&enriched, timestamp)
                .and_then(|()| self.country.add(&enriched, timestamp));
            if let Err(late) = accepted {
                stats.late_dropped += 1;
                tracing::warn!(
                    offset = message.offset,
                    invoice_no = enriched.event.invoice_no,
                    "dropping late event from window aggregation: {late}"
                );
            }
        }

        if let Some(watermark) = self.watermark.current_watermark() {
            let global = self.global.advance(watermark);
            let country = self.country.advance(watermark);
            output.global_kpis = global.iter().map(global_kpi_record).collect();
            output.country_kpis = country.iter().map(country_kpi_record).collect();
        }

        stats.raw_emitted = output.raw_events.len() as u64;
        stats.global_windows_emitted = output.global_kpis.len() as u64;
        stats.country_windows_emitted = output.country_kpis.len() as u64;
        stats.open_windows = self.open_windows() as u64;

        if !output.is_empty() {
            self.dispatcher.dispatch(&output);
        }
        let sinks = self.dispatcher.statuses();
        let discarded: u64 = sinks.iter().map(|s| s.discarded).sum();
        stats.sink_records_discarded =
            discarded.saturating_sub(self.metrics.sink_records_discarded);
        stats.failed_sinks = sinks.iter().filter(|s| s.is_failed()).count() as u64;
        self.metrics.record_sinks(&sinks);

        self.uncommitted_batches += 1;
        self.metrics.record_batch(&stats);

        tracing::info!(
            batch_id = stats.batch_id,
            received = stats.received,
            decoded = stats.decoded,
            decode_failures = stats.decode_failures,
            late_dropped = stats.late_dropped,
            raw_emitted = stats.raw_emitted,
            global_windows_emitted = stats.global_windows_emitted,
            country_windows_emitted = stats.country_windows_emitted,
            open_windows = stats.open_windows,
            sink_records_discarded = stats.sink_records_discarded,
            failed_sinks = stats.failed_sinks,
            watermark_before = ?frozen.map(|wm| wm.timestamp),
            watermark = ?self.watermark.current_watermark().map(|wm| wm.timestamp),
            "batch processed"
        );
        Ok(stats)
    }

    /// Make everything processed so far durable.
    ///
    /// Waits for the sinks to flush, writes the checkpoint, then acknowledges
    /// the offset to the source. Returns `false` without checkpointing when a
    /// healthy sink has not caught up; the next commit covers these batches.
    pub fn commit<S: EventSource + ?Sized>(&mut self, source: &mut S) -> Result<bool> {
        let statuses = self.dispatcher.barrier(self.config.sink_barrier_timeout);
        self.metrics.record_sinks(&statuses);

        let lagging: Vec<&str> = statuses
            .iter()
            .filter(|s| s.health == SinkHealth::Lagging)
            .map(|s| s.name.as_str())
            .collect();
        if !lagging.is_empty() {
            tracing::warn!(
                sinks = ?lagging,
                batch_id = self.batch_id,
                "sinks have not flushed, deferring checkpoint"
            );
            return Ok(false);
        }

        self.write_checkpoint(source)?;
        Ok(true)
    }

    /// Drive the pipeline until `cancel` fires or the source is exhausted.
    ///
    /// On the way out the in-flight batch is finished, every sink is drained
    /// and flushed, and a final checkpoint is written.
    pub fn run<S: EventSource + ?Sized>(
        mut self,
        source: &mut S,
        cancel: &CancellationToken,
    ) -> Result<PipelineMetrics> {
        let offset = self.recover()?;
        source
            .seek(offset)
            .with_context(|| format!("failed to seek source to offset {offset}"))?;
        tracing::info!(offset, sinks = self.dispatcher.sink_count(), "pipeline started");

        let max_wait = self.config.trigger_interval.min(CANCEL_CHECK_INTERVAL);
        loop {
            if cancel.is_cancelled() {
                tracing::info!("shutdown requested");
                break;
            }
            if source.is_exhausted() {
                tracing::info!("source exhausted");
                break;
            }

            let mut messages = source.poll(max_wait).context("source poll failed")?;
            if messages.is_empty() {
                continue;
            }
            while messages.len() > self.config.max_batch_size {
                let rest = messages.split_off(self.config.max_batch_size);
                self.process_batch(std::mem::replace(&mut messages, rest))?;
                self.maybe_commit(source)?;
            }
            self.process_batch(messages)?;
            self.maybe_commit(source)?;
        }

        self.finish(source)
    }

    fn maybe_commit<S: EventSource + ?Sized>(&mut self, source: &mut S) -> Result<()> {
        if self.uncommitted_batches >= self.config.checkpoint_every {
            self.commit(source)?;
        }
        Ok(())
    }

    fn finish<S: EventSource + ?Sized>(mut self, source: &mut S) -> Result<PipelineMetrics> {
        let statuses = self.dispatcher.shutdown();
        self.metrics.record_sinks(&statuses);
        for status in statuses.iter().filter(|s| s.is_failed()) {
            tracing::error!(
                sink = %status.name,
                discarded = status.discarded,
                "sink ended in failed state"
            );
        }

        if self.uncommitted_batches > 0 {
            self.write_checkpoint(source)?;
        }
        tracing::info!(metrics = ?self.metrics, "pipeline stopped");
        Ok(self.metrics)
    }

    fn snapshot(&self) -> Result<Checkpoint> {
        let mut window_state = BTreeMap::new();
        window_state.insert(GLOBAL_STATE.to_string(), self.global.snapshot_state()?);
        window_state.insert(COUNTRY_STATE.to_string(), self.country.snapshot_state()?);
        Ok(Checkpoint {
            batch_id: self.batch_id,
            source_offset: self.next_offset,
            watermark: self.watermark.current_watermark().map(|wm| wm.timestamp),
            window_state,
            created_at_ms: chrono::Utc::now().timestamp_millis(),
        })
    }

    fn write_checkpoint<S: EventSource + ?Sized>(&mut self, source: &mut S) -> Result<()> {
        let checkpoint = self.snapshot()?;
        self.store
            .save(&checkpoint)
            .with_context(|| format!("failed to write checkpoint for batch {}", self.batch_id))?;
        self.metrics.checkpoints_written += 1;
        self.uncommitted_batches = 0;
        source
            .commit(checkpoint.source_offset)
            .with_context(|| format!("failed to commit offset {}", checkpoint.source_offset))?;

        tracing::info!(
            batch_id = checkpoint.batch_id,
            offset = checkpoint.source_offset,
            watermark = ?checkpoint.watermark,
            "checkpoint written"
        );
        Ok(())
    }
}

/// Open `(window, key)` pairs per aggregator held in `checkpoint`.
pub fn checkpoint_open_windows(checkpoint: &Checkpoint) -> Result<BTreeMap<String, usize>> {
    let config = PipelineConfig::default();
    let mut global = global_kpi_aggregator(config.window_size, config.allowed_lateness);
    let mut country = country_kpi_aggregator(config.window_size, config.allowed_lateness);
    let mut open = BTreeMap::new();
    if let Some(state) = checkpoint.state_for(GLOBAL_STATE) {
        global.restore_state(state)?;
        open.insert(GLOBAL_STATE.to_string(), global.open_window_count());
    }
    if let Some(state) = checkpoint.state_for(COUNTRY_STATE) {
        country.restore_state(state)?;
        open.insert(COUNTRY_STATE.to_string(), country.open_window_count());
    }
    Ok(open)
}
