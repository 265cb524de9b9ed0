use super::*;

/// Observed state of one sink after a barrier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkHealth {
    Healthy,
    /// Did not acknowledge the barrier in time; still working.
    Lagging,
    /// Retries exhausted. The sink receives nothing further.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkStatus {
    pub name: String,
    pub stream: OutputStream,
    pub health: SinkHealth,
    pub written: u64,
    pub discarded: u64,
    pub retries: u64,
}

impl SinkStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self.health, SinkHealth::Failed(_))
    }
}

enum SinkCommand {
    Deliver(Arc<Vec<Record>>),
    Barrier(Sender<()>),
}

#[derive(Default)]
struct SinkCounters {
    written: AtomicU64,
    discarded: AtomicU64,
    retries: AtomicU64,
    failure: Mutex<Option<String>>,
}

impl SinkCounters {
    fn failure(&self) -> Option<String> {
        self.failure.lock().ok().and_then(|f| f.clone())
    }

    fn mark_failed(&self, reason: String) {
        if let Ok(mut failure) = self.failure.lock() {
            failure.get_or_insert(reason);
        }
    }
}

struct SinkWorker {
    name: String,
    sink: Box<dyn Sink>,
    retry: RetryPolicy,
    flush_interval: Duration,
    last_flush: Instant,
    counters: Arc<SinkCounters>,
}

impl SinkWorker {
    fn run(mut self, commands: Receiver<SinkCommand>) {
        for command in commands.iter() {
            match command {
                SinkCommand::Deliver(records) => self.deliver(&records),
                SinkCommand::Barrier(ack) => {
                    self.flush();
                    // The barrier may have timed out already.
                    let _ = ack.send(());
                }
            }
        }
        // Dispatcher dropped: final flush before exiting.
        self.flush();
    }

    fn is_failed(&self) -> bool {
        self.counters.failure().is_some()
    }

    fn deliver(&mut self, records: &[Record]) {
        for (index, record) in records.iter().enumerate() {
            if self.is_failed() {
                let remaining = (records.len() - index) as u64;
                self.counters.discarded.fetch_add(remaining, Ordering::Relaxed);
                return;
            }
            match self.with_retry("write", |sink| sink.write(record)) {
                Ok(()) => {
                    self.counters.written.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => self.fail(err),
            }
        }
        if self.last_flush.elapsed() >= self.flush_interval {
            self.flush();
        }
    }

    fn flush(&mut self) {
        if self.is_failed() {
            return;
        }
        if let Err(err) = self.with_retry("flush", |sink| sink.flush()) {
            self.fail(err);
        }
        self.last_flush = Instant::now();
    }

    fn fail(&mut self, err: SinkError) {
        tracing::error!(
            sink = %self.name,
            attempts = self.retry.max_attempts,
            "sink failed permanently: {err}"
        );
        self.counters.mark_failed(err.to_string());
    }

    fn with_retry<T>(
        &mut self,
        operation: &str,
        mut op: impl FnMut(&mut dyn Sink) -> Result<T, SinkError>,
    ) -> Result<T, SinkError> {
        let mut attempt = 1;
        loop {
            match op(self.sink.as_mut()) {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.retry.max_attempts => {
                    let delay = self.retry.backoff(attempt);
                    tracing::warn!(
                        sink = %self.name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "sink {operation} failed, retrying: {err}"
                    );
                    self.counters.retries.fetch_add(1, Ordering::Relaxed);
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

struct SinkHandle {
    name: String,
    stream: OutputStream,
    commands: Option<Sender<SinkCommand>>,
    counters: Arc<SinkCounters>,
    thread: Option<JoinHandle<()>>,
    /// Acknowledgement of a barrier the worker has not reached yet.
    pending_barrier: Option<Receiver<()>>,
}

impl SinkHandle {
    fn status(&self, health: SinkHealth) -> SinkStatus {
        let health = match self.counters.failure() {
            Some(reason) => SinkHealth::Failed(reason),
            None => health,
        };
        SinkStatus {
            name: self.name.clone(),
            stream: self.stream,
            health,
            written: self.counters.written.load(Ordering::Relaxed),
            discarded: self.counters.discarded.load(Ordering::Relaxed),
            retries: self.counters.retries.load(Ordering::Relaxed),
        }
    }

    fn send(&self, command: SinkCommand) -> bool {
        let sent = self
            .commands
            .as_ref()
            .is_some_and(|tx| tx.send(command).is_ok());
        if !sent {
            self.counters
                .mark_failed(format!("worker for sink {} is gone", self.name));
        }
        sent
    }

    fn exited(&self) -> SinkHealth {
        SinkHealth::Failed(format!("worker for sink {} exited", self.name))
    }

    /// Queue a fresh barrier unless the previous one is still outstanding.
    ///
    /// Returns the health to report right away, or `None` when a new barrier
    /// was queued and should be awaited.
    fn request_barrier(&mut self) -> Option<SinkHealth> {
        if let Some(ack) = self.pending_barrier.take() {
            match ack.try_recv() {
                Ok(()) => {}
                Err(TryRecvError::Empty) => {
                    self.pending_barrier = Some(ack);
                    return Some(SinkHealth::Lagging);
                }
                Err(TryRecvError::Disconnected) => return Some(self.exited()),
            }
        }
        // Failed workers still acknowledge, after discarding their backlog.
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        if !self.send(SinkCommand::Barrier(ack_tx)) {
            return Some(SinkHealth::Healthy);
        }
        self.pending_barrier = Some(ack_rx);
        None
    }

    fn await_barrier(&mut self, deadline: Instant) -> SinkHealth {
        let Some(ack) = self.pending_barrier.take() else {
            return SinkHealth::Healthy;
        };
        match ack.recv_deadline(deadline) {
            Ok(()) => SinkHealth::Healthy,
            Err(RecvTimeoutError::Timeout) => {
                self.pending_barrier = Some(ack);
                SinkHealth::Lagging
            }
            Err(RecvTimeoutError::Disconnected) => self.exited(),
        }
    }
}

/// Fans batch output out to independent sinks.
///
/// Every sink runs on its own worker thread behind an unbounded channel, so a
/// slow or failing sink only delays itself: dispatch never blocks, and a
/// barrier does not wait again on a sink still behind on the previous one.
/// Each worker retries writes with bounded exponential backoff; once retries
/// are exhausted that sink is marked failed and later records for it are
/// discarded and counted, while the other sinks carry on.
pub struct SinkDispatcher {
    retry: RetryPolicy,
    sinks: Vec<SinkHandle>,
}

impl SinkDispatcher {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            retry,
            sinks: Vec::new(),
        }
    }

    /// Register `sink` as a consumer of `stream`.
    ///
    /// The worker flushes after a delivery once `flush_interval` has elapsed
    /// since its last flush, and always on [`barrier`](Self::barrier).
    pub fn register(
        &mut self,
        name: impl Into<String>,
        stream: OutputStream,
        sink: Box<dyn Sink>,
        flush_interval: Duration,
    ) -> Result<()> {
        let name = name.into();
        let (tx, rx) = crossbeam_channel::unbounded();
        let counters = Arc::new(SinkCounters::default());
        let worker = SinkWorker {
            name: name.clone(),
            sink,
            retry: self.retry.clone(),
            flush_interval,
            last_flush: Instant::now(),
            counters: Arc::clone(&counters),
        };
        let thread = thread::Builder::new()
            .name(format!("sink-{name}"))
            .spawn(move || worker.run(rx))
            .with_context(|| format!("failed to spawn worker for sink {name}"))?;

        tracing::info!(sink = %name, %stream, "registered sink");
        self.sinks.push(SinkHandle {
            name,
            stream,
            commands: Some(tx),
            counters,
            thread: Some(thread),
            pending_barrier: None,
        });
        Ok(())
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Hand each sink the records of the stream it consumes. Does not wait
    /// for the writes.
    pub fn dispatch(&self, output: &BatchOutput) {
        let mut shared: Vec<(OutputStream, Arc<Vec<Record>>)> = Vec::new();
        for handle in &self.sinks {
            let records = output.records(handle.stream);
            if records.is_empty() {
                continue;
            }
            let batch = match shared.iter().find(|(stream, _)| *stream == handle.stream) {
                Some((_, batch)) => Arc::clone(batch),
                None => {
                    let batch = Arc::new(records.to_vec());
                    shared.push((handle.stream, Arc::clone(&batch)));
                    batch
                }
            };
            handle.send(SinkCommand::Deliver(batch));
        }
    }

    /// Ask every live sink to flush and wait up to `timeout` for the
    /// acknowledgements.
    ///
    /// Commands are processed in order, so an acknowledged barrier means the
    /// sink has written and flushed everything dispatched before it. A sink
    /// that has not yet acknowledged an earlier barrier is reported
    /// [`SinkHealth::Lagging`] without queueing or waiting on another one, so
    /// a slow sink costs the caller at most one timeout per catch-up.
    pub fn barrier(&mut self, timeout: Duration) -> Vec<SinkStatus> {
        let deadline = Instant::now() + timeout;
        let immediate: Vec<Option<SinkHealth>> = self
            .sinks
            .iter_mut()
            .map(SinkHandle::request_barrier)
            .collect();

        self.sinks
            .iter_mut()
            .zip(immediate)
            .map(|(handle, health)| {
                let health = health.unwrap_or_else(|| handle.await_barrier(deadline));
                handle.status(health)
            })
            .collect()
    }

    /// Current counters without waiting on any sink.
    pub fn statuses(&self) -> Vec<SinkStatus> {
        self.sinks
            .iter()
            .map(|handle| handle.status(SinkHealth::Healthy))
            .collect()
    }

    /// Close every sink channel, let workers drain and flush, and join them.
    ///
    /// Records dispatched afterwards are counted against the sink as a failure.
    pub fn shutdown(&mut self) -> Vec<SinkStatus> {
        for handle in &mut self.sinks {
            handle.commands.take();
        }
        for handle in &mut self.sinks {
            if let Some(thread) = handle.thread.take() {
                if thread.join().is_err() {
                    handle
                        .counters
                        .mark_failed(format!("worker for sink {} panicked", handle.name));
                }
            }
        }
        self.statuses()
    }
}
