use super::*;

/// Destination for output records.
///
/// Delivery is at-least-once: after a crash, records written since the last
/// checkpoint are written again. Sinks are expected to be append-only or to
/// key writes idempotently.
pub trait Sink: Send {
    fn write(&mut self, record: &Record) -> Result<(), SinkError>;
    fn flush(&mut self) -> Result<(), SinkError>;
}

/// Appends records to a file as JSON lines.
pub struct JsonLinesSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonLinesSink {
    /// Open `path` for appending, creating it and its parent directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Sink for JsonLinesSink {
    fn write(&mut self, record: &Record) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }
}

/// Prints records to stdout as JSON lines, prefixed by a label.
pub struct ConsoleSink {
    label: String,
}

impl ConsoleSink {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl Sink for ConsoleSink {
    fn write(&mut self, record: &Record) -> Result<(), SinkError> {
        let line = serde_json::to_string(record)?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "[{}] {}", self.label, line)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        std::io::stdout().lock().flush()?;
        Ok(())
    }
}

/// Shared in-memory sink. Clones share the same buffer, so a test keeps one
/// clone and hands the other to the dispatcher.
///
/// Failures and latency can be scripted to exercise retry and isolation.
#[derive(Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<Record>>>,
    flushes: Arc<AtomicU64>,
    fail_next_writes: Arc<AtomicUsize>,
    fail_always: Arc<AtomicBool>,
    write_delay: Arc<Mutex<Duration>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything written so far.
    pub fn records(&self) -> Vec<Record> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::SeqCst)
    }

    /// Fail the next `n` write attempts, then succeed again.
    pub fn fail_next_writes(&self, n: usize) {
        self.fail_next_writes.store(n, Ordering::SeqCst);
    }

    /// Fail every write and flush until switched off.
    pub fn set_fail_always(&self, fail: bool) {
        self.fail_always.store(fail, Ordering::SeqCst);
    }

    /// Sleep this long inside every write.
    pub fn set_write_delay(&self, delay: Duration) {
        if let Ok(mut guard) = self.write_delay.lock() {
            *guard = delay;
        }
    }
}

impl Sink for MemorySink {
    fn write(&mut self, record: &Record) -> Result<(), SinkError> {
        let delay = self.write_delay.lock().map(|d| *d).unwrap_or_default();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        if self.fail_always.load(Ordering::SeqCst) {
            return Err(SinkError::Rejected("memory sink set to fail".to_string()));
        }
        let scripted = self
            .fail_next_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if scripted.is_ok() {
            return Err(SinkError::Rejected("scripted write failure".to_string()));
        }
        self.records
            .lock()
            .map_err(|_| SinkError::Closed("memory".to_string()))?
            .push(record.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        if self.fail_always.load(Ordering::SeqCst) {
            return Err(SinkError::Rejected("memory sink set to fail".to_string()));
        }
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
