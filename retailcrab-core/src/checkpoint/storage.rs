use super::*;

/// Storage for the latest pipeline checkpoint.
///
/// `save` must be atomic with respect to crashes: `load` returns either the
/// previous complete checkpoint or the new one, never a partial write.
pub trait CheckpointStore: Send + Sync {
    fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError>;
    /// Last complete checkpoint, or `None` on first run.
    fn load(&self) -> Result<Option<Checkpoint>, CheckpointError>;
}

impl<S: CheckpointStore + ?Sized> CheckpointStore for Arc<S> {
    fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        (**self).save(checkpoint)
    }

    fn load(&self) -> Result<Option<Checkpoint>, CheckpointError> {
        (**self).load()
    }
}

/// In-memory checkpoint store for tests and local single-process execution.
///
/// Checkpoints go through the same codec as on disk.
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    encoded: Mutex<Option<Vec<u8>>>,
    saves: AtomicU64,
    unavailable: AtomicBool,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent saves fail, simulating a lost storage backend.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }
}

fn poisoned(_: impl std::fmt::Debug) -> CheckpointError {
    CheckpointError::Unavailable("checkpoint lock poisoned".to_string())
}

impl CheckpointStore for InMemoryCheckpointStore {
    fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CheckpointError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        let bytes = encode_checkpoint(checkpoint)?;
        *self.encoded.lock().map_err(poisoned)? = Some(bytes);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn load(&self) -> Result<Option<Checkpoint>, CheckpointError> {
        match self.encoded.lock().map_err(poisoned)?.as_deref() {
            Some(bytes) => decode_checkpoint(bytes).map(Some),
            None => Ok(None),
        }
    }
}

/// File-system checkpoint store.
///
/// Layout: `<dir>/checkpoint.bin`, replaced by write-to-temp, fsync, rename.
pub struct FsCheckpointStore {
    base_path: PathBuf,
}

const CHECKPOINT_FILE: &str = "checkpoint.bin";
const CHECKPOINT_TMP_FILE: &str = "checkpoint.bin.tmp";

impl FsCheckpointStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).map_err(|e| CheckpointError::io(&base_path, e))?;
        Ok(Self { base_path })
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.base_path.join(CHECKPOINT_FILE)
    }

    fn tmp_path(&self) -> PathBuf {
        self.base_path.join(CHECKPOINT_TMP_FILE)
    }

    fn write_tmp(&self, path: &Path, bytes: &[u8]) -> Result<(), CheckpointError> {
        let mut file = fs::File::create(path).map_err(|e| CheckpointError::io(path, e))?;
        file.write_all(bytes)
            .and_then(|_| file.sync_all())
            .map_err(|e| CheckpointError::io(path, e))
    }

    #[cfg(unix)]
    fn sync_dir(&self) -> Result<(), CheckpointError> {
        fs::File::open(&self.base_path)
            .and_then(|dir| dir.sync_all())
            .map_err(|e| CheckpointError::io(&self.base_path, e))
    }

    #[cfg(not(unix))]
    fn sync_dir(&self) -> Result<(), CheckpointError> {
        Ok(())
    }
}

impl CheckpointStore for FsCheckpointStore {
    fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let bytes = encode_checkpoint(checkpoint)?;
        let tmp = self.tmp_path();
        self.write_tmp(&tmp, &bytes)?;
        let target = self.checkpoint_path();
        fs::rename(&tmp, &target).map_err(|e| CheckpointError::io(&target, e))?;
        self.sync_dir()
    }

    fn load(&self) -> Result<Option<Checkpoint>, CheckpointError> {
        let tmp = self.tmp_path();
        if tmp.exists() {
            // Left behind by a crash mid-save; the previous checkpoint is intact.
            tracing::warn!("discarding incomplete checkpoint {}", tmp.display());
            fs::remove_file(&tmp).map_err(|e| CheckpointError::io(&tmp, e))?;
        }

        let path = self.checkpoint_path();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CheckpointError::io(&path, e)),
        };
        decode_checkpoint(&bytes).map(Some)
    }
}
