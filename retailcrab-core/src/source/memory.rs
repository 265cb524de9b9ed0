use super::*;

/// Bounded source over payloads held in memory; offsets are positions.
///
/// Intended for tests and replay tools. Commits are recorded so callers can
/// check what the pipeline acknowledged.
#[derive(Debug, Clone)]
pub struct MemorySource {
    messages: Vec<Vec<u8>>,
    position: usize,
    max_batch: usize,
    committed: Vec<Offset>,
}

impl MemorySource {
    pub fn new<I, P>(payloads: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Vec<u8>>,
    {
        Self {
            messages: payloads.into_iter().map(Into::into).collect(),
            position: 0,
            max_batch: usize::MAX,
            committed: Vec::new(),
        }
    }

    /// Limit how many messages a single poll returns.
    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch.max(1);
        self
    }

    /// Offsets passed to [`commit`](EventSource::commit), in order.
    pub fn committed(&self) -> &[Offset] {
        &self.committed
    }

    pub fn position(&self) -> Offset {
        self.position as Offset
    }
}

impl EventSource for MemorySource {
    fn poll(&mut self, _max_wait: Duration) -> Result<Vec<SourceMessage>> {
        let end = self
            .messages
            .len()
            .min(self.position.saturating_add(self.max_batch));
        let batch = (self.position..end)
            .map(|i| SourceMessage::new(i as Offset, self.messages[i].clone()))
            .collect();
        self.position = end.max(self.position);
        Ok(batch)
    }

    fn commit(&mut self, offset: Offset) -> Result<()> {
        if let Some(&last) = self.committed.last() {
            if offset < last {
                bail!("commit offset {offset} is behind last commit {last}");
            }
        }
        self.committed.push(offset);
        Ok(())
    }

    fn seek(&mut self, offset: Offset) -> Result<()> {
        self.position = (offset as usize).min(self.messages.len());
        Ok(())
    }

    fn is_exhausted(&self) -> bool {
        self.position >= self.messages.len()
    }
}
