use super::*;

/// Source fed through a crossbeam channel by a producer thread.
///
/// Producers send messages in offset order. After [`seek`](EventSource::seek),
/// messages below the requested offset are skipped, which lets a producer
/// replay its input from the beginning after a restart.
pub struct ChannelSource {
    receiver: Receiver<SourceMessage>,
    max_batch: usize,
    next_offset: Offset,
    disconnected: bool,
    last_commit: Option<Offset>,
}

impl ChannelSource {
    pub fn new(receiver: Receiver<SourceMessage>, max_batch: usize) -> Self {
        Self {
            receiver,
            max_batch: max_batch.max(1),
            next_offset: 0,
            disconnected: false,
            last_commit: None,
        }
    }

    pub fn last_commit(&self) -> Option<Offset> {
        self.last_commit
    }

    fn accept(&mut self, message: SourceMessage, batch: &mut Vec<SourceMessage>) {
        if message.offset >= self.next_offset {
            self.next_offset = message.offset + 1;
            batch.push(message);
        }
    }
}

impl EventSource for ChannelSource {
    fn poll(&mut self, max_wait: Duration) -> Result<Vec<SourceMessage>> {
        let mut batch = Vec::new();
        let deadline = Instant::now() + max_wait;
        // Block only until the first message; then drain what is ready.
        while batch.is_empty() && !self.disconnected {
            match self.receiver.recv_deadline(deadline) {
                Ok(message) => self.accept(message, &mut batch),
                Err(RecvTimeoutError::Timeout) => return Ok(batch),
                Err(RecvTimeoutError::Disconnected) => self.disconnected = true,
            }
        }
        while batch.len() < self.max_batch && !self.disconnected {
            match self.receiver.try_recv() {
                Ok(message) => self.accept(message, &mut batch),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => self.disconnected = true,
            }
        }
        Ok(batch)
    }

    fn commit(&mut self, offset: Offset) -> Result<()> {
        self.last_commit = Some(offset);
        Ok(())
    }

    fn seek(&mut self, offset: Offset) -> Result<()> {
        if offset < self.next_offset {
            bail!(
                "channel source cannot rewind from {} to {offset}",
                self.next_offset
            );
        }
        self.next_offset = offset;
        Ok(())
    }

    fn is_exhausted(&self) -> bool {
        self.disconnected && self.receiver.is_empty()
    }
}
