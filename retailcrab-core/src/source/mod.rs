//! Event sources: the ordered, offset-addressed input of the pipeline.
//!
//! The broker client itself lives outside this crate; anything that can hand
//! out `(offset, payload)` pairs in offset order implements [`EventSource`].

use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};

use crate::types::Offset;

mod channel;
mod memory;

pub use channel::*;
pub use memory::*;

/// One raw message and its position in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMessage {
    pub offset: Offset,
    pub payload: Vec<u8>,
}

impl SourceMessage {
    pub fn new(offset: Offset, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            offset,
            payload: payload.into(),
        }
    }
}

/// Ordered-by-offset, at-least-once message source.
pub trait EventSource: Send {
    /// Return the next messages in offset order, waiting at most `max_wait`
    /// for the first one. An empty result means nothing arrived in time.
    fn poll(&mut self, max_wait: Duration) -> Result<Vec<SourceMessage>>;

    /// Acknowledge that everything before `offset` is durably processed.
    fn commit(&mut self, offset: Offset) -> Result<()>;

    /// Resume reading at `offset` (the next offset to deliver).
    fn seek(&mut self, offset: Offset) -> Result<()>;

    /// A bounded source returns `true` once it will never deliver again.
    fn is_exhausted(&self) -> bool {
        false
    }
}

#[cfg(test)]
#[path = "tests/source_tests.rs"]
mod tests;
