//! Output side of the pipeline: record contracts, sink implementations and
//! the dispatcher that fans each batch out to independent sink workers.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::RetryPolicy;
use crate::error::SinkError;
use crate::types::{EnrichedEvent, format_event_time};
use crate::window::{KpiSummary, WindowResult};

mod dispatcher;
mod record;
mod sinks;

pub use dispatcher::*;
pub use record::*;
pub use sinks::*;

#[cfg(test)]
#[path = "tests/sink_tests.rs"]
mod tests;
