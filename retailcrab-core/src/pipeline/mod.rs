//! Micro-batch execution loop.
//!
//! ```text
//! recover() -> seek(offset)
//! loop {
//!     messages = source.poll(trigger_interval)
//!     process_batch(messages):
//!         decode -> enrich -> observe -> late check -> aggregate
//!         advance(watermark) -> finalized windows
//!         dispatch(raw, global, country)
//!     every N batches: commit() = sink barrier -> save checkpoint -> source.commit
//! }
//! finish(): drain sinks -> final checkpoint
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::config::PipelineConfig;
use crate::ingest::{decode, enrich};
use crate::sink::{
    BatchOutput, SinkDispatcher, SinkHealth, SinkStatus, country_kpi_record, global_kpi_record,
    raw_event_record,
};
use crate::source::{EventSource, SourceMessage};
use crate::time::WatermarkTracker;
use crate::types::{Offset, Watermark};
use crate::window::{
    CountryKpiAggregator, GlobalKpiAggregator, country_kpi_aggregator, global_kpi_aggregator,
};

mod driver;
mod metrics;

pub use driver::*;
pub use metrics::*;

#[cfg(test)]
#[path = "tests/pipeline_tests.rs"]
mod tests;
