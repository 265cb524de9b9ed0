//! Decoding and enrichment: the per-event front of the pipeline.
//!
//! Both stages are pure. [`decode`] turns one raw payload into a
//! [`TransactionEvent`] or a [`DecodeError`]; [`enrich`] derives the
//! per-event metrics that the window aggregators and the raw sink consume.

use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;

use crate::error::DecodeError;
use crate::types::{EnrichedEvent, EventTime, LineItem, TransactionEvent, TransactionType};

mod decode;
mod enrich;

pub use decode::*;
pub use enrich::*;

#[cfg(test)]
#[path = "tests/ingest_tests.rs"]
mod tests;
