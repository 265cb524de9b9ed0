use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::LateEventError;
use crate::time::{EVENT_TIME_MIN, duration_millis};
use crate::types::{EnrichedEvent, EventTime, Watermark, format_event_time};

mod aggregator;
mod assigners;
mod functions;
mod kpi;
mod primitives;

pub use aggregator::*;
pub use assigners::*;
pub use functions::*;
pub use kpi::*;
pub use primitives::*;

#[cfg(test)]
#[path = "tests/window_tests.rs"]
mod tests;
