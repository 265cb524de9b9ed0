use std::time::Duration;

use crate::types::{EventTime, Watermark};

mod watermark;

pub use watermark::*;

#[cfg(test)]
#[path = "tests/time_tests.rs"]
mod tests;
