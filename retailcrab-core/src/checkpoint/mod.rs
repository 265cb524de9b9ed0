//! Durable checkpoints: source offset, watermark and window state, written
//! atomically after each committed micro-batch and read once at startup.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::CheckpointError;
use crate::types::{EventTime, Offset};

mod codec;
mod metadata;
mod storage;

pub use codec::*;
pub use metadata::*;
pub use storage::*;

#[cfg(test)]
#[path = "tests/checkpoint_tests.rs"]
mod tests;
