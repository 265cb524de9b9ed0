//! # RetailCrab Core
//!
//! Streaming ingestion and windowed KPI aggregation for retail transaction
//! events.
//!
//! - [`ingest`]: payload decoding ([`decode`](ingest::decode)) and per-event
//!   enrichment ([`enrich`](ingest::enrich)).
//! - [`time`]: the event-time [`WatermarkTracker`](time::WatermarkTracker).
//! - [`window`]: tumbling windows and the keyed
//!   [`WindowAggregator`](window::WindowAggregator) behind the global and
//!   per-country KPIs.
//! - [`checkpoint`]: durable `(offset, watermark, window state)` snapshots.
//! - [`sink`]: output contracts and the [`SinkDispatcher`](sink::SinkDispatcher).
//! - [`source`]: the [`EventSource`](source::EventSource) abstraction.
//! - [`pipeline`]: the micro-batch loop tying everything together.

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod ingest;
pub mod pipeline;
pub mod sink;
pub mod source;
pub mod time;
pub mod types;
pub mod window;
