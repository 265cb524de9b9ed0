use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Event time in milliseconds since epoch (UTC).
pub type EventTime = i64;

/// Position of a message in the event source.
pub type Offset = u64;

/// Watermark asserts that no events older than `timestamp` are still expected.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Watermark {
    pub timestamp: EventTime,
}

impl Watermark {
    /// Create a new watermark at the given timestamp.
    pub fn new(timestamp: EventTime) -> Self {
        Self { timestamp }
    }
}

impl std::fmt::Display for Watermark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Watermark({}ms)", self.timestamp)
    }
}

/// Kind of retail transaction.
///
/// Upstream only documents `ORDER` and `RETURN`, but any other string is kept
/// verbatim so it can be counted instead of rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    Order,
    Return,
    Other(String),
}

impl TransactionType {
    /// Parse the wire representation.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "ORDER" => Self::Order,
            "RETURN" => Self::Return,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_wire(&self) -> &str {
        match self {
            Self::Order => "ORDER",
            Self::Return => "RETURN",
            Self::Other(other) => other,
        }
    }
}

/// One line of an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub sku: String,
    /// Negative quantities occur in source data and are taken as given.
    pub quantity: i32,
    pub title: String,
    pub unit_price: f64,
}

/// A decoded transaction. Immutable once produced by the decoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionEvent {
    pub invoice_no: i64,
    pub country: String,
    pub timestamp: EventTime,
    pub kind: TransactionType,
    pub items: Vec<LineItem>,
}

/// A transaction together with its derived per-event metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedEvent {
    pub event: TransactionEvent,
    /// Σ quantity × unit_price, negated for returns.
    pub total_cost: f64,
    pub total_items: i64,
    pub is_order: u8,
    pub is_return: u8,
}

impl EnrichedEvent {
    pub fn timestamp(&self) -> EventTime {
        self.event.timestamp
    }

    pub fn country(&self) -> &str {
        &self.event.country
    }
}

/// Render an event time as an RFC 3339 UTC string, falling back to the raw
/// millisecond value when it is outside chrono's range.
pub fn format_event_time(timestamp: EventTime) -> String {
    match DateTime::<Utc>::from_timestamp_millis(timestamp) {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Secs, true),
        None => timestamp.to_string(),
    }
}
