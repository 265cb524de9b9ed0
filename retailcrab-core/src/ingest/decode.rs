use super::*;

/// Naive layouts accepted in addition to RFC 3339; interpreted as UTC.
const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

// Wire shape of one message. Every field is required; extra fields are ignored.
#[derive(Deserialize)]
struct WireTransaction {
    invoice_no: i64,
    country: String,
    timestamp: String,
    #[serde(rename = "type")]
    kind: String,
    // Kept untyped so each element can be validated with its index.
    items: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct WireLineItem {
    #[serde(rename = "SKU")]
    sku: String,
    quantity: i32,
    title: String,
    unit_price: f64,
}

/// Parse a raw message payload into a [`TransactionEvent`].
///
/// Fails on invalid UTF-8/JSON, on any missing or mistyped field, on an
/// invalid element of `items`, and on timestamps that are not ISO-8601.
/// Callers count the failure and move on; nothing here panics.
pub fn decode(raw: &[u8]) -> Result<TransactionEvent, DecodeError> {
    let wire: WireTransaction =
        serde_json::from_slice(raw).map_err(|e| DecodeError::new(e.to_string(), raw))?;

    let timestamp = parse_timestamp(&wire.timestamp).ok_or_else(|| {
        DecodeError::new(
            format!("unrecognized timestamp {:?}", wire.timestamp),
            raw,
        )
    })?;

    let mut items = Vec::with_capacity(wire.items.len());
    for (index, value) in wire.items.into_iter().enumerate() {
        let item: WireLineItem = serde_json::from_value(value)
            .map_err(|e| DecodeError::new(format!("items[{index}]: {e}"), raw))?;
        items.push(LineItem {
            sku: item.sku,
            quantity: item.quantity,
            title: item.title,
            unit_price: item.unit_price,
        });
    }

    Ok(TransactionEvent {
        invoice_no: wire.invoice_no,
        country: wire.country,
        timestamp,
        kind: TransactionType::from_wire(&wire.kind),
        items,
    })
}

/// Parse an ISO-8601 timestamp into epoch milliseconds.
///
/// Accepts RFC 3339 with an offset, or a naive date-time (space or `T`
/// separated, optional fractional seconds) taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<EventTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc().timestamp_millis())
}
