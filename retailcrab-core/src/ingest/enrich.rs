use super::*;

/// Derive per-event metrics. Pure and infallible.
///
/// Types other than `ORDER`/`RETURN` get `is_order = is_return = 0` and a
/// positive `total_cost`; they still count towards window totals.
pub fn enrich(event: TransactionEvent) -> EnrichedEvent {
    let gross: f64 = event
        .items
        .iter()
        .map(|item| f64::from(item.quantity) * item.unit_price)
        .sum();
    let total_items: i64 = event.items.iter().map(|item| i64::from(item.quantity)).sum();

    let (is_order, is_return) = match event.kind {
        TransactionType::Order => (1, 0),
        TransactionType::Return => (0, 1),
        TransactionType::Other(_) => (0, 0),
    };
    let total_cost = if is_return == 1 { -gross } else { gross };

    EnrichedEvent {
        event,
        total_cost,
        total_items,
        is_order,
        is_return,
    }
}
