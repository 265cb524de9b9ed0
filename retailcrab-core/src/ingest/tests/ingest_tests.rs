use super::*;

fn payload(kind: &str, items: &str) -> Vec<u8> {
    format!(
        r#"{{"invoice_no": 154132541653705, "country": "United Kingdom",
            "timestamp": "2020-11-20 10:15:30", "type": "{kind}", "items": {items}}}"#
    )
    .into_bytes()
}

const TWO_ITEMS: &str = r#"[
    {"SKU": "21485", "title": "RETROSPOT HEART HOT WATER BOTTLE", "unit_price": 4.95, "quantity": 6},
    {"SKU": "23499", "title": "SET 12 VINTAGE DOILY CHALK", "unit_price": 0.42, "quantity": 2}
]"#;

// ── decode ────────────────────────────────────────────────────────────────

#[test]
fn test_decode_valid_order() {
    let event = decode(&payload("ORDER", TWO_ITEMS)).unwrap();
    assert_eq!(event.invoice_no, 154132541653705);
    assert_eq!(event.country, "United Kingdom");
    assert_eq!(event.kind, TransactionType::Order);
    assert_eq!(event.items.len(), 2);
    assert_eq!(event.items[0].sku, "21485");
    assert_eq!(event.items[1].quantity, 2);
    assert_eq!(event.timestamp, parse_timestamp("2020-11-20T10:15:30Z").unwrap());
}

#[test]
fn test_decode_missing_items_fails_with_payload() {
    let raw = br#"{"invoice_no": 1, "country": "UK", "timestamp": "2020-11-20 10:15:30", "type": "ORDER"}"#;
    let err = decode(raw).unwrap_err();
    assert!(err.reason.contains("items"), "unexpected reason: {}", err.reason);
    assert_eq!(err.payload, raw.to_vec());
}

#[test]
fn test_decode_null_field_is_rejected() {
    let raw = br#"{"invoice_no": 1, "country": null, "timestamp": "2020-11-20 10:15:30", "type": "ORDER", "items": []}"#;
    assert!(decode(raw).is_err());
}

#[test]
fn test_decode_bad_item_reports_index() {
    let items = r#"[
        {"SKU": "1", "title": "a", "unit_price": 1.0, "quantity": 1},
        {"SKU": "2", "title": "b", "unit_price": 1.0, "quantity": "three"}
    ]"#;
    let err = decode(&payload("ORDER", items)).unwrap_err();
    assert!(err.reason.starts_with("items[1]"), "unexpected reason: {}", err.reason);
}

#[test]
fn test_decode_rejects_non_json_and_invalid_utf8() {
    assert!(decode(b"not json at all").is_err());
    assert!(decode(&[0xff, 0xfe, 0x00]).is_err());
    assert!(decode(b"").is_err());
}

#[test]
fn test_decode_rejects_bad_timestamp() {
    let raw = br#"{"invoice_no": 1, "country": "UK", "timestamp": "yesterday", "type": "ORDER", "items": []}"#;
    let err = decode(raw).unwrap_err();
    assert!(err.reason.contains("timestamp"), "unexpected reason: {}", err.reason);
}

#[test]
fn test_decode_rejects_epoch_timestamp() {
    let raw = br#"{"invoice_no": 1, "country": "UK", "timestamp": 1605867330, "type": "ORDER", "items": []}"#;
    assert!(decode(raw).is_err());
}

#[test]
fn test_decode_ignores_unknown_fields() {
    let raw = br#"{"invoice_no": 7, "country": "France", "timestamp": "2020-11-20T10:15:30Z",
                  "type": "RETURN", "items": [], "channel": "web"}"#;
    let event = decode(raw).unwrap();
    assert_eq!(event.kind, TransactionType::Return);
    assert!(event.items.is_empty());
}

#[test]
fn test_decode_integer_unit_price() {
    let items = r#"[{"SKU": "1", "title": "a", "unit_price": 3, "quantity": 2}]"#;
    let event = decode(&payload("ORDER", items)).unwrap();
    assert_eq!(event.items[0].unit_price, 3.0);
}

#[test]
fn test_decode_keeps_unknown_type() {
    let event = decode(&payload("EXCHANGE", TWO_ITEMS)).unwrap();
    assert_eq!(event.kind, TransactionType::Other("EXCHANGE".to_string()));
}

// ── timestamps ────────────────────────────────────────────────────────────

#[test]
fn test_parse_timestamp_formats() {
    let utc = parse_timestamp("2020-11-20T10:15:30Z").unwrap();
    assert_eq!(parse_timestamp("2020-11-20 10:15:30"), Some(utc));
    assert_eq!(parse_timestamp("2020-11-20T10:15:30"), Some(utc));
    assert_eq!(parse_timestamp("2020-11-20T11:15:30+01:00"), Some(utc));
    assert_eq!(parse_timestamp("2020-11-20 10:15:30.250"), Some(utc + 250));
    assert_eq!(parse_timestamp("20/11/2020"), None);
}

#[test]
fn test_parse_timestamp_epoch_origin() {
    assert_eq!(parse_timestamp("1970-01-01 00:01:05"), Some(65_000));
}

// ── enrich ────────────────────────────────────────────────────────────────

#[test]
fn test_enrich_order() {
    let enriched = enrich(decode(&payload("ORDER", TWO_ITEMS)).unwrap());
    let expected = 6.0 * 4.95 + 2.0 * 0.42;
    assert!((enriched.total_cost - expected).abs() < 1e-9);
    assert_eq!(enriched.total_items, 8);
    assert_eq!((enriched.is_order, enriched.is_return), (1, 0));
}

#[test]
fn test_enrich_return_flips_sign() {
    let enriched = enrich(decode(&payload("RETURN", TWO_ITEMS)).unwrap());
    let expected = -(6.0 * 4.95 + 2.0 * 0.42);
    assert!((enriched.total_cost - expected).abs() < 1e-9);
    assert_eq!(enriched.total_items, 8);
    assert_eq!((enriched.is_order, enriched.is_return), (0, 1));
}

#[test]
fn test_enrich_sign_flip_holds_across_payloads() {
    let item_sets = [
        "[]",
        r#"[{"SKU": "a", "title": "t", "unit_price": 2.5, "quantity": 4}]"#,
        r#"[{"SKU": "a", "title": "t", "unit_price": 0.1, "quantity": -3},
            {"SKU": "b", "title": "u", "unit_price": 19.99, "quantity": 1}]"#,
        TWO_ITEMS,
    ];
    for items in item_sets {
        let order = enrich(decode(&payload("ORDER", items)).unwrap());
        let ret = enrich(decode(&payload("RETURN", items)).unwrap());
        let gross: f64 = order
            .event
            .items
            .iter()
            .map(|i| f64::from(i.quantity) * i.unit_price)
            .sum();
        assert_eq!(order.total_cost, gross);
        assert_eq!(ret.total_cost, -gross);
    }
}

#[test]
fn test_enrich_unknown_type_sets_neither_flag() {
    let enriched = enrich(decode(&payload("EXCHANGE", TWO_ITEMS)).unwrap());
    assert_eq!((enriched.is_order, enriched.is_return), (0, 0));
    assert!(enriched.total_cost > 0.0);
}

#[test]
fn test_enrich_negative_quantity_taken_as_given() {
    let items = r#"[{"SKU": "a", "title": "t", "unit_price": 2.0, "quantity": -5}]"#;
    let enriched = enrich(decode(&payload("ORDER", items)).unwrap());
    assert_eq!(enriched.total_items, -5);
    assert_eq!(enriched.total_cost, -10.0);
}
