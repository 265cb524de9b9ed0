use super::*;
use crate::types::{TransactionEvent, TransactionType};
use crate::window::TimeWindow;
use std::time::{SystemTime, UNIX_EPOCH};

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!(
        "retailcrab-{prefix}-{}-{nanos}",
        std::process::id()
    ))
}

fn enriched(invoice_no: i64, country: &str, ts: i64, total_cost: f64) -> EnrichedEvent {
    EnrichedEvent {
        event: TransactionEvent {
            invoice_no,
            country: country.to_string(),
            timestamp: ts,
            kind: TransactionType::Order,
            items: Vec::new(),
        },
        total_cost,
        total_items: 3,
        is_order: 1,
        is_return: 0,
    }
}

fn summary(order_count: u64) -> KpiSummary {
    KpiSummary {
        order_count,
        total_sales_volume: 6.0,
        avg_transaction_size: 3.0,
        return_rate: 0.5,
    }
}

fn raw_batch(n: i64) -> BatchOutput {
    BatchOutput {
        raw_events: (0..n)
            .map(|i| raw_event_record(&enriched(i, "UK", i * 1_000, 1.0)))
            .collect(),
        ..BatchOutput::default()
    }
}

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(2),
    }
}

fn keys(record: &Record) -> Vec<&str> {
    record.keys().map(String::as_str).collect()
}

// ── record contracts ──────────────────────────────────────────────────────

#[test]
fn test_raw_event_record_fields() {
    let record = raw_event_record(&enriched(536365, "United Kingdom", 65_000, 15.3));
    assert_eq!(
        keys(&record),
        vec![
            "invoice_no",
            "country",
            "timestamp",
            "total_cost",
            "total_items",
            "is_order",
            "is_return"
        ]
    );
    assert_eq!(record["invoice_no"], 536365);
    assert_eq!(record["timestamp"], "1970-01-01T00:01:05Z");
    assert_eq!(record["total_cost"], 15.3);
    assert_eq!(record["is_order"], 1);
}

#[test]
fn test_global_kpi_record_fields() {
    let result = WindowResult {
        window: TimeWindow::new(0, 60_000),
        key: (),
        value: summary(2),
    };
    let record = global_kpi_record(&result);
    assert_eq!(
        keys(&record),
        vec![
            "window_start",
            "window_end",
            "order_count",
            "total_sales_volume",
            "avg_transaction_size",
            "return_rate"
        ]
    );
    assert_eq!(record["window_start"], "1970-01-01T00:00:00Z");
    assert_eq!(record["window_end"], "1970-01-01T00:01:00Z");
    assert_eq!(record["order_count"], 2);
}

#[test]
fn test_country_kpi_record_has_no_average() {
    let result = WindowResult {
        window: TimeWindow::new(0, 60_000),
        key: "France".to_string(),
        value: summary(1),
    };
    let record = country_kpi_record(&result);
    assert_eq!(
        keys(&record),
        vec![
            "window_start",
            "window_end",
            "country",
            "order_count",
            "total_sales_volume",
            "return_rate"
        ]
    );
    assert_eq!(record["country"], "France");
    assert!(!record.contains_key("avg_transaction_size"));
}

#[test]
fn test_batch_output_records_by_stream() {
    let output = raw_batch(2);
    assert_eq!(output.records(OutputStream::RawEvents).len(), 2);
    assert!(output.records(OutputStream::GlobalKpi).is_empty());
    assert!(!output.is_empty());
    assert!(BatchOutput::default().is_empty());
    assert_eq!(OutputStream::CountryKpi.to_string(), "country-kpi");
}

// ── sinks ─────────────────────────────────────────────────────────────────

#[test]
fn test_json_lines_sink_appends() {
    let dir = unique_temp_dir("jsonl");
    let path = dir.join("out").join("raw.jsonl");
    let output = raw_batch(2);

    let mut sink = JsonLinesSink::open(&path).unwrap();
    for record in &output.raw_events {
        sink.write(record).unwrap();
    }
    sink.flush().unwrap();
    drop(sink);

    // Reopening appends instead of truncating.
    let mut sink = JsonLinesSink::open(&path).unwrap();
    assert_eq!(sink.path(), path.as_path());
    sink.write(&output.raw_events[0]).unwrap();
    sink.flush().unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 3);
    let first: Record = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first, output.raw_events[0]);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_memory_sink_scripted_failures() {
    let sink = MemorySink::new();
    let mut writer = sink.clone();
    let record = raw_batch(1).raw_events.remove(0);

    sink.fail_next_writes(2);
    assert!(writer.write(&record).is_err());
    assert!(writer.write(&record).is_err());
    writer.write(&record).unwrap();
    assert_eq!(sink.records().len(), 1);

    sink.set_fail_always(true);
    assert!(writer.write(&record).is_err());
    assert!(writer.flush().is_err());
    sink.set_fail_always(false);
    writer.flush().unwrap();
    assert_eq!(sink.flush_count(), 1);
}

// ── dispatcher ────────────────────────────────────────────────────────────

#[test]
fn test_dispatch_routes_by_stream() {
    let raw = MemorySink::new();
    let global = MemorySink::new();
    let mut dispatcher = SinkDispatcher::new(fast_retry(3));
    dispatcher
        .register("raw", OutputStream::RawEvents, Box::new(raw.clone()), Duration::ZERO)
        .unwrap();
    dispatcher
        .register("global", OutputStream::GlobalKpi, Box::new(global.clone()), Duration::ZERO)
        .unwrap();
    assert_eq!(dispatcher.sink_count(), 2);

    let mut output = raw_batch(3);
    output.global_kpis.push(global_kpi_record(&WindowResult {
        window: TimeWindow::new(0, 60_000),
        key: (),
        value: summary(3),
    }));
    dispatcher.dispatch(&output);

    let statuses = dispatcher.barrier(Duration::from_secs(5));
    assert!(statuses.iter().all(|s| s.health == SinkHealth::Healthy));
    assert_eq!(raw.records(), output.raw_events);
    assert_eq!(global.records(), output.global_kpis);
    assert!(raw.flush_count() >= 1);
}

#[test]
fn test_transient_failures_are_retried() {
    let sink = MemorySink::new();
    sink.fail_next_writes(2);
    let mut dispatcher = SinkDispatcher::new(fast_retry(3));
    dispatcher
        .register("raw", OutputStream::RawEvents, Box::new(sink.clone()), Duration::ZERO)
        .unwrap();

    dispatcher.dispatch(&raw_batch(2));
    let statuses = dispatcher.barrier(Duration::from_secs(5));
    assert_eq!(statuses[0].health, SinkHealth::Healthy);
    assert_eq!(statuses[0].written, 2);
    assert_eq!(statuses[0].retries, 2);
    assert_eq!(sink.records().len(), 2);
}

#[test]
fn test_failed_sink_is_isolated() {
    let broken = MemorySink::new();
    broken.set_fail_always(true);
    let healthy = MemorySink::new();

    let mut dispatcher = SinkDispatcher::new(fast_retry(2));
    dispatcher
        .register("broken", OutputStream::RawEvents, Box::new(broken.clone()), Duration::ZERO)
        .unwrap();
    dispatcher
        .register("healthy", OutputStream::RawEvents, Box::new(healthy.clone()), Duration::ZERO)
        .unwrap();

    dispatcher.dispatch(&raw_batch(3));
    let first = dispatcher.barrier(Duration::from_secs(5));
    assert!(first[0].is_failed());
    assert_eq!(first[0].written, 0);
    // The first record exhausts retries; the remaining two are discarded.
    assert_eq!(first[0].discarded, 2);
    assert_eq!(first[1].health, SinkHealth::Healthy);

    dispatcher.dispatch(&raw_batch(2));
    let second = dispatcher.barrier(Duration::from_secs(5));
    assert!(second[0].is_failed());
    assert_eq!(second[0].discarded, 4);
    assert_eq!(second[1].written, 5);
    assert_eq!(healthy.records().len(), 5);
    assert!(broken.records().is_empty());
}

#[test]
fn test_slow_sink_reports_lagging() {
    let slow = MemorySink::new();
    slow.set_write_delay(Duration::from_millis(200));
    let mut dispatcher = SinkDispatcher::new(fast_retry(1));
    dispatcher
        .register("slow", OutputStream::RawEvents, Box::new(slow.clone()), Duration::ZERO)
        .unwrap();

    dispatcher.dispatch(&raw_batch(2));
    let statuses = dispatcher.barrier(Duration::from_millis(10));
    assert_eq!(statuses[0].health, SinkHealth::Lagging);

    // Lagging is not failure: the records still arrive.
    thread::sleep(Duration::from_millis(600));
    let statuses = dispatcher.barrier(Duration::from_secs(5));
    assert_eq!(statuses[0].health, SinkHealth::Healthy);
    assert_eq!(slow.records().len(), 2);
}

#[test]
fn test_barrier_does_not_wait_again_on_lagging_sink() {
    let slow = MemorySink::new();
    slow.set_write_delay(Duration::from_secs(2));
    let fast = MemorySink::new();
    let mut dispatcher = SinkDispatcher::new(fast_retry(1));
    dispatcher
        .register("slow", OutputStream::RawEvents, Box::new(slow.clone()), Duration::ZERO)
        .unwrap();
    dispatcher
        .register("fast", OutputStream::GlobalKpi, Box::new(fast.clone()), Duration::ZERO)
        .unwrap();

    dispatcher.dispatch(&raw_batch(1));
    let first = dispatcher.barrier(Duration::from_millis(200));
    assert_eq!(first[0].health, SinkHealth::Lagging);

    let started = Instant::now();
    for _ in 0..4 {
        let statuses = dispatcher.barrier(Duration::from_millis(200));
        assert_eq!(statuses[0].health, SinkHealth::Lagging);
        assert_eq!(statuses[1].health, SinkHealth::Healthy);
    }
    assert!(
        started.elapsed() < Duration::from_millis(400),
        "barriers waited on the lagging sink: {:?}",
        started.elapsed()
    );
}

#[test]
fn test_shutdown_drains_and_flushes() {
    let sink = MemorySink::new();
    let mut dispatcher = SinkDispatcher::new(fast_retry(1));
    dispatcher
        .register("raw", OutputStream::RawEvents, Box::new(sink.clone()), Duration::from_secs(3600))
        .unwrap();

    dispatcher.dispatch(&raw_batch(4));
    let statuses = dispatcher.shutdown();
    assert_eq!(statuses[0].written, 4);
    assert_eq!(sink.records().len(), 4);
    assert_eq!(sink.flush_count(), 1);
}
