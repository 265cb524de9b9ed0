use super::*;

#[test]
fn test_no_watermark_before_first_event() {
    let tracker = WatermarkTracker::new(Duration::from_secs(5));
    assert_eq!(tracker.current_watermark(), None);
    assert_eq!(tracker.max_observed(), None);
}

#[test]
fn test_watermark_advances_with_max_seen() {
    let mut tracker = WatermarkTracker::new(Duration::from_secs(5));

    tracker.observe(10_000);
    assert_eq!(tracker.current_watermark(), Some(Watermark::new(5_000)));

    tracker.observe(20_000);
    assert_eq!(tracker.current_watermark(), Some(Watermark::new(15_000)));
}

#[test]
fn test_out_of_order_event_does_not_regress_watermark() {
    let mut tracker = WatermarkTracker::new(Duration::from_secs(5));

    tracker.observe(20_000);
    tracker.observe(5_000); // older than max_seen
    assert_eq!(tracker.current_watermark(), Some(Watermark::new(15_000)));
    assert_eq!(tracker.max_observed(), Some(20_000));
}

#[test]
fn test_zero_delay_watermark() {
    let mut tracker = WatermarkTracker::new(Duration::ZERO);
    tracker.observe(1_000);
    assert_eq!(tracker.current_watermark(), Some(Watermark::new(1_000)));
}

#[test]
fn test_watermark_monotonic_for_any_arrival_order() {
    // Deterministic pseudo-random permutations of the same timestamps.
    let mut state: u64 = 0x5eed;
    for _ in 0..50 {
        let mut timestamps: Vec<EventTime> = (0..40).map(|i| i * 1_500).collect();
        for i in (1..timestamps.len()).rev() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            let j = (state >> 33) as usize % (i + 1);
            timestamps.swap(i, j);
        }

        let mut tracker = WatermarkTracker::new(Duration::from_secs(2));
        let mut previous = None;
        for ts in timestamps {
            tracker.observe(ts);
            let current = tracker.current_watermark();
            assert!(current >= previous, "watermark regressed: {previous:?} -> {current:?}");
            let wm = current.unwrap();
            assert!(wm.timestamp <= tracker.max_observed().unwrap());
            previous = current;
        }
        assert_eq!(previous, Some(Watermark::new(39 * 1_500 - 2_000)));
    }
}

#[test]
fn test_restore_reseeds_watermark() {
    let mut tracker = WatermarkTracker::new(Duration::from_secs(60));
    tracker.restore(Watermark::new(600_000));
    assert_eq!(tracker.current_watermark(), Some(Watermark::new(600_000)));
    assert_eq!(tracker.max_observed(), Some(660_000));

    // Older events after recovery do not pull it back.
    tracker.observe(30_000);
    assert_eq!(tracker.current_watermark(), Some(Watermark::new(600_000)));

    tracker.observe(700_000);
    assert_eq!(tracker.current_watermark(), Some(Watermark::new(640_000)));
}

#[test]
fn test_restore_with_larger_delay_keeps_floor() {
    // Checkpoint written with a 10s delay, restarted with a 60s delay.
    let mut tracker = WatermarkTracker::new(Duration::from_secs(60));
    tracker.restore(Watermark::new(100_000));
    tracker.observe(120_000);
    assert_eq!(tracker.current_watermark(), Some(Watermark::new(100_000)));
}
