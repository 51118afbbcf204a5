//! Tests for utility functions

use status_ingest::util::{init_tracing, now_ms, Clock, ManualClock, SystemClock};

#[test]
fn test_system_clock_tracks_wall_clock() {
    let before = now_ms();
    let clock_now = SystemClock.now_ms();
    assert!(clock_now >= before);
    assert!(clock_now - before < 60_000);
}

#[test]
fn test_manual_clock_moves_only_when_told() {
    let clock = ManualClock::new(5_000);
    assert_eq!(clock.now_ms(), 5_000);
    clock.advance_ms(1_500);
    assert_eq!(clock.now_ms(), 6_500);
    clock.set_ms(60_000);
    assert_eq!(clock.now_ms(), 60_000);
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
}
