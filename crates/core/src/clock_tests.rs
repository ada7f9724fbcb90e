// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn system_clock_is_monotonic() {
    let clock = SystemClock;
    let t1 = clock.now();
    std::thread::sleep(Duration::from_millis(1));
    assert!(clock.now() > t1);
}

#[test]
fn fake_clock_advance_moves_both_clocks() {
    let clock = FakeClock::new();
    let t1 = clock.now();
    let ms = clock.epoch_ms();

    clock.advance(Duration::from_secs(90));

    assert_eq!(clock.now().duration_since(t1), Duration::from_secs(90));
    assert_eq!(clock.epoch_ms(), ms + 90_000);
}

#[test]
fn fake_clock_clones_share_time() {
    let clock = FakeClock::new();
    let other = clock.clone();
    let t1 = clock.now();
    other.advance(Duration::from_secs(30));
    assert_eq!(clock.now().duration_since(t1), Duration::from_secs(30));
}

#[test]
fn epoch_secs_truncates_millis() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(12_999);
    assert_eq!(clock.epoch_secs(), 12);
}
