// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

#[test]
fn fake_clock_advances() {
    let clock = FakeClock::new();
    let start_ms = clock.epoch_ms();
    clock.advance(Duration::from_secs(90));
    assert_eq!(clock.epoch_ms(), start_ms + 90_000);
}

#[test]
fn fake_clock_instant_advances() {
    let clock = FakeClock::new();
    let t0 = clock.now();
    clock.advance(Duration::from_millis(250));
    assert_eq!(clock.now().duration_since(t0), Duration::from_millis(250));
}

#[test]
fn wallclock_iso_is_deterministic_for_fake_clock() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(1_700_000_000_000);
    assert_eq!(clock.wallclock_iso(), "2023-11-14T22:13:20.000Z");
}

#[test]
fn iso_from_epoch_ms_keeps_millis() {
    assert_eq!(iso_from_epoch_ms(1_700_000_000_123), "2023-11-14T22:13:20.123Z");
}

#[test]
fn system_clock_epoch_is_sane() {
    let clock = SystemClock;
    // Past 2020-01-01, well before year 3000.
    assert!(clock.epoch_ms() > 1_577_836_800_000);
    assert!(clock.epoch_ms() < 32_503_680_000_000);
}
