// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the engine crate.

use std::time::Duration;

fn duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var).ok().and_then(|s| s.parse::<u64>().ok()).map(Duration::from_millis)
}

/// Tracking lease duration override (`KILN_TRACK_LOCK_MS`)
pub fn track_lock_duration() -> Option<Duration> {
    duration_ms("KILN_TRACK_LOCK_MS").filter(|d| !d.is_zero())
}

/// Lease renew interval override (`KILN_LEASE_RENEW_MS`)
pub fn lease_renew_interval() -> Option<Duration> {
    duration_ms("KILN_LEASE_RENEW_MS").filter(|d| !d.is_zero())
}

/// Identity recorded on builds this process tracks (`KILN_TRACKER`)
pub fn tracker() -> Option<String> {
    std::env::var("KILN_TRACKER").ok().filter(|s| !s.is_empty())
}
