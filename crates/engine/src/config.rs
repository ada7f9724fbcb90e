// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration

use crate::env;
use std::time::Duration;

/// Lease duration when nothing overrides it
pub const DEFAULT_TRACK_LOCK_DURATION: Duration = Duration::from_secs(60);

pub const DEFAULT_TRACKER: &str = "local";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// How long one tracking lease lasts before another coordinator may
    /// claim the build
    pub track_lock_duration: Duration,
    /// How often a tracker renews its lease; half the lease when unset
    pub lease_renew_interval: Option<Duration>,
    /// Recorded on each build this engine tracks
    pub tracker: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            track_lock_duration: DEFAULT_TRACK_LOCK_DURATION,
            lease_renew_interval: None,
            tracker: DEFAULT_TRACKER.to_string(),
        }
    }
}

impl EngineConfig {
    kiln_core::setters! {
        into { tracker: String }
        set { track_lock_duration: Duration }
        option { lease_renew_interval: Duration }
    }

    /// Defaults overridden by `KILN_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(d) = env::track_lock_duration() {
            config.track_lock_duration = d;
        }
        config.lease_renew_interval = env::lease_renew_interval();
        if let Some(tracker) = env::tracker() {
            config.tracker = tracker;
        }
        config
    }

    /// Effective renew interval. Never zero and at most half the lease, so
    /// a renewal always lands while the lease is still live.
    pub fn renew_interval(&self) -> Duration {
        let half = self.track_lock_duration / 2;
        self.lease_renew_interval.unwrap_or(half).min(half).max(Duration::from_millis(1))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
