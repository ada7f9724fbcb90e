// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use async_trait::async_trait;
use kiln_adapters::LogSink;
use kiln_core::{Event, Origin};
use kiln_storage::BuildDb;
use parking_lot::Mutex;
use std::sync::Arc;

/// Turns one output stream of a step into `Log` events.
///
/// A chunk ending in the middle of a UTF-8 sequence is held back until the
/// rest arrives, so no event carries a broken character.
pub struct EventWriter {
    build: Arc<dyn BuildDb>,
    origin: Origin,
    dangling: Mutex<Vec<u8>>,
}

impl EventWriter {
    pub fn new(build: Arc<dyn BuildDb>, origin: Origin) -> Self {
        Self { build, origin, dangling: Mutex::new(Vec::new()) }
    }

    /// Text ready to emit, leaving an incomplete trailing sequence buffered.
    fn complete_text(&self, bytes: &[u8]) -> Option<String> {
        let mut buf = self.dangling.lock();
        buf.extend_from_slice(bytes);
        let ready = match std::str::from_utf8(&buf) {
            Ok(_) => buf.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => buf.len(),
        };
        if ready == 0 {
            return None;
        }
        let text = String::from_utf8_lossy(&buf[..ready]).into_owned();
        buf.drain(..ready);
        Some(text)
    }
}

#[async_trait]
impl LogSink for EventWriter {
    async fn write(&self, bytes: &[u8]) {
        let Some(payload) = self.complete_text(bytes) else {
            return;
        };
        let event = Event::Log { origin: self.origin.clone(), payload };
        if let Err(e) = self.build.save_event(&event).await {
            tracing::error!(
                build_id = %self.build.id(),
                origin = %self.origin.id,
                error = %e,
                "failed to save log event"
            );
        }
    }
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;
