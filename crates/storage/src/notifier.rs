// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-tracker abort notification

use tokio::sync::watch;

/// Subscription to a build's aborted flag.
///
/// Dropping the notifier closes the subscription.
#[derive(Debug)]
pub struct AbortNotifier {
    rx: watch::Receiver<bool>,
}

impl AbortNotifier {
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    /// Resolve once the build is marked aborted. Resolves immediately if it
    /// already was when the subscription was taken. Never resolves if the
    /// publisher goes away without aborting.
    pub async fn notified(&mut self) {
        if self.rx.wait_for(|aborted| *aborted).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }
}
