// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracking leases: a claim row per build with an expiry on the store clock.

use crate::db::TrackingLock;
use crate::error::StoreError;
use crate::store::BuildStore;
use async_trait::async_trait;
use kiln_core::{BuildId, Clock};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Lease {
    pub token: Uuid,
    pub expires_at_ms: u64,
}

/// Runtime-only lease table. Leases are not written to the WAL: after a
/// restart every lease has lapsed anyway.
#[derive(Debug, Default)]
pub(crate) struct LeaseTable {
    leases: HashMap<BuildId, Lease>,
}

impl LeaseTable {
    /// Claim `id` unless a live lease exists.
    pub fn claim(&mut self, id: &BuildId, now_ms: u64, duration: Duration) -> Option<Uuid> {
        if let Some(lease) = self.leases.get(id) {
            if lease.expires_at_ms > now_ms {
                return None;
            }
        }
        let token = Uuid::new_v4();
        self.leases.insert(id.clone(), Lease { token, expires_at_ms: expiry(now_ms, duration) });
        Some(token)
    }

    /// Extend a live lease still held under `token`.
    pub fn renew(&mut self, id: &BuildId, token: Uuid, now_ms: u64, duration: Duration) -> bool {
        match self.leases.get_mut(id) {
            Some(lease) if lease.token == token && lease.expires_at_ms > now_ms => {
                lease.expires_at_ms = expiry(now_ms, duration);
                true
            }
            _ => false,
        }
    }

    /// Drop the lease if still held under `token`.
    pub fn release(&mut self, id: &BuildId, token: Uuid) -> bool {
        if self.leases.get(id).is_some_and(|l| l.token == token) {
            self.leases.remove(id);
            return true;
        }
        false
    }

    pub fn get(&self, id: &BuildId) -> Option<Lease> {
        self.leases.get(id).copied()
    }
}

fn expiry(now_ms: u64, duration: Duration) -> u64 {
    now_ms.saturating_add(duration.as_millis() as u64)
}

/// A lease held on a [`BuildStore`] build.
pub(crate) struct StoreLease<C: Clock> {
    pub store: BuildStore<C>,
    pub id: BuildId,
    pub token: Uuid,
    pub duration: Duration,
}

#[async_trait]
impl<C: Clock> TrackingLock for StoreLease<C> {
    async fn renew(&self) -> Result<(), StoreError> {
        if self.store.renew_lease(&self.id, self.token, self.duration) {
            Ok(())
        } else {
            Err(StoreError::LeaseLost(self.id.clone()))
        }
    }

    async fn release(&self) -> Result<(), StoreError> {
        if !self.store.release_lease(&self.id, self.token) {
            tracing::debug!(build_id = %self.id, "lease already gone at release");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "lease_tests.rs"]
mod tests;
