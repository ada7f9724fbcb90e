// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Implicit output candidates

use kiln_core::VersionedResource;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Default)]
struct Candidates {
    by_resource: BTreeMap<String, VersionedResource>,
    explicit: HashSet<String>,
}

/// Resources fetched by gets that become build outputs if the build
/// succeeds, unless a put targets the same resource.
///
/// Gets and puts under an aggregate complete concurrently, so every access
/// goes through one mutex.
#[derive(Debug, Default)]
pub struct ImplicitOutputs {
    inner: Mutex<Candidates>,
}

impl ImplicitOutputs {
    /// Register a candidate. Returns `false` if a put already claimed the
    /// resource.
    pub fn register(&self, output: VersionedResource) -> bool {
        let mut inner = self.inner.lock();
        if inner.explicit.contains(&output.resource) {
            return false;
        }
        inner.by_resource.insert(output.resource.clone(), output);
        true
    }

    /// Drop any candidate for `resource` and refuse future ones.
    pub fn unregister(&self, resource: &str) {
        let mut inner = self.inner.lock();
        inner.by_resource.remove(resource);
        inner.explicit.insert(resource.to_string());
    }

    pub fn snapshot(&self) -> Vec<VersionedResource> {
        self.inner.lock().by_resource.values().cloned().collect()
    }

    /// Remove and return every candidate, ordered by resource name.
    pub fn take(&self) -> Vec<VersionedResource> {
        std::mem::take(&mut self.inner.lock().by_resource).into_values().collect()
    }
}
