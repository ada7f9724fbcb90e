// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! kiln-storage: build persistence
//!
//! The [`BuildDb`] trait is the contract the engine tracks builds through.
//! [`BuildStore`] implements it over a [`MaterializedState`] derived from
//! an append-only [`Wal`].

mod db;
mod error;
mod lease;
mod notifier;
mod state;
mod store;
mod wal;

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake;

pub use db::{BuildDb, TrackingLock};
pub use error::{StoreError, WalError};
pub use notifier::AbortNotifier;
pub use state::{BuildRow, MaterializedState, SavedOutput, StoreOp};
pub use store::{BuildStore, StoredBuild};
pub use wal::{Wal, WalEntry};

#[cfg(any(test, feature = "test-support"))]
pub use fake::{DbCall, FakeBuildDb, LockScript};
