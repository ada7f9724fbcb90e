// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use kiln_core::{BuildId, EnvelopeError};
use thiserror::Error;

/// Errors from the write-ahead log
#[derive(Debug, Error)]
pub enum WalError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from build persistence
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("build not found: {0}")]
    NotFound(BuildId),
    #[error("tracking lease lost for build {0}")]
    LeaseLost(BuildId),
    #[error("wal error: {0}")]
    Wal(#[from] WalError),
    #[error("event encoding error: {0}")]
    Envelope(#[from] EnvelopeError),
    #[error("plan encoding error: {0}")]
    Plan(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
