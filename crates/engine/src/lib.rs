// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! kiln-engine: build execution
//!
//! [`StepBuilder`] compiles a [`Plan`](kiln_core::Plan) into a tree of
//! [`Step`]s. [`ExecEngine`] runs that tree for one build, reporting
//! through the [`BuildDelegate`]. [`DbEngine`] wraps any registered
//! [`Engine`] with lease-based tracking so that exactly one coordinator
//! runs a build at a time.

mod builder;
mod config;
mod db;
mod delegate;
mod engine;
mod env;
mod error;
mod exec;
pub mod step;

#[cfg(test)]
mod test_helpers;

pub use builder::StepBuilder;
pub use config::EngineConfig;
pub use db::{DbEngine, TrackedBuild, DB_ENGINE_NAME};
pub use delegate::{
    BuildDelegate, DelegateFactory, EventWriter, GetDelegate, ImplicitOutputs, PutDelegate,
    TaskDelegate,
};
pub use engine::{Engine, EngineBuild, EngineRegistry};
#[cfg(any(test, feature = "test-support"))]
pub use engine::{EngineCall, FakeEngine};
pub use error::{EngineError, StepError};
pub use exec::{ExecBuild, ExecEngine, ExecMetadata, StopReason, EXEC_ENGINE_NAME};
pub use step::{RunState, Step};
