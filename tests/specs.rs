//! Behavioral specs for the build engine.
//!
//! Each spec drives real stores and engines end to end; only the worker
//! runtime and metrics sink are faked.

#[path = "specs/prelude.rs"]
mod prelude;

#[path = "specs/build"]
mod build {
    mod abort;
    mod hooks;
    mod outputs;
    mod timeout;
}

#[path = "specs/tracking"]
mod tracking {
    mod coordinators;
    mod recovery;
}
