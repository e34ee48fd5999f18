//! Hopper disassembler integration.
//!
//! The host state lives in a [`Session`] owned by a single worker loop
//! ([`run_hopper_loop`]). Tool calls reach it through a bounded channel
//! ([`HopperWorker`]), so every request runs to completion before the next
//! one starts.

pub mod cache;
pub mod callgraph;
pub mod handlers;
pub mod host;
mod loop_impl;
pub mod request;
pub mod resolve;
pub mod session;
pub mod snapshot;
pub mod types;
pub mod worker;

pub use host::HopperHost;
pub use loop_impl::run_hopper_loop;
pub use request::HopperRequest;
pub use session::Session;
pub use snapshot::SnapshotHost;
pub use types::*;
pub use worker::HopperWorker;
