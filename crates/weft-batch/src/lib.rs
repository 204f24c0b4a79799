//! Batch orchestration over a template collection.
//!
//! Two modes share one compile loop: eager mode walks every template in
//! the registry and feeds each produced unit to caller-supplied listener
//! hooks (archive writing, in-memory collection, statistics); lazy mode
//! wires an on-demand loader behind the host's unit lookup and compiles
//! nothing up front. Per-template failures are isolated: one broken
//! template is reported and the loop moves on.

pub mod error;
pub mod listener;
pub mod orchestrator;

pub use error::BatchError;
pub use listener::CompileListener;
pub use orchestrator::{compile_all, lazy_loader, pack_collection, BatchReport};
