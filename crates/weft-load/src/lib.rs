//! On-demand unit loading.
//!
//! A lazily populated, concurrency-safe table from unit name to
//! compiled artifact. A miss compiles the owning template synchronously
//! and populates every unit it produced; racing callers may duplicate
//! that work (artifacts are deterministic) but never observe a
//! partially constructed entry.

pub mod error;
pub mod loader;

pub use error::LoadError;
pub use loader::{Resolution, UnitLoader};
