//! WPK archive format for compiled Weft units.
//!
//! The format uses a fixed-size header with magic bytes, version, and
//! flags, followed by length-prefixed named entries (one per compiled
//! unit) and a delegate-template manifest, terminated by a SHA-256
//! content hash for integrity verification.

pub mod builder;
pub mod format;

pub use builder::PackBuilder;
pub use format::{PackEntry, PackError, PackFile, PackFlags, PackVersion, MAGIC};
