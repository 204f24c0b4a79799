//! Render runtime for compiled Weft units.
//!
//! A compiled unit is instantiated once per render in progress and
//! advanced as an explicit state machine: each advance runs until the
//! render completes, a deferred input turns out to be unavailable, or
//! the output sink reports backpressure. Suspension saves the live
//! locals into unit fields and records the suspension point; the next
//! advance restores them and continues exactly where it left off, so no
//! side effect before the point ever repeats.

pub mod error;
pub mod escape;
pub mod input;
pub mod instance;
pub mod sink;
pub mod unit_set;
pub mod value;

pub use error::RenderError;
pub use input::{LateValue, Provided};
pub use instance::{ParamBindings, RenderInstance, RenderStatus, UnitSource};
pub use sink::{LimitedSink, OutputSink};
pub use unit_set::UnitSet;
pub use value::Value;
