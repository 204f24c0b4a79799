//! Late-bound render inputs.
//!
//! A deferred parameter arrives as a `LateValue`: a fill-once cell the
//! host completes after the render has reported `DataUnavailable`. The
//! render core never blocks waiting for it; availability is checked
//! without blocking at the compiled await points.

use std::sync::{Arc, Mutex};

use crate::value::Value;

/// A shareable, fill-once value cell.
#[derive(Debug, Clone, Default)]
pub struct LateValue {
    cell: Arc<Mutex<Option<Value>>>,
}

impl LateValue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Complete the cell. Later calls overwrite only if the render has
    /// not observed the value yet; hosts are expected to supply once.
    pub fn supply(&self, value: Value) {
        *self.cell.lock().expect("late-value lock poisoned") = Some(value);
    }

    pub fn is_ready(&self) -> bool {
        self.cell
            .lock()
            .expect("late-value lock poisoned")
            .is_some()
    }

    /// Non-blocking read.
    pub fn get(&self) -> Option<Value> {
        self.cell.lock().expect("late-value lock poisoned").clone()
    }
}

/// How a parameter is supplied at instantiation.
#[derive(Debug, Clone)]
pub enum Provided {
    Value(Value),
    Late(LateValue),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_once_cell() {
        let late = LateValue::new();
        assert!(!late.is_ready());
        assert!(late.get().is_none());

        late.supply(Value::Int(5));
        assert!(late.is_ready());
        assert_eq!(late.get(), Some(Value::Int(5)));
    }

    #[test]
    fn clones_share_the_cell() {
        let late = LateValue::new();
        let other = late.clone();
        late.supply(Value::Str("shared".into()));
        assert_eq!(other.get(), Some(Value::Str("shared".into())));
    }
}
