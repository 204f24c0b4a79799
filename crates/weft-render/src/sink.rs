//! Output sinks with backpressure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Where rendered text goes. `is_limited` is the backpressure signal:
/// when it returns true, the next compiled output checkpoint suspends
/// the render with `OutputLimited`.
pub trait OutputSink {
    fn push_str(&mut self, text: &str);

    fn is_limited(&self) -> bool {
        false
    }
}

impl OutputSink for String {
    fn push_str(&mut self, text: &str) {
        String::push_str(self, text);
    }
}

/// A buffering sink whose backpressure flag can be flipped externally,
/// e.g. by a host draining the buffer.
#[derive(Debug, Default)]
pub struct LimitedSink {
    buf: String,
    limited: Arc<AtomicBool>,
}

impl LimitedSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for toggling the backpressure flag from elsewhere.
    pub fn limiter(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.limited)
    }

    pub fn set_limited(&self, limited: bool) {
        self.limited.store(limited, Ordering::SeqCst);
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}

impl OutputSink for LimitedSink {
    fn push_str(&mut self, text: &str) {
        self.buf.push_str(text);
    }

    fn is_limited(&self) -> bool {
        self.limited.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_sink_collects() {
        let mut out = String::new();
        out.push_str("ab");
        OutputSink::push_str(&mut out, "cd");
        assert_eq!(out, "abcd");
        assert!(!OutputSink::is_limited(&out));
    }

    #[test]
    fn limited_sink_toggles() {
        let mut sink = LimitedSink::new();
        sink.push_str("x");
        assert!(!sink.is_limited());
        sink.set_limited(true);
        assert!(sink.is_limited());
        sink.set_limited(false);
        assert!(!sink.is_limited());
        assert_eq!(sink.as_str(), "x");
    }
}
