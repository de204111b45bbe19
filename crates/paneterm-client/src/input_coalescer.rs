//! Input batching for pane transports.
//!
//! Medium-sized inputs (fast typing, IME commits, small programmatic writes)
//! are merged into one transport send per animation tick. Two classes skip
//! the buffer:
//!
//! - **Short inputs** (single keystrokes): latency matters more than frame count.
//! - **Large inputs** (pastes): already one big send, nothing to gain by waiting.
//!
//! Anything already buffered is flushed ahead of a fast-path input, so the
//! server always sees input in submission order.
//!
//! ```
//! use paneterm_client::config::InputConfig;
//! use paneterm_client::input_coalescer::InputCoalescer;
//!
//! let mut input = InputCoalescer::new(InputConfig::default());
//! assert!(input.push("hello").is_empty()); // buffered until the next tick
//! assert_eq!(input.push("\r"), vec!["hello".to_string(), "\r".to_string()]);
//! ```

use crate::config::InputConfig;

/// Per-pane input buffer.
#[derive(Debug, Clone)]
pub struct InputCoalescer {
    config: InputConfig,
    buffer: String,
    buffered_chars: usize,
}

impl InputCoalescer {
    #[must_use]
    pub fn new(config: InputConfig) -> Self {
        Self {
            config,
            buffer: String::new(),
            buffered_chars: 0,
        }
    }

    /// Submit input. Returns the sends to perform now, in order.
    ///
    /// An empty result with [`has_pending`](Self::has_pending) set means the
    /// caller should flush on the next animation frame.
    pub fn push(&mut self, data: &str) -> Vec<String> {
        if data.is_empty() {
            return Vec::new();
        }
        let chars = data.chars().count();
        if chars <= self.config.immediate_max_chars || chars >= self.config.batch_threshold_chars {
            let mut sends = Vec::with_capacity(2);
            sends.extend(self.flush());
            sends.push(data.to_string());
            return sends;
        }

        self.buffer.push_str(data);
        self.buffered_chars += chars;
        if self.buffered_chars >= self.config.batch_threshold_chars {
            return self.flush().into_iter().collect();
        }
        Vec::new()
    }

    /// Take the buffered input, if any.
    pub fn flush(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        self.buffered_chars = 0;
        Some(std::mem::take(&mut self.buffer))
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Discard buffered input.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.buffered_chars = 0;
    }
}
