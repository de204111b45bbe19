#![forbid(unsafe_code)]

//! Per-pane output queue with batching and watermark backpressure.
//!
//! Output chunks are queued as they arrive and written to the display in
//! batches, one write in flight at a time. Bytes stay counted until the write
//! that carries them completes.
//!
//! # Backpressure
//!
//! The flag rises when queued bytes reach `high_water_bytes` and only falls
//! once a completion brings them to `low_water_bytes` or below, so it does not
//! flap while the queue hovers between the two marks.
//!
//! # Batching
//!
//! A batch is the head chunk plus following chunks of the same session. A
//! chunk is never split. A chunk that would overshoot `batch_target_bytes` is
//! still taken while the batch is under half the target, and refused after.
//! A chunk that clears scrollback always starts its own batch.

use std::collections::VecDeque;

use crate::config::OutputConfig;

/// One unit of display output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    /// Filtered text to display.
    pub text: String,
    /// Owning session; may be empty.
    pub session: String,
    /// Bytes this chunk represents in the session's durable log.
    pub log_bytes: u64,
    /// Clear local scrollback before writing this chunk.
    pub clear_scrollback: bool,
}

impl OutputChunk {
    /// Queue accounting size (UTF-8 bytes of the displayed text).
    #[must_use]
    pub fn bytes(&self) -> usize {
        self.text.len()
    }
}

/// A coalesced display write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteBatch {
    pub text: String,
    pub session: String,
    pub bytes: usize,
    pub log_bytes: u64,
    pub chunks: usize,
    pub clear_scrollback: bool,
}

/// What a completed write released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchCompletion {
    pub session: String,
    pub log_bytes: u64,
    pub chunks: usize,
    /// Backpressure was lifted by this completion.
    pub relieved: bool,
}

#[derive(Debug, Clone)]
struct InFlight {
    session: String,
    bytes: usize,
    log_bytes: u64,
    chunks: usize,
}

/// FIFO of pending output for one pane.
#[derive(Debug, Clone)]
pub struct OutputQueue {
    config: OutputConfig,
    chunks: VecDeque<OutputChunk>,
    queued_bytes: usize,
    backpressured: bool,
    in_flight: Option<InFlight>,
}

impl OutputQueue {
    #[must_use]
    pub fn new(config: OutputConfig) -> Self {
        Self {
            config,
            chunks: VecDeque::new(),
            queued_bytes: 0,
            backpressured: false,
            in_flight: None,
        }
    }

    /// Bytes queued or in flight.
    #[must_use]
    pub fn queued_bytes(&self) -> usize {
        self.queued_bytes
    }

    #[must_use]
    pub fn is_backpressured(&self) -> bool {
        self.backpressured
    }

    #[must_use]
    pub fn write_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Chunks waiting for a batch (excluding the in-flight write).
    #[must_use]
    pub fn pending_chunks(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.chunks.is_empty() && self.in_flight.is_none()
    }

    /// Append a chunk. Returns `true` if this raised backpressure.
    pub fn enqueue(&mut self, chunk: OutputChunk) -> bool {
        self.queued_bytes = self.queued_bytes.saturating_add(chunk.bytes());
        self.chunks.push_back(chunk);
        if !self.backpressured && self.queued_bytes >= self.config.high_water_bytes {
            self.backpressured = true;
            return true;
        }
        false
    }

    /// Take the next batch and mark it in flight.
    ///
    /// Returns `None` while a write is in flight or when nothing is queued.
    pub fn take_batch(&mut self) -> Option<WriteBatch> {
        if self.in_flight.is_some() {
            return None;
        }
        let head = self.chunks.pop_front()?;
        let target = self.config.batch_target_bytes;
        let half = target / 2;

        let mut batch = WriteBatch {
            bytes: head.bytes(),
            log_bytes: head.log_bytes,
            chunks: 1,
            clear_scrollback: head.clear_scrollback,
            session: head.session,
            text: head.text,
        };

        while let Some(next) = self.chunks.front() {
            if next.session != batch.session || next.clear_scrollback {
                break;
            }
            let total = batch.bytes + next.bytes();
            if total > target && batch.bytes > half {
                break;
            }
            if batch.bytes >= target {
                break;
            }
            let Some(next) = self.chunks.pop_front() else {
                break;
            };
            batch.bytes = total;
            batch.log_bytes = batch.log_bytes.saturating_add(next.log_bytes);
            batch.chunks += 1;
            batch.text.push_str(&next.text);
        }

        self.in_flight = Some(InFlight {
            session: batch.session.clone(),
            bytes: batch.bytes,
            log_bytes: batch.log_bytes,
            chunks: batch.chunks,
        });
        Some(batch)
    }

    /// Mark the in-flight write as done.
    pub fn complete(&mut self) -> Option<BatchCompletion> {
        let done = self.in_flight.take()?;
        self.queued_bytes = self.queued_bytes.saturating_sub(done.bytes);
        let relieved = self.backpressured && self.queued_bytes <= self.config.low_water_bytes;
        if relieved {
            self.backpressured = false;
        }
        Some(BatchCompletion {
            session: done.session,
            log_bytes: done.log_bytes,
            chunks: done.chunks,
            relieved,
        })
    }

    /// Drop everything, including the in-flight marker.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.queued_bytes = 0;
        self.backpressured = false;
        self.in_flight = None;
    }
}
