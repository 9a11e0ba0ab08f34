//! Output buffer between the router and the stream consumer
//!
//! Holds rendered text chunks in emission order until the consumer drains
//! them, plus the end-of-output signal.

use std::collections::VecDeque;

/// Ordered queue of emitted text chunks
#[derive(Debug, Default)]
pub struct OutputBuffer {
    chunks: VecDeque<String>,
    ended: bool,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a chunk. Chunks pushed after [`OutputBuffer::end`] are dropped.
    pub fn push(&mut self, chunk: impl Into<String>) {
        if self.ended {
            log::warn!("Dropping output written after end of stream");
            return;
        }
        self.chunks.push_back(chunk.into());
    }

    /// Signal that no more chunks will be pushed
    pub fn end(&mut self) {
        self.ended = true;
    }

    /// True once [`OutputBuffer::end`] has been called
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// True when the end was signaled and every chunk was consumed
    pub fn is_finished(&self) -> bool {
        self.ended && self.chunks.is_empty()
    }

    /// Take the oldest queued chunk
    pub fn pop(&mut self) -> Option<String> {
        self.chunks.pop_front()
    }

    /// Take every queued chunk in order
    pub fn drain(&mut self) -> std::collections::vec_deque::Drain<'_, String> {
        self.chunks.drain(..)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}
