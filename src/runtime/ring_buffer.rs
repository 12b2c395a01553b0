//! Fixed-capacity line store with oldest-first eviction.

use std::collections::VecDeque;

/// Append-only sequence of lines holding at most `capacity` entries.
///
/// One buffer belongs to one stream pump, which is its only writer. It is
/// read once, after the pump has returned it, so [`snapshot`](Self::snapshot)
/// never races a [`push`](Self::push).
#[derive(Debug, Clone)]
pub struct RingBuffer {
    lines: VecDeque<String>,
    capacity: usize,
    evicted: u64,
}

impl RingBuffer {
    /// Create a buffer holding at most `capacity` lines (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            // Grows on demand up to `capacity`
            lines: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            evicted: 0,
        }
    }

    /// Append a line, evicting the oldest one if the buffer is full
    pub fn push(&mut self, line: impl Into<String>) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
            self.evicted += 1;
        }
        self.lines.push_back(line.into());
    }

    /// Current content in insertion order
    pub fn snapshot(&self) -> Vec<&str> {
        self.lines.iter().map(String::as_str).collect()
    }

    /// Number of lines dropped to respect the capacity
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
