//! Append-only destinations for reduce output.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::source::MemorySource;

/// A thread-safe appender. All implementations must tolerate concurrent
/// writers — the reduce stage's worker pool writes to one shared sink.
pub trait Sink<T>: Send + Sync {
    fn write(&self, value: T);
}

/// Appends to an internal ordered sequence under a mutex.
pub struct MemorySink<T> {
    data: Mutex<VecDeque<T>>,
}

impl<T> MemorySink<T> {
    pub fn new() -> Self {
        Self { data: Mutex::new(VecDeque::new()) }
    }

    /// Snapshots the current contents without consuming them.
    pub fn snapshot(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.data.lock().iter().cloned().collect()
    }

    /// Converts the sink into a [`MemorySource`] that owns everything
    /// written so far, in write order.
    pub fn into_source(self) -> MemorySource<T> {
        MemorySource::new(self.data.into_inner())
    }
}

impl<T> Default for MemorySink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> Sink<T> for MemorySink<T> {
    fn write(&self, value: T) {
        self.data.lock().push_back(value);
    }
}
