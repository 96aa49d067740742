//! Pair configuration.

use crate::DEFAULT_BUFFER_SIZE;

/// Buffer sizes for the two sides of a pair.
///
/// A capacity of zero means "use the endpoint's configured size", which is
/// [`DEFAULT_BUFFER_SIZE`] for freshly created endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairConfig {
    /// Write buffer size of the first endpoint.
    pub capacity_a: usize,
    /// Write buffer size of the second endpoint.
    pub capacity_b: usize,
}

impl PairConfig {
    /// Both sides use [`DEFAULT_BUFFER_SIZE`].
    pub fn new() -> Self {
        Self {
            capacity_a: DEFAULT_BUFFER_SIZE,
            capacity_b: DEFAULT_BUFFER_SIZE,
        }
    }

    /// Sets the first endpoint's buffer size.
    pub fn with_capacity_a(mut self, size: usize) -> Self {
        self.capacity_a = size;
        self
    }

    /// Sets the second endpoint's buffer size.
    pub fn with_capacity_b(mut self, size: usize) -> Self {
        self.capacity_b = size;
        self
    }

    /// Sets both capacities at once.
    pub fn with_capacity(self, size: usize) -> Self {
        self.with_capacity_a(size).with_capacity_b(size)
    }
}

impl Default for PairConfig {
    fn default() -> Self {
        Self::new()
    }
}
