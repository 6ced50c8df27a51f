//! Bookkeeping for how much of the engine's KV cache a session has filled.

/// Tokens resident in the KV cache versus the fixed context capacity.
///
/// `used` is the only source of positions for new tokens: a token at offset `i`
/// of a batch lands at `used + i`. One slot is kept as headroom, so decoding
/// stops once `used` reaches `capacity - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextWindow {
    used: usize,
    capacity: usize,
}

impl ContextWindow {
    pub fn new(capacity: usize) -> Self {
        Self { used: 0, capacity }
    }

    #[inline]
    pub fn used(&self) -> usize {
        self.used
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether `n_new` more tokens still leave the headroom slot free.
    #[inline]
    pub fn can_advance(&self, n_new: usize) -> bool {
        self.used.saturating_add(n_new) < self.capacity.saturating_sub(1)
    }

    /// Position for the token at `offset` within the next submitted batch.
    #[inline]
    pub fn next_position(&self, offset: usize) -> usize {
        self.used + offset
    }

    /// Tokens left before the headroom slot.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(1).saturating_sub(self.used)
    }

    /// Record `n` tokens as handed to the engine.
    #[inline]
    pub fn advance(&mut self, n: usize) {
        self.used += n;
    }
}
