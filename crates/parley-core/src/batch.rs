//! Single-owner lifecycle for the batch that feeds the next decode call.
//!
//! The manager holds at most one engine batch. Building a new one drops the
//! old one first, and the batch type frees its native storage in `Drop`, so
//! each allocation is released exactly once on every path.

use parley_abi::{EngineError, InferenceEngine, SeqId, Token, TokenBatch};
use tracing::trace;

use crate::context::ContextWindow;

pub struct BatchManager<B: TokenBatch> {
    current: Option<B>,
}

impl<B: TokenBatch> Default for BatchManager<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: TokenBatch> BatchManager<B> {
    pub fn new() -> Self {
        Self { current: None }
    }

    /// The batch awaiting decode, if any.
    #[inline]
    pub fn current(&self) -> Option<&B> {
        self.current.as_ref()
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.current.is_some()
    }

    /// Fill a batch with the whole prompt and advance `window` by its length.
    ///
    /// Positions continue from `window.used()`; only the final token requests
    /// logits, since generation starts from it.
    pub fn build_prompt_batch<E>(
        &mut self,
        engine: &E,
        window: &mut ContextWindow,
        tokens: &[Token],
    ) -> Result<(), EngineError>
    where
        E: InferenceEngine<Batch = B>,
    {
        self.release();
        if tokens.is_empty() {
            return Err(EngineError::BatchAlloc { capacity: 0 });
        }

        let mut batch = engine.new_batch(tokens.len())?;
        let last = tokens.len() - 1;
        for (i, token) in tokens.iter().enumerate() {
            batch.push(*token, window.next_position(i), SeqId::PRIMARY, i == last)?;
        }
        trace!(
            n_tokens = tokens.len(),
            first_pos = window.used(),
            "built prompt batch"
        );

        self.current = Some(batch);
        window.advance(tokens.len());
        Ok(())
    }

    /// Replace the held batch with a one-token batch at the current position.
    ///
    /// `window` is not advanced here; the caller does that once the token has
    /// been accounted for.
    pub fn build_step_batch<E>(
        &mut self,
        engine: &E,
        window: &ContextWindow,
        token: Token,
    ) -> Result<(), EngineError>
    where
        E: InferenceEngine<Batch = B>,
    {
        self.release();

        let mut batch = engine.new_batch(1)?;
        batch.push(token, window.next_position(0), SeqId::PRIMARY, true)?;
        trace!(token = token.0, pos = window.used(), "built step batch");

        self.current = Some(batch);
        Ok(())
    }

    /// Drop the held batch, if any. Safe to call repeatedly.
    #[inline]
    pub fn release(&mut self) {
        if self.current.take().is_some() {
            trace!("released pending batch");
        }
    }
}
