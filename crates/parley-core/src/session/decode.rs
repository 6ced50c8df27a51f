use parley_abi::InferenceEngine;
use tracing::{trace, warn};

use super::utils::utf8_valid_prefix_len;
use super::{ChatSession, GenerationState, Step, StopReason};
use crate::error::SessionError;

impl<E: InferenceEngine> ChatSession<E> {
    /// Advance generation by one token.
    ///
    /// Decodes the pending batch, samples, and either returns the new piece
    /// (after queueing it as the next one-token batch) or ends the turn. Both
    /// end conditions commit the response to history. Nothing is decoded once
    /// the context window is down to its headroom slot.
    pub fn step(&mut self) -> Result<Step, SessionError> {
        match self.state {
            GenerationState::Failed => return Err(SessionError::Failed),
            GenerationState::Idle | GenerationState::Stopped => {
                return Err(SessionError::NoPendingBatch);
            }
            GenerationState::PromptSubmitted | GenerationState::Generating => {}
        }

        if !self.window.can_advance(0) {
            warn!(
                context_used = self.window.used(),
                capacity = self.window.capacity(),
                "context window exhausted"
            );
            return Ok(self.finish(StopReason::ContextExhausted));
        }

        let decoded = match self.batches.current() {
            Some(batch) => self.engine.decode(batch),
            None => return Err(SessionError::NoPendingBatch),
        };
        self.check(decoded)?;

        let sampled = self.engine.sample();
        let token = self.check(sampled)?;

        if self.engine.is_end_of_generation(token) {
            trace!(token = token.0, "end-of-generation token sampled");
            return Ok(self.finish(StopReason::EndOfGeneration));
        }

        let bytes = self.engine.token_to_piece(token);
        let bytes = self.check(bytes)?;
        let piece = self.take_valid_piece(&bytes);
        self.response.push_str(&piece);

        let built = self
            .batches
            .build_step_batch(&self.engine, &self.window, token);
        self.check(built)?;
        self.window.advance(1);

        self.state = GenerationState::Generating;
        trace!(token = token.0, piece = %piece, context_used = self.window.used(), "step");
        Ok(Step::Piece(piece))
    }

    /// Stage `bytes` and hand back the longest complete UTF-8 prefix.
    ///
    /// Bytes that can never complete a character are flushed as U+FFFD so
    /// they do not hold back later output. An incomplete trailing character
    /// stays staged even when a malformed byte precedes it.
    fn take_valid_piece(&mut self, bytes: &[u8]) -> String {
        self.staging.extend_from_slice(bytes);

        let mut end = 0;
        loop {
            end += utf8_valid_prefix_len(&self.staging[end..]);
            match std::str::from_utf8(&self.staging[end..]) {
                Err(e) => match e.error_len() {
                    Some(bad) => end += bad,
                    None => break,
                },
                Ok(_) => break,
            }
        }

        let taken: Vec<u8> = self.staging.drain(..end).collect();
        String::from_utf8_lossy(&taken).into_owned()
    }
}
