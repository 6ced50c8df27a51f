use parley_abi::InferenceEngine;
use tracing::{debug, trace};

use super::{ChatSession, GenerationState};
use crate::error::SessionError;

impl<E: InferenceEngine> ChatSession<E> {
    /// Record `query` as a User turn and submit the formatted dialog as the prompt batch.
    ///
    /// Any batch still pending from an unfinished turn is released first and
    /// that turn's partial response is discarded.
    pub fn start_completion(&mut self, query: &str) -> Result<(), SessionError> {
        if self.state == GenerationState::Failed {
            return Err(SessionError::Failed);
        }
        self.batches.release();

        self.history.push_user(query);
        let formatted = self.prompt_strategy.format_dialog(self.history.turns());
        trace!(prompt = %formatted.text, "formatted prompt");

        let tokens = self.engine.tokenize(
            &formatted.text,
            formatted.add_special,
            formatted.parse_special,
        );
        let tokens = self.check(tokens)?;
        debug!(
            n_tokens = tokens.len(),
            context_used = self.window.used(),
            "tokenized prompt"
        );

        let built = self
            .batches
            .build_prompt_batch(&self.engine, &mut self.window, &tokens);
        self.check(built)?;

        self.response.clear();
        self.staging.clear();
        self.state = GenerationState::PromptSubmitted;
        debug!(context_used = self.window.used(), "prompt batch submitted");
        Ok(())
    }
}
