//! Chat session: history + prompt strategy + context window + pending batch,
//! driven one decode step at a time.

use std::fmt;

use parley_abi::{EngineError, InferenceEngine, Role};
use tracing::{debug, info};

use crate::batch::BatchManager;
use crate::config::SessionConfig;
use crate::context::ContextWindow;
use crate::error::SessionError;
use crate::format::{PromptStrategy, RolePrefixedFormat};
use crate::history::ChatHistory;

// Child modules implement the two halves of the generation loop on `ChatSession`.
mod decode;
mod prefill;
mod utils;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    Idle,
    PromptSubmitted,
    Generating,
    Stopped,
    /// An engine call failed; the session must be torn down.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndOfGeneration,
    ContextExhausted,
}

/// Result of one `step()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Piece(String),
    /// Generation finished and the response was committed to history.
    End(StopReason),
}

impl Step {
    /// Rendering of [`Step::End`] for hosts that stream plain strings.
    pub const SENTINEL: &'static str = "[EOG]";

    pub fn is_end(&self) -> bool {
        matches!(self, Step::End(_))
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Piece(p) => f.write_str(p),
            Step::End(_) => f.write_str(Self::SENTINEL),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionEnd {
    Finished(StopReason),
    /// The caller's piece cap was hit and the turn was stopped, not committed.
    Capped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub end: CompletionEnd,
}

/// One logical chat against one exclusively owned engine.
pub struct ChatSession<E: InferenceEngine> {
    engine: E,
    prompt_strategy: Box<dyn PromptStrategy>,
    history: ChatHistory,
    window: ContextWindow,
    batches: BatchManager<E::Batch>,
    response: String,
    /// Piece bytes that do not form a complete UTF-8 character yet.
    staging: Vec<u8>,
    state: GenerationState,
}

impl<E: InferenceEngine> ChatSession<E> {
    pub fn new(engine: E) -> Self {
        Self::with_history(engine, ChatHistory::new())
    }

    /// Start from an existing transcript. Its tokens are not in the KV cache
    /// yet; the next prompt resubmits them.
    pub fn with_history(engine: E, history: ChatHistory) -> Self {
        let window = ContextWindow::new(engine.context_capacity());
        Self {
            engine,
            prompt_strategy: Box::new(RolePrefixedFormat),
            history,
            window,
            batches: BatchManager::new(),
            response: String::new(),
            staging: Vec::new(),
            state: GenerationState::Idle,
        }
    }

    /// Validate `config`, load the engine and seed the optional system prompt.
    pub fn load(config: &SessionConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let engine = E::load(&config.to_engine_config())?;
        info!(
            model = %config.model.path.display(),
            n_ctx = engine.context_capacity(),
            "engine loaded"
        );

        let mut session = Self::new(engine);
        if let Some(sys) = config.chat.system_prompt.as_deref() {
            session.history.push_system(sys);
        }
        Ok(session)
    }

    pub fn set_prompt_strategy(&mut self, strategy: Box<dyn PromptStrategy>) {
        self.prompt_strategy = strategy;
    }

    /// Append a turn without generating anything.
    pub fn push_message<S: Into<String>>(&mut self, role: Role, content: S) {
        self.history.push(role, content);
    }

    #[inline]
    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    #[inline]
    pub fn state(&self) -> GenerationState {
        self.state
    }

    #[inline]
    pub fn context_used(&self) -> usize {
        self.window.used()
    }

    #[inline]
    pub fn context_capacity(&self) -> usize {
        self.window.capacity()
    }

    /// Text generated so far in the current (or last stopped) turn.
    #[inline]
    pub fn partial_response(&self) -> &str {
        &self.response
    }

    #[inline]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    #[inline]
    pub fn has_pending_batch(&self) -> bool {
        self.batches.is_pending()
    }

    /// Abandon the current turn: free the pending batch, leave history alone.
    ///
    /// The partial response is not committed; read it with
    /// [`partial_response`](Self::partial_response) to keep it.
    pub fn stop_completion(&mut self) {
        self.batches.release();
        if self.state != GenerationState::Failed {
            self.state = GenerationState::Stopped;
        }
        debug!(partial_len = self.response.len(), "completion stopped by caller");
    }

    /// Run a whole turn, streaming pieces to `on_piece`.
    ///
    /// `max_pieces` is a host-side cap; when hit, the turn is stopped with
    /// [`stop_completion`](Self::stop_completion) and not committed to history.
    pub fn complete<F>(
        &mut self,
        query: &str,
        max_pieces: Option<usize>,
        mut on_piece: F,
    ) -> Result<Completion, SessionError>
    where
        F: FnMut(&str),
    {
        self.start_completion(query)?;

        let mut emitted = 0usize;
        loop {
            if max_pieces.is_some_and(|cap| emitted >= cap) {
                let text = self.response.clone();
                self.stop_completion();
                return Ok(Completion {
                    text,
                    end: CompletionEnd::Capped,
                });
            }

            match self.step()? {
                Step::Piece(piece) => {
                    on_piece(&piece);
                    emitted += 1;
                }
                Step::End(reason) => {
                    return Ok(Completion {
                        text: self.response.clone(),
                        end: CompletionEnd::Finished(reason),
                    });
                }
            }
        }
    }

    /// Commit the response as an Assistant turn and free the pending batch.
    fn finish(&mut self, reason: StopReason) -> Step {
        if !self.staging.is_empty() {
            debug!(
                dangling = self.staging.len(),
                "dropping incomplete UTF-8 tail"
            );
            self.staging.clear();
        }
        self.history.push_assistant(self.response.clone());
        self.batches.release();
        self.state = GenerationState::Stopped;
        debug!(
            ?reason,
            response_len = self.response.len(),
            context_used = self.window.used(),
            "completion finished"
        );
        Step::End(reason)
    }

    /// Route an engine result; on error free the batch and poison the session.
    fn check<T>(&mut self, result: Result<T, EngineError>) -> Result<T, SessionError> {
        result.map_err(|e| {
            self.batches.release();
            self.state = GenerationState::Failed;
            SessionError::Engine(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockEngine, Slot};
    use parley_abi::ChatTurn;
    use std::path::PathBuf;

    #[test]
    fn first_completion_formats_a_single_user_turn() {
        let mut s = ChatSession::new(MockEngine::new(2048).with_reply("Hi"));
        s.start_completion("Hello").unwrap();

        assert_eq!(s.history().turns(), &[ChatTurn::user("Hello")]);
        assert_eq!(
            s.engine().last_prompt().as_deref(),
            Some("User: Hello\n\nAssistant: ")
        );
        assert_eq!(s.state(), GenerationState::PromptSubmitted);
        assert_eq!(s.context_used(), "User: Hello\n\nAssistant: ".len());
    }

    #[test]
    fn steps_stream_pieces_then_commit_the_response() {
        let mut s = ChatSession::new(MockEngine::new(2048).with_reply("Hey!"));
        s.start_completion("Hello").unwrap();

        let mut pieces = Vec::new();
        loop {
            match s.step().unwrap() {
                Step::Piece(p) => pieces.push(p),
                Step::End(reason) => {
                    assert_eq!(reason, StopReason::EndOfGeneration);
                    break;
                }
            }
        }

        assert_eq!(pieces.concat(), "Hey!");
        assert_eq!(s.history().last(), Some(&ChatTurn::assistant("Hey!")));
        assert_eq!(s.state(), GenerationState::Stopped);
        assert!(!s.has_pending_batch());
        assert_eq!(s.engine().live_batches(), 0);
    }

    #[test]
    fn step_positions_follow_the_prompt() {
        let mut s = ChatSession::new(MockEngine::new(2048).with_reply("ab"));
        s.start_completion("x").unwrap();
        let prompt_len = s.context_used();

        while !s.step().unwrap().is_end() {}

        let decoded = &s.engine().decoded;
        // prompt, 'a', 'b'; the end-of-generation token is never decoded
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[0].len(), prompt_len);
        assert!(decoded[0].last().unwrap().logits);
        assert!(decoded[0][..prompt_len - 1].iter().all(|s| !s.logits));
        assert_eq!(decoded[1], vec![Slot::new('a' as i32, prompt_len, true)]);
        assert_eq!(decoded[2], vec![Slot::new('b' as i32, prompt_len + 1, true)]);
        assert_eq!(s.context_used(), prompt_len + 2);
    }

    #[test]
    fn end_of_generation_builds_no_step_batch() {
        let mut s = ChatSession::new(MockEngine::new(2048).with_reply(""));
        s.start_completion("q").unwrap();
        let used = s.context_used();

        assert_eq!(s.step().unwrap(), Step::End(StopReason::EndOfGeneration));
        assert_eq!(s.engine().batches_allocated(), 1);
        assert_eq!(s.engine().batches_freed(), 1);
        assert_eq!(s.context_used(), used);
        assert_eq!(s.history().last(), Some(&ChatTurn::assistant("")));
    }

    #[test]
    fn exhausted_context_ends_without_decoding() {
        // "User: q\n\nAssistant: " is 20 tokens; capacity 21 leaves used == capacity - 1.
        let mut s = ChatSession::new(MockEngine::new(21).with_endless("zzz"));
        s.start_completion("q").unwrap();
        assert_eq!(s.context_used(), 20);

        assert_eq!(s.step().unwrap(), Step::End(StopReason::ContextExhausted));
        assert!(s.engine().decoded.is_empty());
        assert_eq!(s.history().last(), Some(&ChatTurn::assistant("")));
        assert_eq!(s.engine().live_batches(), 0);
    }

    #[test]
    fn context_usage_never_passes_the_headroom_slot() {
        let capacity = 24;
        let mut s = ChatSession::new(MockEngine::new(capacity).with_endless("abcdefghij"));
        s.start_completion("q").unwrap();

        let mut last_used = s.context_used();
        let mut pieces = String::new();
        loop {
            let before = s.engine().decoded.len();
            let step = s.step().unwrap();
            if s.engine().decoded.len() > before {
                assert!(last_used <= capacity - 1);
            }
            assert!(s.context_used() >= last_used);
            last_used = s.context_used();
            match step {
                Step::Piece(p) => pieces.push_str(&p),
                Step::End(reason) => {
                    assert_eq!(reason, StopReason::ContextExhausted);
                    break;
                }
            }
        }

        assert_eq!(s.context_used(), capacity - 1);
        assert_eq!(pieces, "abc");
        assert_eq!(s.history().last(), Some(&ChatTurn::assistant("abc")));
    }

    #[test]
    fn second_completion_resubmits_the_whole_dialog() {
        let mut s = ChatSession::new(MockEngine::new(2048).with_reply("A").with_reply("B"));

        let first = s.complete("one", None, |_| {}).unwrap();
        assert_eq!(first.text, "A");
        let used_after_first = s.context_used();

        let second = s.complete("two", None, |_| {}).unwrap();
        assert_eq!(second.text, "B");
        assert_eq!(
            second.end,
            CompletionEnd::Finished(StopReason::EndOfGeneration)
        );

        let prompt = s.engine().last_prompt().unwrap();
        assert_eq!(prompt, "User: one\n\nAssistant: A\n\nUser: two\n\nAssistant: ");
        assert_eq!(
            s.history().turns(),
            &[
                ChatTurn::user("one"),
                ChatTurn::assistant("A"),
                ChatTurn::user("two"),
                ChatTurn::assistant("B"),
            ]
        );

        // The second prompt batch continues after everything already cached.
        let second_prompt_batch = &s.engine().decoded[2];
        assert_eq!(second_prompt_batch[0].pos, used_after_first);
    }

    #[test]
    fn stop_completion_frees_the_batch_and_keeps_history() {
        let mut s = ChatSession::new(MockEngine::new(2048).with_reply("long answer"));
        s.start_completion("q").unwrap();
        s.step().unwrap();
        s.step().unwrap();

        s.stop_completion();
        s.stop_completion();

        assert_eq!(s.partial_response(), "lo");
        assert_eq!(s.history().turns(), &[ChatTurn::user("q")]);
        assert_eq!(s.state(), GenerationState::Stopped);
        assert_eq!(s.engine().live_batches(), 0);
        assert!(matches!(s.step(), Err(SessionError::NoPendingBatch)));
    }

    #[test]
    fn split_characters_are_held_until_complete() {
        let mut s = ChatSession::new(MockEngine::new(2048).with_bytes("é!".as_bytes()));
        s.start_completion("q").unwrap();

        assert_eq!(s.step().unwrap(), Step::Piece(String::new()));
        assert_eq!(s.step().unwrap(), Step::Piece("é".into()));
        assert_eq!(s.step().unwrap(), Step::Piece("!".into()));
        assert!(s.step().unwrap().is_end());
        assert_eq!(s.history().last(), Some(&ChatTurn::assistant("é!")));
    }

    #[test]
    fn dangling_bytes_are_not_committed() {
        let mut s = ChatSession::new(MockEngine::new(2048).with_bytes(&[b'o', b'k', 0xE2]));
        let done = s.complete("q", None, |_| {}).unwrap();
        assert_eq!(done.text, "ok");
        assert_eq!(s.history().last(), Some(&ChatTurn::assistant("ok")));
    }

    #[test]
    fn malformed_bytes_do_not_stall_output() {
        let mut s = ChatSession::new(MockEngine::new(2048).with_bytes(&[0xFF, b'a']));
        s.start_completion("q").unwrap();
        assert_eq!(s.step().unwrap(), Step::Piece("\u{FFFD}".into()));
        assert_eq!(s.step().unwrap(), Step::Piece("a".into()));
    }

    #[test]
    fn malformed_byte_does_not_spoil_a_following_split_character() {
        let mut s = ChatSession::new(
            MockEngine::new(2048).with_chunks(&[&[b'a', 0xFF, 0xE2, 0x82], &[0xAC]]),
        );
        s.start_completion("q").unwrap();
        assert_eq!(s.step().unwrap(), Step::Piece("a\u{FFFD}".into()));
        assert_eq!(s.step().unwrap(), Step::Piece("\u{20AC}".into()));
        assert_eq!(s.step().unwrap(), Step::End(StopReason::EndOfGeneration));
        assert_eq!(
            s.history().last(),
            Some(&ChatTurn::assistant("a\u{FFFD}\u{20AC}"))
        );
    }

    #[test]
    fn query_with_nul_is_submitted_as_text() {
        let mut s = ChatSession::new(MockEngine::new(2048).with_reply("ok"));
        s.start_completion("a\0b").unwrap();
        assert_eq!(s.state(), GenerationState::PromptSubmitted);
        assert_eq!(
            s.engine().last_prompt().unwrap(),
            "User: a\0b\n\nAssistant: "
        );
        assert_eq!(s.step().unwrap(), Step::Piece("o".into()));
    }

    #[test]
    fn later_prompt_that_overflows_the_window_ends_without_decoding() {
        // First turn: 20 prompt tokens + 1 reply token. Second prompt is 43 tokens.
        let mut s = ChatSession::new(MockEngine::new(60).with_reply("A").with_endless("zz"));
        let first = s.complete("q", None, |_| {}).unwrap();
        assert_eq!(first.text, "A");
        assert_eq!(s.context_used(), 21);
        let decoded_after_first = s.engine().decoded.len();

        s.start_completion("r").unwrap();
        assert_eq!(s.context_used(), 64);
        assert!(s.has_pending_batch());

        assert_eq!(s.step().unwrap(), Step::End(StopReason::ContextExhausted));
        assert_eq!(s.engine().decoded.len(), decoded_after_first);
        assert!(!s.has_pending_batch());
        assert_eq!(s.engine().live_batches(), 0);
        assert_eq!(s.state(), GenerationState::Stopped);
        assert_eq!(s.history().last(), Some(&ChatTurn::assistant("")));
    }

    #[test]
    fn step_before_start_is_rejected() {
        let mut s = ChatSession::new(MockEngine::new(2048));
        assert!(matches!(s.step(), Err(SessionError::NoPendingBatch)));
        assert!(s.engine().decoded.is_empty());
    }

    #[test]
    fn decode_failure_poisons_the_session() {
        let mut s = ChatSession::new(
            MockEngine::new(2048)
                .with_reply("abc")
                .failing_decode_on(2),
        );
        s.start_completion("q").unwrap();
        assert_eq!(s.step().unwrap(), Step::Piece("a".into()));

        let err = s.step().unwrap_err();
        assert!(matches!(
            err,
            SessionError::Engine(EngineError::Decode { code: -1 })
        ));
        assert_eq!(s.state(), GenerationState::Failed);
        assert_eq!(s.engine().live_batches(), 0);
        assert!(matches!(s.step(), Err(SessionError::Failed)));
        assert!(matches!(
            s.start_completion("again"),
            Err(SessionError::Failed)
        ));
    }

    #[test]
    fn restarting_mid_turn_replaces_the_pending_batch() {
        let mut s = ChatSession::new(MockEngine::new(2048).with_endless("xyz"));
        s.start_completion("first").unwrap();
        s.step().unwrap();
        s.start_completion("second").unwrap();

        assert_eq!(s.engine().live_batches(), 1);
        assert_eq!(s.partial_response(), "");
        assert_eq!(
            s.history().turns(),
            &[ChatTurn::user("first"), ChatTurn::user("second")]
        );
    }

    #[test]
    fn empty_query_is_allowed() {
        let mut s = ChatSession::new(MockEngine::new(2048).with_reply("ok"));
        s.start_completion("").unwrap();
        assert_eq!(
            s.engine().last_prompt().as_deref(),
            Some("User: \n\nAssistant: ")
        );
    }

    #[test]
    fn complete_streams_and_respects_the_cap() {
        let mut s = ChatSession::new(MockEngine::new(2048).with_endless("abcdef"));
        let mut streamed = String::new();
        let done = s.complete("q", Some(3), |p| streamed.push_str(p)).unwrap();

        assert_eq!(done.end, CompletionEnd::Capped);
        assert_eq!(done.text, "abc");
        assert_eq!(streamed, "abc");
        assert_eq!(s.history().turns(), &[ChatTurn::user("q")]);
        assert_eq!(s.engine().live_batches(), 0);
    }

    #[test]
    fn step_renders_the_sentinel() {
        assert_eq!(Step::Piece("x".into()).to_string(), "x");
        assert_eq!(
            Step::End(StopReason::ContextExhausted).to_string(),
            Step::SENTINEL
        );
    }

    #[test]
    fn load_seeds_the_system_prompt() {
        let mut config = SessionConfig::default();
        config.model.path = PathBuf::from("tiny.gguf");
        config.model.n_ctx = 128;
        config.chat.system_prompt = Some("Be brief.".into());

        let mut s = ChatSession::<MockEngine>::load(&config).unwrap();
        assert_eq!(s.context_capacity(), 128);
        assert_eq!(s.history().turns(), &[ChatTurn::system("Be brief.")]);

        s.start_completion("hi").unwrap();
        assert_eq!(
            s.engine().last_prompt().as_deref(),
            Some("System: Be brief.\n\nUser: hi\n\nAssistant: ")
        );
    }

    #[test]
    fn load_rejects_invalid_config_before_touching_the_engine() {
        let config = SessionConfig::default();
        assert!(matches!(
            ChatSession::<MockEngine>::load(&config),
            Err(SessionError::Config(_))
        ));
    }

    #[test]
    fn pushed_messages_reach_the_prompt() {
        let mut s = ChatSession::new(MockEngine::new(2048).with_reply("."));
        s.push_message(Role::System, "sys");
        s.push_message(Role::Other("tool".into()), "hidden");
        s.start_completion("u").unwrap();
        assert_eq!(
            s.engine().last_prompt().as_deref(),
            Some("System: sys\n\nUser: u\n\nAssistant: ")
        );
        assert_eq!(s.history().len(), 3);
    }
}
