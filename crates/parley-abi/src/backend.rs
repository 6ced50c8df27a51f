use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::EngineError;
use crate::sampling::SamplingParams;
use crate::token::{SeqId, Token};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    System,
    User,
    Assistant,
    /// Host-supplied role the prompt formatter has no label for.
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    #[inline]
    pub fn new<S: Into<String>>(role: Role, s: S) -> Self {
        Self {
            role,
            content: s.into(),
        }
    }
    #[inline]
    pub fn system<S: Into<String>>(s: S) -> Self {
        Self::new(Role::System, s)
    }
    #[inline]
    pub fn user<S: Into<String>>(s: S) -> Self {
        Self::new(Role::User, s)
    }
    #[inline]
    pub fn assistant<S: Into<String>>(s: S) -> Self {
        Self::new(Role::Assistant, s)
    }
}

/// Everything an engine needs at load time.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub model_path: PathBuf,
    /// Requested context window (n_ctx).
    pub n_ctx: u32,
    /// Layers to offload to an accelerator; 0 keeps everything on the CPU.
    pub n_gpu_layers: i32,
    pub sampling: SamplingParams,
}

/// One slot-addressed unit of decode work.
///
/// Implementations own their native storage and free it in `Drop`, exactly once.
pub trait TokenBatch {
    /// Number of slots requested at allocation.
    fn capacity(&self) -> usize;

    /// Slots filled so far.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append one token into the next free slot.
    fn push(
        &mut self,
        token: Token,
        pos: usize,
        seq: SeqId,
        logits: bool,
    ) -> Result<(), EngineError>;
}

/// Inference engine driven by a chat session: one model, one context, one sampler chain.
pub trait InferenceEngine {
    type Batch: TokenBatch;

    /// Load the model, create its context and sampler chain.
    fn load(config: &EngineConfig) -> Result<Self, EngineError>
    where
        Self: Sized;

    /// Active context window (n_ctx) of the created context.
    fn context_capacity(&self) -> usize;

    fn tokenize(
        &self,
        text: &str,
        add_special: bool,
        parse_special: bool,
    ) -> Result<Vec<Token>, EngineError>;

    /// Allocate an empty batch with room for `capacity` tokens.
    fn new_batch(&self, capacity: usize) -> Result<Self::Batch, EngineError>;

    /// Run the model over `batch`, extending the KV cache.
    fn decode(&mut self, batch: &Self::Batch) -> Result<(), EngineError>;

    /// Draw the next token from the logits of the last decoded slot.
    fn sample(&mut self) -> Result<Token, EngineError>;

    fn is_end_of_generation(&self, token: Token) -> bool;

    /// Raw bytes of one token's text, special tokens rendered.
    ///
    /// A multi-byte character may be split across consecutive tokens, so the
    /// bytes need not be valid UTF-8 on their own.
    fn token_to_piece(&self, token: Token) -> Result<Vec<u8>, EngineError>;
}
