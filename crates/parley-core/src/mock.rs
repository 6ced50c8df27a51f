//! Scripted engine for unit tests: one token per `char`, replies queued up front.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use parley_abi::{EngineConfig, EngineError, InferenceEngine, SeqId, Token, TokenBatch};

pub(crate) const EOG: Token = Token(0);

/// Tokens at or above this id render as the single byte `id - RAW_BYTE_BASE`.
const RAW_BYTE_BASE: i32 = 0x20_0000;

/// Tokens at or above this id render as `chunks[id - CHUNK_BASE]`.
const CHUNK_BASE: i32 = 0x30_0000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Slot {
    pub token: Token,
    pub pos: usize,
    pub seq: SeqId,
    pub logits: bool,
}

impl Slot {
    pub fn new(token: i32, pos: usize, logits: bool) -> Self {
        Self {
            token: Token(token),
            pos,
            seq: SeqId::PRIMARY,
            logits,
        }
    }
}

pub(crate) struct MockBatch {
    pub slots: Vec<Slot>,
    capacity: usize,
    freed: Rc<Cell<usize>>,
}

impl TokenBatch for MockBatch {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn len(&self) -> usize {
        self.slots.len()
    }

    fn push(
        &mut self,
        token: Token,
        pos: usize,
        seq: SeqId,
        logits: bool,
    ) -> Result<(), EngineError> {
        if self.slots.len() >= self.capacity {
            return Err(EngineError::BatchFull {
                capacity: self.capacity,
            });
        }
        self.slots.push(Slot {
            token,
            pos,
            seq,
            logits,
        });
        Ok(())
    }
}

impl Drop for MockBatch {
    fn drop(&mut self) {
        self.freed.set(self.freed.get() + 1);
    }
}

pub(crate) struct MockEngine {
    capacity: usize,
    script: VecDeque<Token>,
    chunks: Vec<Vec<u8>>,
    /// Slots of every batch handed to `decode`, in call order.
    pub decoded: Vec<Vec<Slot>>,
    /// Every text passed to `tokenize`.
    pub prompts: RefCell<Vec<String>>,
    allocated: Cell<usize>,
    freed: Rc<Cell<usize>>,
    fail_decode_on: Option<usize>,
}

impl MockEngine {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            script: VecDeque::new(),
            chunks: Vec::new(),
            decoded: Vec::new(),
            prompts: RefCell::new(Vec::new()),
            allocated: Cell::new(0),
            freed: Rc::new(Cell::new(0)),
            fail_decode_on: None,
        }
    }

    /// Queue `text` one char per sample, followed by end-of-generation.
    pub fn with_reply(mut self, text: &str) -> Self {
        self.script.extend(text.chars().map(|c| Token(c as i32)));
        self.script.push_back(EOG);
        self
    }

    /// Queue `text` without a trailing end-of-generation token.
    pub fn with_endless(mut self, text: &str) -> Self {
        self.script.extend(text.chars().map(|c| Token(c as i32)));
        self
    }

    /// Queue raw bytes, one token each, followed by end-of-generation.
    pub fn with_bytes(mut self, bytes: &[u8]) -> Self {
        self.script
            .extend(bytes.iter().map(|b| Token(RAW_BYTE_BASE + *b as i32)));
        self.script.push_back(EOG);
        self
    }

    /// Queue multi-byte pieces, one token per chunk, followed by end-of-generation.
    pub fn with_chunks(mut self, chunks: &[&[u8]]) -> Self {
        for chunk in chunks {
            self.script
                .push_back(Token(CHUNK_BASE + self.chunks.len() as i32));
            self.chunks.push(chunk.to_vec());
        }
        self.script.push_back(EOG);
        self
    }

    /// Make the `n`-th decode call (1-based) fail.
    pub fn failing_decode_on(mut self, n: usize) -> Self {
        self.fail_decode_on = Some(n);
        self
    }

    pub fn batches_allocated(&self) -> usize {
        self.allocated.get()
    }

    pub fn batches_freed(&self) -> usize {
        self.freed.get()
    }

    pub fn live_batches(&self) -> usize {
        self.allocated.get() - self.freed.get()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.borrow().last().cloned()
    }
}

impl InferenceEngine for MockEngine {
    type Batch = MockBatch;

    fn load(config: &EngineConfig) -> Result<Self, EngineError> {
        if config.model_path.as_os_str().is_empty() {
            return Err(EngineError::ModelLoad {
                path: config.model_path.clone(),
            });
        }
        Ok(Self::new(config.n_ctx as usize))
    }

    fn context_capacity(&self) -> usize {
        self.capacity
    }

    fn tokenize(
        &self,
        text: &str,
        _add_special: bool,
        _parse_special: bool,
    ) -> Result<Vec<Token>, EngineError> {
        self.prompts.borrow_mut().push(text.to_string());
        Ok(text.chars().map(|c| Token(c as i32)).collect())
    }

    fn new_batch(&self, capacity: usize) -> Result<Self::Batch, EngineError> {
        self.allocated.set(self.allocated.get() + 1);
        Ok(MockBatch {
            slots: Vec::with_capacity(capacity),
            capacity,
            freed: Rc::clone(&self.freed),
        })
    }

    fn decode(&mut self, batch: &Self::Batch) -> Result<(), EngineError> {
        if self.fail_decode_on == Some(self.decoded.len() + 1) {
            return Err(EngineError::Decode { code: -1 });
        }
        self.decoded.push(batch.slots.clone());
        Ok(())
    }

    fn sample(&mut self) -> Result<Token, EngineError> {
        Ok(self.script.pop_front().unwrap_or(EOG))
    }

    fn is_end_of_generation(&self, token: Token) -> bool {
        token == EOG
    }

    fn token_to_piece(&self, token: Token) -> Result<Vec<u8>, EngineError> {
        if token.0 >= CHUNK_BASE {
            return Ok(self.chunks[(token.0 - CHUNK_BASE) as usize].clone());
        }
        if token.0 >= RAW_BYTE_BASE {
            return Ok(vec![(token.0 - RAW_BYTE_BASE) as u8]);
        }
        char::from_u32(token.0 as u32)
            .map(|c| c.to_string().into_bytes())
            .ok_or_else(|| EngineError::Detokenize(format!("no char for token {}", token.0)))
    }
}
