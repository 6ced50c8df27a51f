// crates/backends/llama/parley-llama/src/batch.rs
//
// RAII wrapper over `llama_batch`.
// - Alloc/free via ffi::batch
// - Slots are appended strictly in order
// - Drop frees the native batch exactly once

use parley_abi::{EngineError, SeqId, Token, TokenBatch};

use crate::ffi::batch as ffi_batch;
use crate::ffi::batch::RawBatch;

pub struct LlamaBatch {
    pub(crate) raw: RawBatch,
    capacity: usize,
}

impl LlamaBatch {
    /// Allocate a token-mode batch that holds up to `capacity` slots.
    pub fn new(capacity: usize) -> Result<Self, EngineError> {
        if capacity == 0 || i32::try_from(capacity).is_err() {
            return Err(EngineError::BatchAlloc { capacity });
        }
        let raw = ffi_batch::init(capacity);
        let batch = Self { raw, capacity };
        if !ffi_batch::is_allocated(&batch.raw) {
            // Drop still runs llama_batch_free, which tolerates null members.
            return Err(EngineError::BatchAlloc { capacity });
        }
        Ok(batch)
    }
}

impl TokenBatch for LlamaBatch {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn len(&self) -> usize {
        ffi_batch::n_tokens(&self.raw).max(0) as usize
    }

    fn push(&mut self, token: Token, pos: usize, seq: SeqId, logits: bool) -> Result<(), EngineError> {
        let index = self.len();
        if index >= self.capacity {
            return Err(EngineError::BatchFull { capacity: self.capacity });
        }
        let pos = i32::try_from(pos).map_err(|_| EngineError::BatchFull { capacity: self.capacity })?;

        // SAFETY: index < capacity, which is what the batch was initialized with.
        unsafe { ffi_batch::set_slot(&mut self.raw, index, token.0, pos, seq.0, logits) };
        ffi_batch::set_n_tokens(&mut self.raw, (index + 1) as i32);
        Ok(())
    }
}

impl Drop for LlamaBatch {
    fn drop(&mut self) {
        // SAFETY: raw came from ffi_batch::init and is only freed here.
        unsafe { ffi_batch::free(self.raw) };
    }
}
