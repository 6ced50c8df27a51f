// Wrappers around llama_cpp_sys_2 batch fiddling.
// All raw pointer writes live here.

use llama_cpp_sys_2::{llama_batch, llama_batch_free, llama_batch_init};

pub use llama_cpp_sys_2::llama_batch as RawBatch;

/// Initialize a token-mode batch with capacity `n_tokens`, embd=0, n_seq_max=1.
///
/// llama.cpp allocates one `seq_id` array of length 1 per slot; those arrays
/// belong to the batch and are released by [`free`].
pub fn init(n_tokens: usize) -> llama_batch {
    unsafe { llama_batch_init(n_tokens as i32, 0, 1) }
}

/// Free a batch previously returned by `init`, including its per-slot seq-id arrays.
///
/// # Safety
/// `batch` must come from [`init`] and must not be freed twice.
pub unsafe fn free(batch: llama_batch) {
    llama_batch_free(batch)
}

/// `init` yields null buffers only when its allocations fail.
pub fn is_allocated(raw: &llama_batch) -> bool {
    !raw.token.is_null()
        && !raw.pos.is_null()
        && !raw.seq_id.is_null()
        && !raw.n_seq_id.is_null()
        && !raw.logits.is_null()
}

#[inline]
pub fn n_tokens(raw: &llama_batch) -> i32 {
    raw.n_tokens
}

#[inline]
pub fn set_n_tokens(raw: &mut llama_batch, v: i32) {
    raw.n_tokens = v;
}

/// Write one slot.
///
/// # Safety
/// `index` must be below the capacity passed to [`init`].
pub unsafe fn set_slot(
    raw: &mut llama_batch,
    index: usize,
    token: i32,
    pos: i32,
    seq: i32,
    logits: bool,
) {
    *raw.token.add(index) = token;
    *raw.pos.add(index) = pos;
    // Write into the array llama_batch_init allocated for this slot so that
    // llama_batch_free remains its only owner.
    let seq_ids = *raw.seq_id.add(index);
    *seq_ids = seq;
    *raw.n_seq_id.add(index) = 1;
    *raw.logits.add(index) = logits as i8;
}
