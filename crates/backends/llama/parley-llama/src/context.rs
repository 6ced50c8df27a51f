// crates/backends/llama/parley-llama/src/context.rs
//
// Inference context. Holds an Arc to its model so the weights always
// outlive the context; all pointer-level `unsafe` is delegated to crate::ffi.

use std::ptr::NonNull;
use std::sync::Arc;

use llama_cpp_sys_2::llama_context;
use parley_abi::EngineError;

use crate::batch::LlamaBatch;
use crate::ffi;
use crate::ffi::context as cffi;
use crate::model::LlamaModel;
use crate::params::LlamaParams;

pub struct LlamaContext {
    ctx: NonNull<llama_context>,
    model: Arc<LlamaModel>,
    /// Context window granted by llama.cpp, which may differ from the request.
    n_ctx: u32,
}

impl LlamaContext {
    pub fn new(model: Arc<LlamaModel>, params: &LlamaParams) -> Result<Self, EngineError> {
        let ctx = unsafe { cffi::create_context(model.as_ptr(), params.context_params()) }
            .map_err(EngineError::ContextInit)?;
        let n_ctx = cffi::n_ctx(ctx.as_ptr());
        Ok(Self { ctx, model, n_ctx })
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut llama_context {
        self.ctx.as_ptr()
    }

    #[inline]
    pub fn model(&self) -> &LlamaModel {
        &self.model
    }

    #[inline]
    pub fn n_ctx(&self) -> u32 {
        self.n_ctx
    }

    /// Run one forward pass over `batch`.
    pub fn decode(&mut self, batch: &LlamaBatch) -> Result<(), EngineError> {
        cffi::decode_batch(self.as_ptr(), batch.raw).map_err(|code| EngineError::Decode { code })
    }
}

impl Drop for LlamaContext {
    fn drop(&mut self) {
        unsafe { ffi::cleanup_context(self.ctx.as_ptr()) };
    }
}
