// crates/backends/llama/parley-llama/src/sampler.rs
//
// Persistent min-p → temperature → dist chain, reused across every step.

use std::ptr::NonNull;

use llama_cpp_sys_2::llama_sampler;
use parley_abi::{EngineError, SamplingParams, Token};

use crate::context::LlamaContext;
use crate::ffi::sampling as sffi;

pub struct LlamaSampler {
    chain: NonNull<llama_sampler>,
}

impl LlamaSampler {
    pub fn new(params: &SamplingParams) -> Result<Self, EngineError> {
        let p = params.normalized();
        let chain =
            sffi::init_chain(p.min_p, p.temperature, p.seed).map_err(EngineError::SamplerInit)?;
        Ok(Self { chain })
    }

    /// Draw the next token from the logits of the most recent decode.
    pub fn sample(&mut self, ctx: &LlamaContext) -> Result<Token, EngineError> {
        let id = unsafe { sffi::sample_last(self.chain.as_ptr(), ctx.as_ptr()) }
            .map_err(EngineError::Sample)?;
        Ok(Token(id))
    }
}

impl Drop for LlamaSampler {
    fn drop(&mut self) {
        unsafe { sffi::free_chain(self.chain.as_ptr()) };
    }
}
