// crates/backends/llama/parley-llama/src/params.rs
//
// Translate an EngineConfig into llama.cpp context params.

use llama_cpp_sys_2::{llama_context_default_params, llama_context_params};
use parley_abi::EngineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LlamaParams {
    pub n_ctx: u32,
    /// Logical batch size. Kept equal to `n_ctx` so a whole prompt fits one decode.
    pub n_batch: u32,
    pub n_threads: i32,
    pub n_threads_batch: i32,
}

impl LlamaParams {
    pub fn from_config(config: &EngineConfig) -> Self {
        let threads = num_cpus::get_physical().max(1) as i32;
        Self {
            n_ctx: config.n_ctx,
            n_batch: config.n_ctx,
            n_threads: threads,
            n_threads_batch: num_cpus::get().max(1) as i32,
        }
    }

    pub fn context_params(&self) -> llama_context_params {
        let mut p = unsafe { llama_context_default_params() };
        p.n_ctx = self.n_ctx;
        p.n_batch = self.n_batch;
        p.n_ubatch = p.n_ubatch.min(self.n_batch);
        p.n_threads = self.n_threads;
        p.n_threads_batch = self.n_threads_batch;
        p.no_perf = true;
        p
    }
}
