// crates/backends/llama/parley-llama/src/engine.rs
//
// `InferenceEngine` implementation over llama.cpp.

use std::sync::Arc;

use parley_abi::{EngineConfig, EngineError, InferenceEngine, Token};
use tracing::{debug, info};

use crate::batch::LlamaBatch;
use crate::context::LlamaContext;
use crate::model::LlamaModel;
use crate::params::LlamaParams;
use crate::sampler::LlamaSampler;

/// One loaded model with its context and sampler chain.
///
/// Field order is drop order: the sampler goes first, then the context,
/// which releases the last reference to the model.
pub struct LlamaEngine {
    sampler: LlamaSampler,
    context: LlamaContext,
}

impl LlamaEngine {
    pub fn model(&self) -> &LlamaModel {
        self.context.model()
    }
}

impl InferenceEngine for LlamaEngine {
    type Batch = LlamaBatch;

    fn load(config: &EngineConfig) -> Result<Self, EngineError> {
        info!(
            model = %config.model_path.display(),
            n_ctx = config.n_ctx,
            n_gpu_layers = config.n_gpu_layers,
            "loading llama model"
        );
        let model = Arc::new(LlamaModel::load(&config.model_path, config.n_gpu_layers)?);

        let params = LlamaParams::from_config(config);
        debug!(?params, "creating llama context");
        let context = LlamaContext::new(model, &params)?;
        if context.n_ctx() != config.n_ctx {
            debug!(requested = config.n_ctx, granted = context.n_ctx(), "context size adjusted");
        }

        let sampler = LlamaSampler::new(&config.sampling)?;
        info!(n_ctx = context.n_ctx(), "llama engine ready");
        Ok(Self { sampler, context })
    }

    fn context_capacity(&self) -> usize {
        self.context.n_ctx() as usize
    }

    fn tokenize(
        &self,
        text: &str,
        add_special: bool,
        parse_special: bool,
    ) -> Result<Vec<Token>, EngineError> {
        self.model().tokenize(text, add_special, parse_special)
    }

    fn new_batch(&self, capacity: usize) -> Result<LlamaBatch, EngineError> {
        LlamaBatch::new(capacity)
    }

    fn decode(&mut self, batch: &LlamaBatch) -> Result<(), EngineError> {
        self.context.decode(batch)
    }

    fn sample(&mut self) -> Result<Token, EngineError> {
        self.sampler.sample(&self.context)
    }

    fn is_end_of_generation(&self, token: Token) -> bool {
        self.model().is_end_of_generation(token)
    }

    fn token_to_piece(&self, token: Token) -> Result<Vec<u8>, EngineError> {
        self.model().token_to_piece(token)
    }
}
