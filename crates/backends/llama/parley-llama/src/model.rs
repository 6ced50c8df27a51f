// crates/backends/llama/parley-llama/src/model.rs
//
// Safe wrapper around `llama_model*`. Pointer-level unsafe lives in crate::ffi.

use std::path::Path;
use std::ptr::NonNull;

use llama_cpp_sys_2::llama_model;
use parley_abi::{EngineError, Token};

use crate::ffi;
use crate::ffi::context as cffi;

/// Owned, immutable model weights plus vocabulary.
pub struct LlamaModel {
    model: NonNull<llama_model>,
}

impl LlamaModel {
    /// Load GGUF weights from disk, offloading `n_gpu_layers` layers.
    pub fn load(path: &Path, n_gpu_layers: i32) -> Result<Self, EngineError> {
        if !path.is_file() {
            return Err(EngineError::InvalidPath(path.to_path_buf()));
        }
        ffi::init_backend();
        let params = ffi::model_params(n_gpu_layers);
        let model = ffi::load_model(path, params).map_err(|e| {
            tracing::debug!(error = %e, "model load failed");
            EngineError::ModelLoad { path: path.to_path_buf() }
        })?;
        Ok(Self { model })
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut llama_model {
        self.model.as_ptr()
    }

    pub fn tokenize(
        &self,
        text: &str,
        add_special: bool,
        parse_special: bool,
    ) -> Result<Vec<Token>, EngineError> {
        let ids = cffi::tokenize(self.as_ptr(), text, add_special, parse_special)
            .map_err(EngineError::Tokenize)?;
        Ok(ids.into_iter().map(Token).collect())
    }

    /// Raw piece bytes; special tokens render as their text.
    pub fn token_to_piece(&self, token: Token) -> Result<Vec<u8>, EngineError> {
        cffi::token_to_piece(self.as_ptr(), token.0, true).map_err(EngineError::Detokenize)
    }

    pub fn is_end_of_generation(&self, token: Token) -> bool {
        cffi::is_eog(self.as_ptr(), token.0)
    }
}

impl Drop for LlamaModel {
    fn drop(&mut self) {
        unsafe { ffi::cleanup_model(self.model.as_ptr()) };
    }
}

// SAFETY: llama.cpp models are immutable after load; all mutable state lives
// in LlamaContext.
unsafe impl Send for LlamaModel {}
unsafe impl Sync for LlamaModel {}
