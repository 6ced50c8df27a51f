use std::path::PathBuf;

/// Failures surfaced by an inference engine.
///
/// Every variant is fatal for the operation that raised it; the session core
/// never retries and passes these through unchanged.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("model path is not usable: {0}")]
    InvalidPath(PathBuf),

    #[error("failed to load model from {path}")]
    ModelLoad { path: PathBuf },

    #[error("failed to initialize inference context: {0}")]
    ContextInit(String),

    #[error("failed to initialize sampler chain: {0}")]
    SamplerInit(String),

    #[error("tokenization failed: {0}")]
    Tokenize(String),

    #[error("failed to allocate a batch of {capacity} tokens")]
    BatchAlloc { capacity: usize },

    #[error("batch is full (capacity {capacity})")]
    BatchFull { capacity: usize },

    #[error("decode failed with code {code}")]
    Decode { code: i32 },

    #[error("sampling failed: {0}")]
    Sample(String),

    #[error("detokenize failed: {0}")]
    Detokenize(String),
}
