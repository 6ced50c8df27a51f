//! llama.cpp backend for parley.
//!
//! All pointer-level `unsafe` lives under [`ffi`]; the RAII wrappers
//! ([`LlamaModel`], [`LlamaContext`], [`LlamaSampler`], [`LlamaBatch`]) free
//! their native handle exactly once in `Drop`.

pub mod batch;
pub mod context;
pub mod engine;
pub mod ffi;
pub mod model;
pub mod params;
pub mod sampler;

pub use batch::LlamaBatch;
pub use context::LlamaContext;
pub use engine::LlamaEngine;
pub use model::LlamaModel;
pub use params::LlamaParams;
pub use sampler::LlamaSampler;
