//! Parley core: drives an [`InferenceEngine`](parley_abi::InferenceEngine) through a
//! multi-turn chat, one decode step per call.

pub mod batch;
pub mod config;
pub mod context;
pub mod error;
pub mod format;
pub mod history;
pub mod session;

#[cfg(test)]
pub(crate) mod mock;

pub use batch::BatchManager;
pub use config::SessionConfig;
pub use context::ContextWindow;
pub use error::{ConfigError, SessionError};
pub use format::{FormattedPrompt, PromptStrategy, RolePrefixedFormat};
pub use history::ChatHistory;
pub use session::{ChatSession, Completion, CompletionEnd, GenerationState, Step, StopReason};
