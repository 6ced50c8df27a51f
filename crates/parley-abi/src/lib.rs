//! Parley ABI crate: the contract between the chat session core and an inference engine.

pub mod backend;
pub mod error;
pub mod sampling;
pub mod token;

pub use backend::*;
pub use error::*;
pub use sampling::*;
pub use token::*;
