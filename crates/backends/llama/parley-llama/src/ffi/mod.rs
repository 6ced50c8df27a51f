pub mod batch;
pub mod context;
pub mod runtime;
pub mod sampling;

pub use runtime::*;
