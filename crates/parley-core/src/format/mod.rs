pub mod format;
pub mod prompting;

pub use format::FormattedPrompt;
pub use prompting::{PromptStrategy, RolePrefixedFormat};
