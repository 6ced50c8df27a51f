//! Model-agnostic prompt formatting.

use crate::format::FormattedPrompt;
use parley_abi::{ChatTurn, Role};

/// Turn a full dialog into one prompt string for the tokenizer.
pub trait PromptStrategy {
    fn format_dialog(&self, turns: &[ChatTurn]) -> FormattedPrompt;
}

/// Flat `Role: content` transcript ending in an `Assistant: ` cue.
///
/// Needs no template metadata, so it works with base models that ship none.
/// Turns with a role it has no label for are dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct RolePrefixedFormat;

impl RolePrefixedFormat {
    pub const ASSISTANT_CUE: &'static str = "Assistant: ";

    fn label(role: &Role) -> Option<&'static str> {
        match role {
            Role::System => Some("System"),
            Role::User => Some("User"),
            Role::Assistant => Some("Assistant"),
            Role::Other(_) => None,
        }
    }
}

impl PromptStrategy for RolePrefixedFormat {
    fn format_dialog(&self, turns: &[ChatTurn]) -> FormattedPrompt {
        let mut text = String::new();
        for turn in turns {
            let Some(label) = Self::label(&turn.role) else {
                continue;
            };
            text.push_str(label);
            text.push_str(": ");
            text.push_str(&turn.content);
            text.push_str("\n\n");
        }
        text.push_str(Self::ASSISTANT_CUE);
        FormattedPrompt::new(text)
    }
}
