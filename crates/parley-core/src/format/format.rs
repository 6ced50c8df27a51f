//! Prompt carrier passed from a formatter to the tokenizer.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedPrompt {
    pub text: String,
    /// Let the tokenizer insert BOS/EOS-style specials.
    pub add_special: bool,
    /// Let the tokenizer parse special-token markup inside `text`.
    pub parse_special: bool,
}

impl FormattedPrompt {
    pub fn new<T: Into<String>>(text: T) -> Self {
        Self {
            text: text.into(),
            add_special: false,
            parse_special: true,
        }
    }
}
