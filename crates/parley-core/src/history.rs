//! Append-only, per-session record of chat turns.

use parley_abi::{ChatTurn, Role};

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct ChatHistory {
    turns: Vec<ChatTurn>,
}

impl ChatHistory {
    #[inline]
    pub fn new() -> Self {
        Self { turns: Vec::new() }
    }

    /// All stored turns (oldest → newest).
    #[inline]
    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, ChatTurn> {
        self.turns.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    #[inline]
    pub fn last(&self) -> Option<&ChatTurn> {
        self.turns.last()
    }

    /// Append a turn. Roles are not checked for alternation.
    #[inline]
    pub fn push<S: Into<String>>(&mut self, role: Role, s: S) {
        self.turns.push(ChatTurn::new(role, s));
    }

    #[inline]
    pub fn push_user<S: Into<String>>(&mut self, s: S) {
        self.push(Role::User, s);
    }

    #[inline]
    pub fn push_assistant<S: Into<String>>(&mut self, s: S) {
        self.push(Role::Assistant, s);
    }

    #[inline]
    pub fn push_system<S: Into<String>>(&mut self, s: S) {
        self.push(Role::System, s);
    }
}

impl<'a> IntoIterator for &'a ChatHistory {
    type Item = &'a ChatTurn;
    type IntoIter = std::slice::Iter<'a, ChatTurn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}

impl FromIterator<ChatTurn> for ChatHistory {
    fn from_iter<I: IntoIterator<Item = ChatTurn>>(iter: I) -> Self {
        Self {
            turns: iter.into_iter().collect(),
        }
    }
}
