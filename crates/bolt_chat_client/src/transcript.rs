//! Conversation history for one chat session.
//!
//! The first turn is always the system turn the store was created with; every
//! other turn is appended after it and never modified.

use serde::{Deserialize, Serialize};

/// Speaker of a turn. Serialized lowercase, as the completion API expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Ordered transcript, seeded with a single system turn.
#[derive(Debug, Clone)]
pub struct TranscriptStore {
    turns: Vec<Turn>,
}

impl TranscriptStore {
    /// Create a store holding only the system turn.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::system(system_prompt)],
        }
    }

    /// Reset to `[system turn]`. Idempotent.
    pub fn clear(&mut self) {
        self.turns.truncate(1);
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// All turns including the system turn, oldest first.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Turns after the system turn.
    pub fn conversation(&self) -> &[Turn] {
        &self.turns[1..]
    }

    pub fn system_turn(&self) -> &Turn {
        &self.turns[0]
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// True once anything beyond the system turn has been appended.
    pub fn has_conversation(&self) -> bool {
        self.turns.len() > 1
    }

    /// `role: content` lines for every non-system turn, joined with `\n`.
    pub fn export(&self) -> String {
        self.conversation()
            .iter()
            .map(|t| format!("{}: {}", t.role, t.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
