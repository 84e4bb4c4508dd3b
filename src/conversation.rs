//! Ordered conversation history shared across turns.
//!
//! The record always starts with one fixed system message. After it, roles
//! alternate user/assistant; [`ConversationRecord::sanitize`] repairs any
//! adjacent same-role entries by merging them.

use serde::{Deserialize, Serialize};

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single entry in the conversation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
}

impl ConversationMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Append-only message history with a fixed system head.
#[derive(Debug, Clone)]
pub struct ConversationRecord {
    messages: Vec<ConversationMessage>,
}

impl ConversationRecord {
    /// Create a record holding only the system message.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ConversationMessage::system(system_prompt)],
        }
    }

    /// Number of messages, including the system message.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always false: the system message is never removed.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// All messages in order.
    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    /// Owned copy for handing to the generation service.
    pub fn snapshot(&self) -> Vec<ConversationMessage> {
        self.messages.clone()
    }

    pub fn push(&mut self, message: ConversationMessage) {
        self.messages.push(message);
    }

    /// Remove the newest message. The system message is never popped.
    pub fn pop(&mut self) -> Option<ConversationMessage> {
        if self.messages.len() > 1 {
            self.messages.pop()
        } else {
            None
        }
    }

    /// Drop everything after the first `len` messages (never below the
    /// system message).
    pub fn truncate(&mut self, len: usize) {
        self.messages.truncate(len.max(1));
    }

    /// Merge adjacent same-role messages after the system message, joining
    /// their contents with a single space.
    pub fn sanitize(&mut self) {
        let mut i = 1;
        while i + 1 < self.messages.len() {
            if self.messages[i].role == self.messages[i + 1].role {
                let next = self.messages.remove(i + 1);
                let current = &mut self.messages[i].content;
                current.push(' ');
                current.push_str(&next.content);
            } else {
                i += 1;
            }
        }
    }

    /// Whether roles after the system message strictly alternate, starting
    /// with a user message.
    pub fn roles_alternate(&self) -> bool {
        let Some((head, rest)) = self.messages.split_first() else {
            return false;
        };
        head.role == Role::System
            && rest.iter().enumerate().all(|(i, m)| {
                let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
                m.role == expected
            })
    }
}
