//! Conversation memory: the history the model sees.
//!
//! The memory keeps its own log, separate from the visible message log.  The turn driver
//! hands the chain its input wrapped as a list of role-tagged turns; that wrapper is
//! recorded verbatim and later flattened by [`ConversationMemory::normalize`] so windowing
//! treats every entry the same whether or not its turn carried images.

use serde::{Deserialize, Serialize};

use crate::types::{ChatMessage, MessageContent, MessageRole};

/// A role plus content, the shape a model adapter consumes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContextMessage {
    pub role: MessageRole,
    pub content: MessageContent,
}

impl ContextMessage {
    pub fn new(role: MessageRole, content: MessageContent) -> Self {
        Self { role, content }
    }
}

/// How an entry's content is stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MemoryContent {
    /// Plain role-tagged form.
    Plain(MessageContent),
    /// Input as handed to the chain: a list of `{role, content}` turns.
    RoleTagged(Vec<ContextMessage>),
}

impl MemoryContent {
    /// The plain form of this content.  Wrapped input flattens to its first turn's content.
    pub fn normalized(&self) -> MessageContent {
        match self {
            MemoryContent::Plain(content) => content.clone(),
            MemoryContent::RoleTagged(turns) => turns
                .first()
                .map(|turn| turn.content.clone())
                .unwrap_or_else(|| MessageContent::PlainText(String::new())),
        }
    }

    pub fn is_normalized(&self) -> bool {
        matches!(self, MemoryContent::Plain(_))
    }
}

/// One entry of the memory log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryEntry {
    pub role: MessageRole,
    pub content: MemoryContent,
}

impl MemoryEntry {
    fn to_context(&self) -> ContextMessage {
        ContextMessage::new(self.role, self.content.normalized())
    }
}

/// Ordered log of exchanges with a sliding window view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationMemory {
    entries: Vec<MemoryEntry>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild memory from a visible message log, skipping the greeting.
    pub fn from_messages(messages: &[ChatMessage]) -> Self {
        let entries = messages
            .iter()
            .filter(|message| !message.is_greeting())
            .map(|message| MemoryEntry {
                role: message.role,
                content: MemoryContent::Plain(message.content.clone()),
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[MemoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Record the user side of an exchange exactly as it was handed to the chain.
    pub fn record_input(&mut self, input: Vec<ContextMessage>) {
        self.entries.push(MemoryEntry {
            role: MessageRole::User,
            content: MemoryContent::RoleTagged(input),
        });
    }

    /// Record the assistant side of an exchange.
    pub fn record_output(&mut self, content: MessageContent) {
        self.entries.push(MemoryEntry {
            role: MessageRole::Assistant,
            content: MemoryContent::Plain(content),
        });
    }

    /// Flatten wrapped entries into plain form.  Returns how many entries changed.
    pub fn normalize(&mut self) -> usize {
        let mut changed = 0;
        for entry in self.entries.iter_mut() {
            if !entry.content.is_normalized() {
                entry.content = MemoryContent::Plain(entry.content.normalized());
                changed += 1;
            }
        }
        changed
    }

    /// The last `k` exchanges (`2k` entries) in chronological order.  `k = 0` yields nothing.
    pub fn window(&self, k: usize) -> Vec<ContextMessage> {
        let take = k.saturating_mul(2).min(self.entries.len());
        self.entries[self.entries.len() - take..]
            .iter()
            .map(MemoryEntry::to_context)
            .collect()
    }
}
