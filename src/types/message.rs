use serde::{Deserialize, Serialize};

use crate::types::{AttachmentId, ContentBlock, ResponseMetadata};

/// The greeting every fresh conversation opens with.
pub const GREETING: &str = "Hi! I'm your AI Bot. How may I help you?";

/// Role type for a message.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User role.
    User,

    /// Assistant role.
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// The content of a message, which can be either a string or an array of content blocks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    /// A simple string content.
    PlainText(String),

    /// An array of content blocks.
    Blocks(Vec<ContentBlock>),
}

impl MessageContent {
    /// The text a reader sees: the string itself, or the text blocks joined by newlines.
    pub fn display_text(&self) -> String {
        match self {
            MessageContent::PlainText(text) => text.clone(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(ContentBlock::as_text)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// The number of image blocks carried by this content.
    pub fn image_count(&self) -> usize {
        match self {
            MessageContent::PlainText(_) => 0,
            MessageContent::Blocks(blocks) => {
                blocks.iter().filter(|b| b.as_image().is_some()).count()
            }
        }
    }

    /// Content as blocks, wrapping plain text in a single text block.
    pub fn to_blocks(&self) -> Vec<ContentBlock> {
        match self {
            MessageContent::PlainText(text) => vec![ContentBlock::text(text.clone())],
            MessageContent::Blocks(blocks) => blocks.clone(),
        }
    }
}

impl<T: AsRef<str>> From<T> for MessageContent {
    fn from(content: T) -> Self {
        MessageContent::PlainText(content.as_ref().to_string())
    }
}

/// One entry of the visible message log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// Who said it.
    pub role: MessageRole,

    /// What was said.
    pub content: MessageContent,

    /// Attachments consumed into this message, in consumption order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<AttachmentId>,

    /// Backend metadata returned alongside an assistant reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResponseMetadata>,
}

impl ChatMessage {
    /// Create a user message carrying the given attachments.
    pub fn user(content: impl Into<MessageContent>, images: Vec<AttachmentId>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            images,
            metadata: None,
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<MessageContent>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            images: Vec::new(),
            metadata: None,
        }
    }

    /// The fixed assistant greeting.
    pub fn greeting() -> Self {
        Self::assistant(GREETING)
    }

    /// Attach backend metadata.
    pub fn with_metadata(mut self, metadata: Option<ResponseMetadata>) -> Self {
        self.metadata = metadata;
        self
    }

    /// True if this message is the fixed greeting.
    pub fn is_greeting(&self) -> bool {
        self.role == MessageRole::Assistant
            && self.content == MessageContent::PlainText(GREETING.to_string())
    }
}
